//! TOML-file-backed option structs for the consumer and producer binaries,
//! mirroring the workspace's existing `ObsidianConfig::load` pattern: a
//! `serde`-deserializable struct with per-field defaults, loaded with a
//! `thiserror` error distinguishing read failure from parse failure.

use ringlog_core::{NotifyKind, OverflowPolicy};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for field '{field}'")]
    InvalidField { field: &'static str, value: String },
}

fn parse_overflow_policy(value: &str) -> Result<OverflowPolicy, ConfigError> {
    match value {
        "block" => Ok(OverflowPolicy::Block),
        "drop" => Ok(OverflowPolicy::Drop),
        other => Err(ConfigError::InvalidField {
            field: "overflow_policy",
            value: other.to_string(),
        }),
    }
}

fn parse_notify_kind(value: &str) -> Result<NotifyKind, ConfigError> {
    match value {
        "descriptor" => Ok(NotifyKind::Descriptor),
        "socket_path" => Ok(NotifyKind::SocketPath),
        other => Err(ConfigError::InvalidField {
            field: "notify_kind",
            value: other.to_string(),
        }),
    }
}

mod defaults {
    pub fn shm_name() -> String {
        "/ringlog_shm".into()
    }

    pub fn shm_size() -> usize {
        1 << 20 // 1 MiB
    }

    pub fn slot_size() -> u32 {
        512
    }

    pub fn notify_kind() -> String {
        "socket_path".into()
    }

    pub fn notify_path() -> String {
        String::new()
    }

    pub fn notify_fd() -> i32 {
        -1
    }

    pub fn log_dir() -> String {
        "/tmp/ringlog".into()
    }

    pub fn log_name() -> String {
        "ringlog".into()
    }

    pub fn max_file_size() -> u64 {
        10 << 20 // 10 MiB
    }

    pub fn max_files() -> u32 {
        5
    }

    pub fn poll_interval_ms() -> u64 {
        50
    }

    pub fn poll_duration_ms() -> u64 {
        1000
    }

    pub fn stale_threshold_secs() -> u64 {
        5
    }

    pub fn overflow_policy() -> String {
        "drop".into()
    }

    pub fn block_timeout_ms() -> u64 {
        100
    }

    pub fn destroy_on_exit() -> bool {
        true
    }
}

/// Options read by the consumer binary: the process that owns the region.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerOptions {
    #[serde(default = "defaults::shm_name")]
    pub shm_name: String,
    #[serde(default = "defaults::shm_size")]
    pub shm_size: usize,
    #[serde(default)]
    pub create_shm: bool,
    #[serde(default)]
    pub shm_offset: usize,

    #[serde(default = "defaults::log_dir")]
    pub log_dir: String,
    #[serde(default = "defaults::log_name")]
    pub log_name: String,
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default)]
    pub enable_rotating: bool,
    #[serde(default = "defaults::max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "defaults::max_files")]
    pub max_files: u32,

    #[serde(default = "defaults::slot_size")]
    pub slot_size: u32,
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "defaults::poll_duration_ms")]
    pub poll_duration_ms: u64,
    #[serde(default = "defaults::stale_threshold_secs")]
    pub stale_threshold_secs: u64,

    #[serde(default)]
    pub async_mode: bool,
    #[serde(default)]
    pub enable_onep_format: bool,
    #[serde(default)]
    pub debug_format: bool,
    #[serde(default = "defaults::destroy_on_exit")]
    pub destroy_on_exit: bool,

    #[serde(default = "defaults::notify_kind")]
    pub notify_kind: String,
    #[serde(default = "defaults::notify_path")]
    pub notify_path: String,
    #[serde(default = "defaults::notify_fd")]
    pub notify_fd: i32,
}

impl ConsumerOptions {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        let opts: ConsumerOptions = toml::from_str(&text)?;
        Ok(opts)
    }

    pub fn notify_kind(&self) -> Result<NotifyKind, ConfigError> {
        parse_notify_kind(&self.notify_kind)
    }
}

/// Options read by a producer binary: the process attaching to an
/// already-created region.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerOptions {
    #[serde(default = "defaults::shm_name")]
    pub shm_name: String,
    #[serde(default = "defaults::shm_size")]
    pub shm_size: usize,
    #[serde(default)]
    pub shm_handle: Option<i32>,
    #[serde(default)]
    pub shm_offset: usize,

    #[serde(default = "defaults::slot_size")]
    pub slot_size: u32,
    #[serde(default = "defaults::overflow_policy")]
    pub overflow_policy: String,
    #[serde(default = "defaults::block_timeout_ms")]
    pub block_timeout_ms: u64,

    #[serde(default)]
    pub enable_fallback: bool,
    #[serde(default)]
    pub fallback_writer: Option<String>,

    #[serde(default = "defaults::notify_kind")]
    pub notify_kind: String,
    #[serde(default = "defaults::notify_path")]
    pub notify_path: String,
    #[serde(default = "defaults::notify_fd")]
    pub notify_fd: i32,

    #[serde(default)]
    pub async_mode: bool,
    #[serde(default)]
    pub enable_onep_format: bool,
}

impl ProducerOptions {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        let opts: ProducerOptions = toml::from_str(&text)?;
        Ok(opts)
    }

    pub fn overflow_policy(&self) -> Result<OverflowPolicy, ConfigError> {
        parse_overflow_policy(&self.overflow_policy)
    }

    pub fn notify_kind(&self) -> Result<NotifyKind, ConfigError> {
        parse_notify_kind(&self.notify_kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_table() {
        let opts: ConsumerOptions = toml::from_str("").unwrap();
        assert_eq!(opts.shm_name, "/ringlog_shm");
        assert_eq!(opts.slot_size, 512);
        assert_eq!(opts.notify_kind, "socket_path");
    }

    #[test]
    fn overrides_take_effect() {
        let opts: ProducerOptions = toml::from_str(
            r#"
            shm_name = "/custom"
            overflow_policy = "block"
            "#,
        )
        .unwrap();
        assert_eq!(opts.shm_name, "/custom");
        assert!(matches!(opts.overflow_policy().unwrap(), OverflowPolicy::Block));
    }

    #[test]
    fn rejects_unknown_overflow_policy() {
        let opts: ProducerOptions = toml::from_str(r#"overflow_policy = "explode""#).unwrap();
        assert!(opts.overflow_policy().is_err());
    }

    #[test]
    fn rejects_unknown_notify_kind() {
        let opts: ConsumerOptions = toml::from_str(r#"notify_kind = "carrier_pigeon""#).unwrap();
        assert!(opts.notify_kind().is_err());
    }
}
