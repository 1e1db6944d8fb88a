//! `ringlog-config`: the two configuration layers recognized by the
//! consumer and producer binaries.
//!
//! - `wire`: the raw `NAME=<shm_name>:<size>[:<fd>]` contract parsed from
//!   environment or argv, for processes that only ever inherit a handle.
//! - `file`: a `serde`/`toml`-backed options layer a real deployment edits
//!   directly, mirroring the workspace's existing `*Config::load` pattern.

mod file;
mod wire;

pub use file::{ConfigError, ConsumerOptions, ProducerOptions};
pub use wire::{ShmHandle, from_args, from_env};
