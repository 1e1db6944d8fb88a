//! `ringlog-producer`: the attach-side half of the transport.
//!
//! A `ProducerCore` never creates or destroys a region, never unlinks the
//! kernel object, and never synchronizes with other producers beyond the
//! ring's own lock-free protocol. It attaches once, checks out as
//! version-compatible, and from then on every `log` call is reserve/write/
//! commit/notify with no kernel lock in the common path.

mod error;
mod identity;

pub use error::ProducerError;
pub use identity::{module_name, process_name, set_module_name, set_process_name, thread_id};

use ringlog_core::{GlobalSwitch, Level, RawRecord, RecordFields, RingBuffer, RingError};
use ringlog_notify::Notifier;
use ringlog_shm::{ShmError, ShmRegion};
use ringlog_writers::{Writer, decode};
use std::time::Duration;

/// Attached state, present whenever the region was reachable and
/// version-compatible at construction time.
struct Attached {
    // Held only to keep the mapping alive; never unlinked. Dropping this
    // unmaps (via `MmapRaw`'s own `Drop`) and nothing more.
    #[allow(dead_code)]
    region: ShmRegion,
    ring: RingBuffer,
    notifier: Notifier,
}

pub struct ProducerCore {
    attached: Option<Attached>,
    fallback: Option<Box<dyn Writer>>,
    block_timeout: Option<Duration>,
    enable_onep_format: bool,
    logger_name: String,
}

impl ProducerCore {
    /// Attaches to `region_name`. A version mismatch is always fatal. If
    /// attach itself fails (region doesn't exist, permission denied, ...)
    /// and `fallback` is configured, construction still succeeds in
    /// fallback-only mode rather than erroring out.
    pub fn attach(
        region_name: &str,
        block_timeout: Option<Duration>,
        enable_onep_format: bool,
        logger_name: impl Into<String>,
        fallback: Option<Box<dyn Writer>>,
    ) -> Result<Self, ProducerError> {
        let logger_name = logger_name.into();
        match ShmRegion::attach_and_check_version(region_name) {
            Ok(region) => {
                let header =
                    unsafe { &*(region.as_mut_ptr() as *const ringlog_core::RingHeader) };
                let poll_duration = Duration::from_millis(1000);
                let ring = unsafe { RingBuffer::from_base(region.as_mut_ptr(), poll_duration)? };
                let notifier = Notifier::connect_for_producer(
                    header.notify_kind(),
                    header.notify_fd,
                    header.notify_path_str(),
                )?;
                Ok(Self {
                    attached: Some(Attached {
                        region,
                        ring,
                        notifier,
                    }),
                    fallback,
                    block_timeout,
                    enable_onep_format,
                    logger_name,
                })
            }
            Err(err @ ShmError::VersionMismatch { .. }) => Err(err.into()),
            Err(other) => {
                if fallback.is_some() {
                    tracing::warn!(
                        name = region_name,
                        error = %other,
                        "region unreachable, producer running in fallback-only mode"
                    );
                    Ok(Self {
                        attached: None,
                        fallback,
                        block_timeout,
                        enable_onep_format,
                        logger_name,
                    })
                } else {
                    Err(other.into())
                }
            }
        }
    }

    /// Convenience constructor from a loaded [`ringlog_config::ProducerOptions`].
    pub fn attach_from_options(
        opts: &ringlog_config::ProducerOptions,
        logger_name: impl Into<String>,
        fallback: Option<Box<dyn Writer>>,
    ) -> Result<Self, ProducerError> {
        Self::attach(
            &opts.shm_name,
            Some(Duration::from_millis(opts.block_timeout_ms)),
            opts.enable_onep_format,
            logger_name,
            fallback,
        )
    }

    /// Emits one record. Routes to the fallback writer (or drops silently,
    /// if none is configured) whenever the global switch is off, the region
    /// was never reachable, or the ring reports `Full`.
    pub fn log(&self, level: Level, payload: &[u8]) -> Result<(), ProducerError> {
        if !GlobalSwitch::is_enabled() {
            self.to_fallback(level, payload);
            return Ok(());
        }

        let Some(attached) = &self.attached else {
            self.to_fallback(level, payload);
            return Ok(());
        };

        match attached.ring.reserve(self.block_timeout) {
            Ok(idx) => {
                let process = process_name();
                let module = module_name();
                let fields = RecordFields {
                    level,
                    timestamp_ns: ringlog_core::wall_clock_ns(),
                    pid: std::process::id(),
                    thread_id: thread_id(),
                    process_name: &process,
                    module_name: &module,
                    logger_name: &self.logger_name,
                    payload,
                };
                attached.ring.write(idx, &fields);
                if attached.ring.commit(idx) {
                    let _ = attached.notifier.signal();
                }
                Ok(())
            }
            Err(RingError::Full) => {
                self.to_fallback(level, payload);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn to_fallback(&self, level: Level, payload: &[u8]) {
        let Some(writer) = &self.fallback else {
            return;
        };
        let raw = RawRecord {
            level,
            timestamp_ns: ringlog_core::wall_clock_ns(),
            pid: std::process::id(),
            thread_id: thread_id(),
            process_name: process_name(),
            module_name: module_name(),
            logger_name: self.logger_name.clone(),
            payload: payload.to_vec(),
        };
        let decoded = decode(&raw, self.enable_onep_format, true);
        if level >= writer.threshold() {
            writer.write(&decoded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringlog_core::{NotifyKind, OverflowPolicy, RingHeader};
    use ringlog_writers::VecWriter;
    use std::sync::atomic::{AtomicU32, Ordering};

    static UNIQ: AtomicU32 = AtomicU32::new(0);
    fn unique_name(tag: &str) -> String {
        let n = UNIQ.fetch_add(1, Ordering::Relaxed);
        format!("/ringlog_producer_test_{tag}_{}_{}", std::process::id(), n)
    }

    fn create_region(name: &str, capacity: u32, slot_size: u32) -> (ShmRegion, Notifier) {
        let bytes = ringlog_core::bytes_for_region(capacity, slot_size);
        let region = ShmRegion::create(name, bytes).unwrap();
        let (notifier, effective_kind, path) =
            Notifier::bind_for_consumer(NotifyKind::SocketPath, name, None).unwrap();
        let path_bytes = path
            .map(|p| p.to_string_lossy().into_owned().into_bytes())
            .unwrap_or_default();
        unsafe {
            RingHeader::init(
                region.as_mut_ptr() as *mut RingHeader,
                capacity,
                slot_size,
                OverflowPolicy::Drop,
                effective_kind,
                -1,
                &path_bytes,
            );
        }
        let ring =
            unsafe { RingBuffer::from_base(region.as_mut_ptr(), Duration::from_millis(1)) }
                .unwrap();
        unsafe { ring.init_slots() };
        (region, notifier)
    }

    #[test]
    fn attach_without_fallback_fails_when_region_missing() {
        let name = unique_name("missing");
        let err = ProducerCore::attach(&name, None, false, "core", None);
        assert!(err.is_err());
    }

    #[test]
    fn attach_with_fallback_runs_fallback_only_when_region_missing() {
        let name = unique_name("missing_fb");
        let writer: Box<dyn Writer> = Box::new(VecWriter::new());
        let producer =
            ProducerCore::attach(&name, None, false, "core", Some(writer)).unwrap();
        producer.log(Level::Info, b"hello").unwrap();
    }

    #[test]
    fn attach_and_log_writes_into_region() {
        let name = unique_name("live");
        let (region, _notifier) = create_region(&name, 8, 256);
        let producer = ProducerCore::attach(&name, None, false, "core", None).unwrap();
        producer.log(Level::Warn, b"boot complete").unwrap();

        let attached = producer.attached.as_ref().unwrap();
        assert!(attached.ring.is_next_committed());
        let rec = attached.ring.read_next().unwrap();
        assert_eq!(rec.payload, b"boot complete");
        attached.ring.release();

        drop(producer);
        drop(region);
        ShmRegion::destroy(&name);
    }
}
