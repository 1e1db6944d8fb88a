//! `ringlog-consumer`: the background drainer that owns a ringlog region
//! for its whole lifetime.
//!
//! `ConsumerCore::start` creates the region, writes its header, binds the
//! notifier endpoint, and spawns one dedicated OS thread running the
//! adaptive poll/wait loop from `spec.md` §4.5. `ConsumerCore::stop` signals
//! that thread to drain everything outstanding and join before the region
//! is unmapped and (by policy) unlinked.

mod error;
mod stats;

pub use error::ConsumerError;
pub use stats::ConsumerStats;

use ringlog_core::{ConsumerState, Level, NotifyKind, OverflowPolicy, RingBuffer, RingStats};
use ringlog_notify::Notifier;
use ringlog_shm::ShmRegion;
use ringlog_writers::{Writer, decode};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// The region-creation policy the consumer always writes into the header:
/// the consumer's recognized option set (`spec.md` §6) has no
/// `overflow_policy` field of its own — only the producer does — so the
/// region-wide value is fixed here rather than user-configurable. `Block`
/// matches the reference implementation's sink-level default.
const CONSUMER_OVERFLOW_POLICY: OverflowPolicy = OverflowPolicy::Block;

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub poll_interval: Duration,
    pub poll_duration: Duration,
    pub stale_threshold: Duration,
    pub enable_onep_format: bool,
    pub debug_format: bool,
    /// Writers are flushed roughly this often, measured in loop
    /// iterations rather than wall time, matching spec.md's "every N
    /// iterations (~1s of wall time)" phrasing at the `poll_interval`
    /// cadence used elsewhere in this loop.
    pub flush_every_iterations: u64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            poll_duration: Duration::from_secs(1),
            stale_threshold: Duration::from_secs(5),
            enable_onep_format: false,
            debug_format: false,
            flush_every_iterations: 20,
        }
    }
}

/// Background drainer for one ringlog region. Dropping this without
/// calling [`Self::stop`] leaks the drainer thread (it keeps running,
/// detached) — always call `stop` on shutdown.
pub struct ConsumerCore {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<ConsumerStats>,
    ring: Arc<RingBuffer>,
    region: Option<Arc<ShmRegion>>,
    region_name: String,
    destroy_on_exit: bool,
}

impl ConsumerCore {
    /// Creates a brand-new region, initializes its header and slots, binds
    /// the notifier, and starts the drainer thread.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        region_name: &str,
        shm_size: usize,
        slot_size: u32,
        notify_kind: NotifyKind,
        notify_path: Option<&Path>,
        settings: ConsumerSettings,
        writers: Vec<Box<dyn Writer>>,
        destroy_on_exit: bool,
    ) -> Result<Self, ConsumerError> {
        let capacity = ringlog_core::capacity_for_region(shm_size, slot_size);
        if capacity == 0 {
            return Err(ConsumerError::InvalidConfig(
                "shm_size too small to hold even one slot",
            ));
        }

        let region = ShmRegion::create(region_name, shm_size)?;
        let (notifier, effective_kind, bound_path) =
            Notifier::bind_for_consumer(notify_kind, region_name, notify_path)?;

        let (notify_fd, notify_path_bytes): (i32, Vec<u8>) = match effective_kind {
            NotifyKind::Descriptor => {
                #[cfg(target_os = "linux")]
                {
                    let fd = match &notifier {
                        Notifier::Descriptor(d) => d.as_raw_fd(),
                        _ => unreachable!(),
                    };
                    (fd, Vec::new())
                }
                #[cfg(not(target_os = "linux"))]
                {
                    unreachable!("effective_kind never selects Descriptor off Linux")
                }
            }
            NotifyKind::SocketPath => {
                let path = bound_path.unwrap_or_default();
                (-1, path.to_string_lossy().into_owned().into_bytes())
            }
        };

        unsafe {
            ringlog_core::RingHeader::init(
                region.as_mut_ptr() as *mut ringlog_core::RingHeader,
                capacity,
                slot_size,
                CONSUMER_OVERFLOW_POLICY,
                effective_kind,
                notify_fd,
                &notify_path_bytes,
            );
        }

        let ring = unsafe { RingBuffer::from_base(region.as_mut_ptr(), settings.poll_duration)? };
        unsafe { ring.init_slots() };

        let region = Arc::new(region);
        let ring = Arc::new(ring);
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(ConsumerStats::default());

        let thread = {
            let ring = Arc::clone(&ring);
            let shutdown = Arc::clone(&shutdown);
            let stats = Arc::clone(&stats);
            std::thread::Builder::new()
                .name("ringlog-consumer".to_string())
                .spawn(move || run_loop(ring, notifier, writers, settings, shutdown, stats))
                .expect("failed to spawn ringlog consumer thread")
        };

        Ok(Self {
            shutdown,
            thread: Some(thread),
            stats,
            ring,
            region: Some(region),
            region_name: region_name.to_string(),
            destroy_on_exit,
        })
    }

    /// Signals the drainer to exit, waits for it to drain every remaining
    /// committed slot and flush all writers, then unmaps and (if configured)
    /// unlinks the region.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        drop(self.region.take());
        if self.destroy_on_exit {
            ShmRegion::destroy(&self.region_name);
        }
    }

    pub fn ring_stats(&self) -> RingStats {
        self.ring.stats()
    }

    pub fn total_reads(&self) -> u64 {
        self.stats.total_reads()
    }

    pub fn stale_reclaimed(&self) -> u64 {
        self.stats.stale_reclaimed()
    }
}

/// Builds a [`ConsumerCore`] straight from a loaded [`ringlog_config::ConsumerOptions`]
/// plus a caller-assembled writer chain, translating its string-typed fields
/// (`notify_kind`, durations in milliseconds) into the types `start` wants.
pub fn start_from_options(
    opts: &ringlog_config::ConsumerOptions,
    writers: Vec<Box<dyn Writer>>,
) -> Result<ConsumerCore, ConsumerError> {
    let notify_kind = opts
        .notify_kind()
        .map_err(|_| ConsumerError::InvalidConfig("notify_kind"))?;
    let notify_path = derive_socket_notify_path(opts);
    let settings = ConsumerSettings {
        poll_interval: Duration::from_millis(opts.poll_interval_ms),
        poll_duration: Duration::from_millis(opts.poll_duration_ms),
        stale_threshold: Duration::from_secs(opts.stale_threshold_secs),
        enable_onep_format: opts.enable_onep_format,
        debug_format: opts.debug_format,
        ..ConsumerSettings::default()
    };
    ConsumerCore::start(
        &opts.shm_name,
        opts.shm_size,
        opts.slot_size,
        notify_kind,
        notify_path.as_deref(),
        settings,
        writers,
        opts.destroy_on_exit,
    )
}

fn run_loop(
    ring: Arc<RingBuffer>,
    notifier: Notifier,
    writers: Vec<Box<dyn Writer>>,
    settings: ConsumerSettings,
    shutdown: Arc<AtomicBool>,
    stats: Arc<ConsumerStats>,
) {
    let mut polling_since: Option<Instant> = None;
    let mut iterations: u64 = 0;

    while !shutdown.load(Ordering::Acquire) {
        wait_for_data(&ring, &notifier, &settings, &mut polling_since);
        drain_available(&ring, &writers, &settings, &stats);

        let skipped = ring.skip_stale(settings.stale_threshold);
        stats.record_stale_reclaimed(skipped);

        iterations += 1;
        if iterations % settings.flush_every_iterations.max(1) == 0 {
            flush_all(&writers);
        }
    }

    // Orderly shutdown: drain whatever committed between the last check and
    // the shutdown flag being observed, reclaim anything left abandoned,
    // then flush before returning.
    drain_available(&ring, &writers, &settings, &stats);
    let skipped = ring.skip_stale(settings.stale_threshold);
    stats.record_stale_reclaimed(skipped);
    flush_all(&writers);
}

fn wait_for_data(
    ring: &RingBuffer,
    notifier: &Notifier,
    settings: &ConsumerSettings,
    polling_since: &mut Option<Instant>,
) {
    if ring.is_next_committed() {
        if polling_since.is_none() {
            ring.set_consumer_state(ConsumerState::Polling, ringlog_core::wall_clock_ns());
        }
        *polling_since = Some(Instant::now());
        return;
    }

    match *polling_since {
        Some(since) if since.elapsed() < settings.poll_duration => {
            std::thread::sleep(settings.poll_interval.min(Duration::from_millis(10)));
        }
        Some(_) => {
            *polling_since = None;
            ring.set_consumer_state(ConsumerState::Waiting, ringlog_core::wall_clock_ns());
        }
        None => {
            if let Ok(true) = notifier.wait(settings.poll_interval) {
                ring.set_consumer_state(ConsumerState::Polling, ringlog_core::wall_clock_ns());
                *polling_since = Some(Instant::now());
            }
        }
    }
}

fn drain_available(
    ring: &RingBuffer,
    writers: &[Box<dyn Writer>],
    settings: &ConsumerSettings,
    stats: &ConsumerStats,
) {
    while ring.is_next_committed() {
        if let Ok(raw) = ring.read_next() {
            let decoded = decode(&raw, settings.enable_onep_format, settings.debug_format);
            dispatch(writers, &decoded.level, &decoded);
            stats.record_read();
        }
        ring.release();
    }
}

fn dispatch(writers: &[Box<dyn Writer>], level: &Level, decoded: &ringlog_writers::DecodedRecord) {
    for writer in writers {
        if *level >= writer.threshold() {
            writer.write(decoded);
        }
    }
}

fn flush_all(writers: &[Box<dyn Writer>]) {
    for writer in writers {
        writer.flush();
    }
}

/// Convenience used by the demo binary and tests: builds the
/// [`ConsumerSettings`] + writer list from a loaded [`ringlog_config::ConsumerOptions`].
pub fn derive_socket_notify_path(opts: &ringlog_config::ConsumerOptions) -> Option<PathBuf> {
    if opts.notify_path.is_empty() {
        None
    } else {
        Some(PathBuf::from(&opts.notify_path))
    }
}
