//! Consumer-observable counters layered on top of the ring's own
//! `write_index`/`read_index`/`capacity` (see [`ringlog_core::RingStats`]).
//!
//! `stale_reclaimed` doubles as this crate's `dropped_messages` figure from
//! §7 of the design: it's the only loss a consumer can itself observe
//! (messages dropped by a producer under `OverflowPolicy::Drop` never
//! touch the ring at all, so the consumer has no way to count those).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct ConsumerStats {
    total_reads: AtomicU64,
    stale_reclaimed: AtomicU64,
}

impl ConsumerStats {
    pub fn record_read(&self) {
        self.total_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale_reclaimed(&self, count: u64) {
        if count > 0 {
            self.stale_reclaimed.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn total_reads(&self) -> u64 {
        self.total_reads.load(Ordering::Relaxed)
    }

    pub fn stale_reclaimed(&self) -> u64 {
        self.stale_reclaimed.load(Ordering::Relaxed)
    }
}
