//! `ringlog-core`: the MPSC shared-memory ring protocol.
//!
//! This crate owns the binary layout of a ringlog region and the lock-free
//! reserve/commit/read/release protocol over it. It knows nothing about how
//! the region is created or mapped (`ringlog-shm`), how the consumer is
//! woken (`ringlog-notify`), or what a record looks like once rendered
//! (`ringlog-consumer`); it only moves bytes through slots correctly and
//! concurrently.
//!
//! # Internal modules
//! - `layout`: header/slot binary layout and field encoding.
//! - `cache`: cache-line padding for the four coordination atomics.
//! - `ring`: the reserve/commit/read/release/skip_stale protocol.
//! - `switch`: the process-wide enable/disable switch.
//! - `clock`: monotonic and wall-clock time sources.
//! - `error`: error types returned by ring operations.

mod cache;
mod clock;
mod error;
mod layout;
mod ring;
mod switch;

pub use cache::CacheAligned;
pub use clock::{monotonic_ns, wall_clock_ns};
pub use error::RingError;
pub use layout::{
    ConsumerState, Level, NotifyKind, OverflowPolicy, RINGLOG_VERSION, RingHeader, SlotHeader,
    bytes_for_region, capacity_for_region, header_size, payload_capacity, slot_header_size,
};
pub use ring::{RawRecord, RecordFields, RingBuffer, RingStats};
pub use switch::GlobalSwitch;
