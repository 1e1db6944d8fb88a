//! Binary layout of the shared-memory ring: region header, per-slot header,
//! and the size arithmetic tying them together.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         RingHeader (one cache line                │
//! │                          of fixed fields, then four               │
//! │                          CacheAligned atomics)                    │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Slot[0] = SlotHeader { committed, level, length, ... } + payload  │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Slot[1]                                                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ...                                                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Slot[capacity - 1]                                               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use crate::cache::CacheAligned;
use std::mem::size_of;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64};

/// ASCII "RLOG" read as a big-endian u32: identifies a ringlog region.
pub const RINGLOG_MAGIC: u32 = 0x524C_4F47;

/// Bump when the on-disk layout changes incompatibly.
pub const RINGLOG_VERSION: u32 = 1;

/// Maximum bytes for a `AF_UNIX` socket path, matching `sockaddr_un::sun_path`
/// on Linux; large enough for any path this crate derives or accepts.
pub const NOTIFY_PATH_CAP: usize = 108;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    Block = 0,
    Drop = 1,
}

impl OverflowPolicy {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => OverflowPolicy::Drop,
            _ => OverflowPolicy::Block,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Descriptor = 0,
    SocketPath = 1,
}

impl NotifyKind {
    pub fn from_u32(v: u32) -> Self {
        match v {
            0 => NotifyKind::Descriptor,
            _ => NotifyKind::SocketPath,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Waiting = 0,
    Polling = 1,
}

/// Severity of a log record. Mirrors the ordering a renderer would filter on.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Critical = 5,
}

impl Level {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            _ => Level::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

/// Region-level header at offset 0 of the mapped file.
///
/// The immutable fields (everything before `write_index`) are written once
/// at creation and never touched again. The four atomics that follow are
/// each wrapped in [`CacheAligned`] so they never share a line; see I5/I8.
#[repr(C)]
pub struct RingHeader {
    pub magic: u32,
    pub version: u32,
    pub capacity: u32,
    pub slot_size: u32,
    pub overflow_policy: u32,
    pub notify_kind: u32,
    pub notify_fd: i32,
    pub notify_path: [u8; NOTIFY_PATH_CAP],

    pub write_index: CacheAligned<AtomicU64>,
    pub read_index: CacheAligned<AtomicU64>,
    pub consumer_state: CacheAligned<AtomicU32>,
    pub last_poll_time_ns: CacheAligned<AtomicU64>,
}

impl RingHeader {
    /// Initializes every field of a freshly mapped, zeroed region.
    ///
    /// # Safety
    /// `ptr` must point to a writable region of at least
    /// `size_of::<RingHeader>()` bytes, exclusively owned by the caller.
    pub unsafe fn init(
        ptr: *mut RingHeader,
        capacity: u32,
        slot_size: u32,
        overflow_policy: OverflowPolicy,
        notify_kind: NotifyKind,
        notify_fd: i32,
        notify_path: &[u8],
    ) {
        let mut path = [0u8; NOTIFY_PATH_CAP];
        let n = notify_path.len().min(NOTIFY_PATH_CAP - 1);
        path[..n].copy_from_slice(&notify_path[..n]);

        unsafe {
            std::ptr::write(
                ptr,
                RingHeader {
                    magic: RINGLOG_MAGIC,
                    version: RINGLOG_VERSION,
                    capacity,
                    slot_size,
                    overflow_policy: overflow_policy as u32,
                    notify_kind: notify_kind as u32,
                    notify_fd,
                    notify_path: path,
                    write_index: CacheAligned::new(AtomicU64::new(0)),
                    read_index: CacheAligned::new(AtomicU64::new(0)),
                    consumer_state: CacheAligned::new(AtomicU32::new(ConsumerState::Waiting as u32)),
                    last_poll_time_ns: CacheAligned::new(AtomicU64::new(0)),
                },
            );
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.magic != RINGLOG_MAGIC {
            return Err("bad magic");
        }
        if self.capacity == 0 {
            return Err("zero capacity");
        }
        if self.slot_size as usize % 64 != 0 {
            return Err("slot_size must be a multiple of 64");
        }
        if (self.slot_size as usize) <= size_of::<SlotHeader>() {
            return Err("slot_size too small for slot header");
        }
        Ok(())
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        OverflowPolicy::from_u32(self.overflow_policy)
    }

    pub fn notify_kind(&self) -> NotifyKind {
        NotifyKind::from_u32(self.notify_kind)
    }

    pub fn notify_path_str(&self) -> &str {
        let nul = self
            .notify_path
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.notify_path.len());
        std::str::from_utf8(&self.notify_path[..nul]).unwrap_or("")
    }
}

/// Fixed prefix of every slot. Payload bytes follow immediately after in the
/// mapped region; their length is `slot_size - size_of::<SlotHeader>()`.
#[repr(C)]
pub struct SlotHeader {
    pub committed: AtomicBool,
    pub level: u8,
    _pad0: [u8; 2],
    pub length: u32,
    pub timestamp_ns: u64,
    pub pid: u32,
    _pad1: [u8; 4],
    pub thread_id: u64,
    pub process_name: [u8; 8],
    pub module_name: [u8; 8],
    pub logger_name: [u8; 64],
}

pub const MAX_LOGGER_NAME: usize = 64;
pub const MAX_PROCESS_NAME: usize = 8;
pub const MAX_MODULE_NAME: usize = 8;

impl SlotHeader {
    /// # Safety
    /// `ptr` must point to a writable `SlotHeader`-sized region.
    pub unsafe fn init_zeroed(ptr: *mut SlotHeader) {
        unsafe {
            std::ptr::write(
                ptr,
                SlotHeader {
                    committed: AtomicBool::new(false),
                    level: 0,
                    _pad0: [0; 2],
                    length: 0,
                    timestamp_ns: 0,
                    pid: 0,
                    _pad1: [0; 4],
                    thread_id: 0,
                    process_name: [0; 8],
                    module_name: [0; 8],
                    logger_name: [0; 64],
                },
            );
        }
    }
}

pub const fn slot_header_size() -> usize {
    size_of::<SlotHeader>()
}

pub fn payload_capacity(slot_size: u32) -> usize {
    slot_size as usize - slot_header_size()
}

/// Total region bytes needed for `capacity` slots of `slot_size` bytes each.
pub fn bytes_for_region(capacity: u32, slot_size: u32) -> usize {
    size_of::<RingHeader>() + capacity as usize * slot_size as usize
}

pub const fn header_size() -> usize {
    size_of::<RingHeader>()
}

/// The largest slot count that fits in `region_size` bytes of `slot_size`
/// each, after reserving space for the header. Used when a caller supplies
/// a total region size rather than an explicit slot count.
pub fn capacity_for_region(region_size: usize, slot_size: u32) -> u32 {
    let usable = region_size.saturating_sub(header_size());
    (usable / slot_size as usize) as u32
}

pub fn copy_name_into(dst: &mut [u8], src: &str) {
    let bytes = src.as_bytes();
    let n = bytes.len().min(dst.len());
    dst[..n].copy_from_slice(&bytes[..n]);
    for b in &mut dst[n..] {
        *b = 0;
    }
}

pub fn name_str(src: &[u8]) -> &str {
    let nul = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    std::str::from_utf8(&src[..nul]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    /// P8: `write_index`, `read_index`, `consumer_state`, and
    /// `last_poll_time_ns` must each land on a distinct 64-byte line so
    /// producer and consumer writes never false-share.
    #[test]
    fn coordination_atomics_occupy_distinct_cache_lines() {
        let offsets = [
            offset_of!(RingHeader, write_index),
            offset_of!(RingHeader, read_index),
            offset_of!(RingHeader, consumer_state),
            offset_of!(RingHeader, last_poll_time_ns),
        ];
        let lines: Vec<usize> = offsets.iter().map(|o| o / 64).collect();
        for i in 0..lines.len() {
            for j in (i + 1)..lines.len() {
                assert_ne!(
                    lines[i], lines[j],
                    "fields at byte offsets {} and {} share a cache line",
                    offsets[i], offsets[j]
                );
            }
        }
    }

    #[test]
    fn slot_header_fits_before_payload() {
        assert!(slot_header_size() <= 64);
    }

    #[test]
    fn validate_rejects_bad_magic_and_sizes() {
        let bytes = bytes_for_region(4, 192);
        let mut mem = vec![0u8; bytes];
        unsafe {
            RingHeader::init(
                mem.as_mut_ptr() as *mut RingHeader,
                4,
                192,
                OverflowPolicy::Drop,
                NotifyKind::SocketPath,
                -1,
                b"",
            );
        }
        let header = unsafe { &*(mem.as_ptr() as *const RingHeader) };
        assert!(header.validate().is_ok());

        let mut corrupt = mem.clone();
        unsafe {
            (*(corrupt.as_mut_ptr() as *mut RingHeader)).magic = 0;
        }
        let bad = unsafe { &*(corrupt.as_ptr() as *const RingHeader) };
        assert!(bad.validate().is_err());
    }
}
