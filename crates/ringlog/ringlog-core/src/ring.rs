//! The MPSC ring protocol itself: slot reservation, commit, drain, and
//! crash recovery of abandoned slots.
//!
//! `RingBuffer` is a thin view over an already-mapped region; it owns no
//! memory and performs no I/O. `ringlog-shm` is responsible for creating or
//! attaching the region and handing this type a validated base pointer.

use crate::clock::wall_clock_ns;
use crate::error::RingError;
use crate::layout::{
    ConsumerState, Level, OverflowPolicy, RingHeader, SlotHeader, copy_name_into, name_str,
    payload_capacity, slot_header_size,
};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// Fields needed to write one record into a slot.
pub struct RecordFields<'a> {
    pub level: Level,
    pub timestamp_ns: u64,
    pub pid: u32,
    pub thread_id: u64,
    pub process_name: &'a str,
    pub module_name: &'a str,
    pub logger_name: &'a str,
    pub payload: &'a [u8],
}

/// An owned copy of a slot's contents, decoupled from the shared memory.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub level: Level,
    pub timestamp_ns: u64,
    pub pid: u32,
    pub thread_id: u64,
    pub process_name: String,
    pub module_name: String,
    pub logger_name: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct RingStats {
    pub capacity: u64,
    pub write_index: u64,
    pub read_index: u64,
    pub current_usage: u64,
}

/// View over a mapped ring region. Cheap to construct, safe to hold one per
/// thread; all state it touches lives in shared memory behind atomics.
pub struct RingBuffer {
    base: *mut u8,
    capacity: u64,
    slot_size: u64,
    overflow_policy: OverflowPolicy,
    poll_duration: Duration,
}

// SAFETY: every access goes through the atomics embedded in the mapped
// header and slots; `base` itself is never mutated after construction.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// # Safety
    /// `base` must point to a region previously initialized by
    /// [`RingHeader::init`] (or attached from one) and must remain valid and
    /// exclusively addressable by this process for the lifetime of the
    /// returned `RingBuffer`.
    pub unsafe fn from_base(base: *mut u8, poll_duration: Duration) -> Result<Self, RingError> {
        let header = unsafe { &*(base as *const RingHeader) };
        header
            .validate()
            .map_err(RingError::InvalidHandle)?;
        Ok(Self {
            base,
            capacity: header.capacity as u64,
            slot_size: header.slot_size as u64,
            overflow_policy: header.overflow_policy(),
            poll_duration,
        })
    }

    #[inline(always)]
    fn header(&self) -> &RingHeader {
        unsafe { &*(self.base as *const RingHeader) }
    }

    #[inline(always)]
    fn slot_ptr(&self, idx: u64) -> *mut u8 {
        let slots_base = unsafe { self.base.add(std::mem::size_of::<RingHeader>()) };
        unsafe { slots_base.add((idx * self.slot_size) as usize) }
    }

    #[inline(always)]
    fn slot_header(&self, idx: u64) -> &SlotHeader {
        unsafe { &*(self.slot_ptr(idx) as *const SlotHeader) }
    }

    #[inline(always)]
    fn slot_payload_mut(&self, idx: u64) -> *mut u8 {
        unsafe { self.slot_ptr(idx).add(slot_header_size()) }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn payload_capacity(&self) -> usize {
        payload_capacity(self.slot_size as u32)
    }

    pub fn stats(&self) -> RingStats {
        let h = self.header();
        let w = h.write_index.load(Ordering::Relaxed);
        let r = h.read_index.load(Ordering::Relaxed);
        RingStats {
            capacity: self.capacity,
            write_index: w,
            read_index: r,
            current_usage: w.saturating_sub(r),
        }
    }

    /// Zeroes every slot's `committed` flag and resets both indices. Only
    /// the party that created the region should call this, exactly once.
    ///
    /// # Safety
    /// Must not race with any other reserve/commit/read on this region.
    pub unsafe fn init_slots(&self) {
        for i in 0..self.capacity {
            let ptr = self.slot_ptr(i) as *mut SlotHeader;
            unsafe { SlotHeader::init_zeroed(ptr) };
        }
    }

    /// Non-blocking reservation. Uses compare-exchange rather than a bare
    /// `fetch_add` so a losing caller never leaves `write_index`
    /// transiently over-counted (see the open-question resolution in
    /// `DESIGN.md`).
    pub fn try_reserve(&self) -> Result<u64, RingError> {
        let h = self.header();
        loop {
            let w = h.write_index.load(Ordering::Relaxed);
            let r = h.read_index.load(Ordering::Acquire);
            if w.wrapping_sub(r) >= self.capacity {
                return Err(RingError::Full);
            }
            if h.write_index
                .compare_exchange_weak(w, w + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(w % self.capacity);
            }
            std::hint::spin_loop();
        }
    }

    /// Reserves a slot honoring the region's configured overflow policy.
    /// `timeout` bounds a Block-policy wait; `None` blocks until space
    /// frees. Drop policy ignores `timeout` and behaves like
    /// [`Self::try_reserve`].
    pub fn reserve(&self, timeout: Option<Duration>) -> Result<u64, RingError> {
        match self.overflow_policy {
            OverflowPolicy::Drop => self.try_reserve(),
            OverflowPolicy::Block => {
                let deadline = timeout.map(|d| Instant::now() + d);
                let mut spins = 0u32;
                loop {
                    match self.try_reserve() {
                        Ok(idx) => return Ok(idx),
                        Err(RingError::Full) => {
                            if let Some(d) = deadline {
                                if Instant::now() >= d {
                                    return Err(RingError::Full);
                                }
                            }
                            spins += 1;
                            if spins < 64 {
                                std::hint::spin_loop();
                            } else {
                                std::thread::yield_now();
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }

    /// Writes record fields into slot `idx`. Does not publish it; call
    /// [`Self::commit`] afterward.
    pub fn write(&self, idx: u64, record: &RecordFields<'_>) {
        let header_ptr = self.slot_ptr(idx) as *mut SlotHeader;
        let cap = self.payload_capacity();
        let n = record.payload.len().min(cap);

        unsafe {
            let payload_dst = self.slot_payload_mut(idx);
            std::ptr::copy_nonoverlapping(record.payload.as_ptr(), payload_dst, n);

            let h = &mut *header_ptr;
            h.level = record.level as u8;
            h.length = n as u32;
            h.timestamp_ns = record.timestamp_ns;
            h.pid = record.pid;
            h.thread_id = record.thread_id;
            copy_name_into(&mut h.process_name, record.process_name);
            copy_name_into(&mut h.module_name, record.module_name);
            copy_name_into(&mut h.logger_name, record.logger_name);
        }
    }

    /// Publishes slot `idx` and reports whether the caller should wake the
    /// consumer (the adaptive poll-skip optimization from the design).
    pub fn commit(&self, idx: u64) -> bool {
        let slot = self.slot_header(idx);
        slot.committed.store(true, Ordering::Release);

        let h = self.header();
        let state = h.consumer_state.load(Ordering::Acquire);
        if state == ConsumerState::Polling as u32 {
            let last_poll = h.last_poll_time_ns.load(Ordering::Acquire);
            let now = wall_clock_ns();
            if now.saturating_sub(last_poll) < self.poll_duration.as_nanos() as u64 {
                return false;
            }
        }
        true
    }

    pub fn is_next_committed(&self) -> bool {
        let h = self.header();
        let w = h.write_index.load(Ordering::Relaxed);
        let r = h.read_index.load(Ordering::Relaxed);
        if r >= w {
            return false;
        }
        let idx = r % self.capacity;
        self.slot_header(idx).committed.load(Ordering::Acquire)
    }

    /// Copies out the next slot's contents without advancing `read_index`.
    /// Call [`Self::release`] after consuming it.
    pub fn read_next(&self) -> Result<RawRecord, RingError> {
        let h = self.header();
        let r = h.read_index.load(Ordering::Relaxed);
        let idx = r % self.capacity;
        let slot = self.slot_header(idx);
        if !slot.committed.load(Ordering::Acquire) {
            return Err(RingError::NotReady);
        }

        let len = slot.length as usize;
        let payload = unsafe {
            let p = self.slot_payload_mut(idx);
            std::slice::from_raw_parts(p, len.min(self.payload_capacity())).to_vec()
        };

        Ok(RawRecord {
            level: Level::from_u8(slot.level),
            timestamp_ns: slot.timestamp_ns,
            pid: slot.pid,
            thread_id: slot.thread_id,
            process_name: name_str(&slot.process_name).to_string(),
            module_name: name_str(&slot.module_name).to_string(),
            logger_name: name_str(&slot.logger_name).to_string(),
            payload,
        })
    }

    /// Releases the next slot (clearing its commit flag) and advances
    /// `read_index`. Only the consumer calls this.
    pub fn release(&self) {
        let h = self.header();
        let r = h.read_index.load(Ordering::Relaxed);
        let idx = r % self.capacity;
        let slot = self.slot_header(idx);
        slot.committed.store(false, Ordering::Relaxed);
        unsafe {
            let header_ptr = self.slot_ptr(idx) as *mut SlotHeader;
            (*header_ptr).length = 0;
            (*header_ptr).timestamp_ns = 0;
        }
        h.read_index.store(r + 1, Ordering::Release);
    }

    /// Reclaims a slot that was reserved but never committed, older than
    /// `threshold`. Returns the number of slots skipped (0 or 1: a stale
    /// slot can only ever be the next slot, since reservation order matches
    /// ring order).
    pub fn skip_stale(&self, threshold: Duration) -> u64 {
        let h = self.header();
        let r = h.read_index.load(Ordering::Relaxed);
        let w = h.write_index.load(Ordering::Relaxed);
        if r >= w {
            return 0;
        }
        let idx = r % self.capacity;
        let slot = self.slot_header(idx);
        if slot.committed.load(Ordering::Acquire) {
            return 0;
        }
        let ts = unsafe { (*(self.slot_ptr(idx) as *const SlotHeader)).timestamp_ns };
        if ts == 0 {
            return 0;
        }
        let now = wall_clock_ns();
        if now.saturating_sub(ts) < threshold.as_nanos() as u64 {
            return 0;
        }
        h.read_index.store(r + 1, Ordering::Release);
        1
    }

    pub fn set_consumer_state(&self, state: ConsumerState, now_ns: u64) {
        let h = self.header();
        h.last_poll_time_ns.store(now_ns, Ordering::Release);
        h.consumer_state.store(state as u32, Ordering::Release);
    }

    pub fn consumer_state(&self) -> ConsumerState {
        let v = self.header().consumer_state.load(Ordering::Acquire);
        if v == ConsumerState::Polling as u32 {
            ConsumerState::Polling
        } else {
            ConsumerState::Waiting
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{NotifyKind, RingHeader, bytes_for_region};

    fn make_ring(capacity: u32, slot_size: u32, policy: OverflowPolicy) -> (Vec<u8>, RingBuffer) {
        let bytes = bytes_for_region(capacity, slot_size);
        let mut mem = vec![0u8; bytes];
        let base = mem.as_mut_ptr();
        unsafe {
            RingHeader::init(
                base as *mut RingHeader,
                capacity,
                slot_size,
                policy,
                NotifyKind::SocketPath,
                -1,
                b"",
            );
        }
        let ring = unsafe { RingBuffer::from_base(base, Duration::from_millis(1)).unwrap() };
        unsafe { ring.init_slots() };
        (mem, ring)
    }

    #[test]
    fn reserve_write_commit_read_roundtrip() {
        let (_mem, ring) = make_ring(8, 192, OverflowPolicy::Drop);
        let idx = ring.try_reserve().unwrap();
        let fields = RecordFields {
            level: Level::Info,
            timestamp_ns: 42,
            pid: 1234,
            thread_id: 7,
            process_name: "obsd",
            module_name: "engine",
            logger_name: "core",
            payload: b"hello world",
        };
        ring.write(idx, &fields);
        ring.commit(idx);

        assert!(ring.is_next_committed());
        let rec = ring.read_next().unwrap();
        assert_eq!(rec.payload, b"hello world");
        assert_eq!(rec.process_name, "obsd");
        assert_eq!(rec.level, Level::Info);
        ring.release();
        assert!(!ring.is_next_committed());
    }

    #[test]
    fn drop_policy_reports_full_past_capacity() {
        let (_mem, ring) = make_ring(4, 192, OverflowPolicy::Drop);
        for _ in 0..4 {
            ring.try_reserve().unwrap();
        }
        assert!(matches!(ring.try_reserve(), Err(RingError::Full)));
    }

    #[test]
    fn skip_stale_reclaims_abandoned_slot() {
        let (_mem, ring) = make_ring(4, 192, OverflowPolicy::Drop);
        let idx = ring.try_reserve().unwrap();
        let fields = RecordFields {
            level: Level::Warn,
            timestamp_ns: 1,
            pid: 1,
            thread_id: 1,
            process_name: "p",
            module_name: "m",
            logger_name: "l",
            payload: b"stuck",
        };
        ring.write(idx, &fields);
        // Never committed: this simulates a producer that crashed mid-write.
        let skipped = ring.skip_stale(Duration::from_nanos(0));
        assert_eq!(skipped, 1);
        assert_eq!(ring.stats().read_index, 1);
    }

    #[test]
    fn skip_stale_leaves_fresh_slot_alone() {
        let (_mem, ring) = make_ring(4, 192, OverflowPolicy::Drop);
        let idx = ring.try_reserve().unwrap();
        let fields = RecordFields {
            level: Level::Warn,
            timestamp_ns: 1,
            pid: 1,
            thread_id: 1,
            process_name: "p",
            module_name: "m",
            logger_name: "l",
            payload: b"fresh",
        };
        ring.write(idx, &fields);
        let skipped = ring.skip_stale(Duration::from_secs(3600));
        assert_eq!(skipped, 0);
        assert_eq!(ring.stats().read_index, 0);
    }
}
