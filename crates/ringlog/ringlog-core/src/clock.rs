//! Monotonic and wall-clock time sources used by the ring buffer.
//!
//! The poll/wait state machine needs a monotonic clock immune to wall-clock
//! adjustments; record timestamps need wall-clock time so a consumer in a
//! different process can render them. Both are thin wrappers over
//! `clock_gettime`, mirroring the rest of the workspace's low-level timing
//! utilities.

#[cfg(target_os = "macos")]
use std::sync::OnceLock;

/// Monotonic nanoseconds, suitable for measuring elapsed durations.
#[inline(always)]
#[cfg(target_os = "macos")]
#[allow(deprecated)]
pub fn monotonic_ns() -> u64 {
    static TIMEBASE: OnceLock<(u64, u64)> = OnceLock::new();
    let (numer, denom) = *TIMEBASE.get_or_init(|| {
        let mut info = libc::mach_timebase_info_data_t { numer: 0, denom: 0 };
        let rc = unsafe { libc::mach_timebase_info(&mut info) };
        if rc != 0 || info.denom == 0 {
            (1, 1)
        } else {
            (info.numer as u64, info.denom as u64)
        }
    });
    let t = unsafe { libc::mach_absolute_time() } as u128;
    ((t * numer as u128) / denom as u128) as u64
}

#[inline(always)]
#[cfg(not(target_os = "macos"))]
pub fn monotonic_ns() -> u64 {
    let mut ts: libc::timespec = unsafe { core::mem::zeroed() };
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

/// Wall-clock nanoseconds since the Unix epoch, used for record timestamps
/// and staleness detection (both meaningful across process boundaries).
#[inline(always)]
pub fn wall_clock_ns() -> u64 {
    let mut ts: libc::timespec = unsafe { core::mem::zeroed() };
    unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}
