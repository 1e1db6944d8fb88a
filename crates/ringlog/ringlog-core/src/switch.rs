//! Process-wide enable/disable switch for the transport.
//!
//! One instance per process, independent of any particular ring buffer.
//! Producers check it before every reservation so the transport can be
//! toggled off at runtime (e.g. operationally, to route everything through
//! a fallback writer) without tearing down any shared-memory state.

use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(true);

pub struct GlobalSwitch;

impl GlobalSwitch {
    #[inline(always)]
    pub fn is_enabled() -> bool {
        ENABLED.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn enable() {
        ENABLED.store(true, Ordering::Release);
    }

    #[inline(always)]
    pub fn disable() {
        ENABLED.store(false, Ordering::Release);
    }

    #[inline(always)]
    pub fn set(enabled: bool) {
        ENABLED.store(enabled, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The switch is process-global; serialize tests that touch it.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn default_is_enabled() {
        let _g = TEST_LOCK.lock().unwrap();
        GlobalSwitch::set(true);
        assert!(GlobalSwitch::is_enabled());
    }

    #[test]
    fn disable_and_enable_roundtrip() {
        let _g = TEST_LOCK.lock().unwrap();
        GlobalSwitch::disable();
        assert!(!GlobalSwitch::is_enabled());
        GlobalSwitch::enable();
        assert!(GlobalSwitch::is_enabled());
    }
}
