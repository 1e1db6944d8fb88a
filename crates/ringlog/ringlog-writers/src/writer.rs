//! The `Writer` trait downstream sinks implement, and the severity
//! threshold `ConsumerCore` checks before dispatching to each one.

use crate::decode::DecodedRecord;
use ringlog_core::Level;

/// A sink that accepts decoded records. Implementations must be internally
/// synchronized: `ConsumerCore` holds a `Vec<Box<dyn Writer>>` and calls
/// every writer from its single drainer thread, but a `Writer` may also be
/// reached directly as a producer's fallback sink from producer threads.
pub trait Writer: Send + Sync {
    /// The minimum level this writer accepts; records below it are skipped
    /// before `write` is ever called.
    fn threshold(&self) -> Level {
        Level::Trace
    }

    fn write(&self, record: &DecodedRecord);

    fn flush(&self);
}
