use thiserror::Error;

/// Errors surfaced by the ring buffer's own operations.
///
/// Region attach/create errors live in `ringlog-shm`; this crate only
/// returns errors for operations on an already-mapped ring.
#[derive(Debug, Error)]
pub enum RingError {
    #[error("ring buffer is full")]
    Full,

    #[error("next slot is not yet committed")]
    NotReady,

    #[error("ring header failed validation: {0}")]
    InvalidHandle(&'static str),

    #[error("ring version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}
