use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("invalid consumer configuration: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    Shm(#[from] ringlog_shm::ShmError),

    #[error(transparent)]
    Ring(#[from] ringlog_core::RingError),

    #[error(transparent)]
    Notify(#[from] ringlog_notify::NotifyError),
}
