use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error(transparent)]
    Shm(#[from] ringlog_shm::ShmError),

    #[error(transparent)]
    Ring(#[from] ringlog_core::RingError),

    #[error(transparent)]
    Notify(#[from] ringlog_notify::NotifyError),
}
