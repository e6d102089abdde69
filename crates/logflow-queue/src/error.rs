use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue {0} is closed")]
    Closed(String),

    #[error("Queue rejected message: {0}")]
    Rejected(String),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] logflow_core::CoreError),
}
