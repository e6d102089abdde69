use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid tenant id pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
