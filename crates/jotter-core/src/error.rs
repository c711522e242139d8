use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}
