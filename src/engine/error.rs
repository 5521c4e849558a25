use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("WAL error: {0}")]
    WalError(String),
}
