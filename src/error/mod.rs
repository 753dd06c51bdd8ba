mod context;
mod exit_codes;
mod format;
#[cfg(test)]
mod tests;

pub use context::ErrorContext;
pub use exit_codes::get_exit_code;
pub use format::{format_error_chain, format_error_with_color};

use crate::locking::LockMode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TxlockError {
    #[error("Illegal resource: {0}")]
    IllegalResource(String),

    #[error("Deadlock detected: {transaction} cannot wait for {resource}")]
    DeadlockDetected {
        resource: String,
        transaction: String,
        cycle: Vec<String>,
    },

    #[error("{transaction} holds no {mode} lock on {resource}")]
    LockNotFound {
        resource: String,
        transaction: String,
        mode: LockMode,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TxlockError {
    pub fn is_deadlock(&self) -> bool {
        matches!(self, TxlockError::DeadlockDetected { .. })
    }
}

pub type Result<T> = std::result::Result<T, TxlockError>;
