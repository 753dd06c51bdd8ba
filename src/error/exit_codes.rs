use crate::error::TxlockError;

pub fn get_exit_code(error: &TxlockError) -> i32 {
    match error {
        TxlockError::IllegalResource(_)
        | TxlockError::InvalidConfig(_)
        | TxlockError::ConfigError(_) => 2,

        TxlockError::DeadlockDetected { .. } => 40,

        TxlockError::LockNotFound { .. } => 41,

        _ => 1,
    }
}
