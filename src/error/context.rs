use crate::error::TxlockError;
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a TxlockError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a TxlockError) -> Self {
        let (suggestion, details) = match error {
            TxlockError::IllegalResource(resource) => {
                let suggestion = Some(
                    "Resources must be non-empty identifiers; use a node id, relationship id or \
                     a non-blank name."
                        .to_string(),
                );
                let details = Some(format!("Rejected resource: {resource}"));
                (suggestion, details)
            }
            TxlockError::DeadlockDetected {
                transaction, cycle, ..
            } => {
                let suggestion = Some(format!(
                    "Abort {transaction} and release its locks, then retry it.\nAcquiring \
                     resources in a consistent order avoids this conflict."
                ));
                let details = Some(format!("Wait-for cycle: {}", cycle.join(" -> ")));
                (suggestion, details)
            }
            TxlockError::LockNotFound {
                resource, mode, ..
            } => {
                let suggestion = Some(format!(
                    "Every {mode} release must match an earlier successful {mode} acquire on \
                     {resource}."
                ));
                (suggestion, None)
            }
            TxlockError::ConfigError(msg) | TxlockError::InvalidConfig(msg) => {
                let suggestion = Some(
                    "Check txlock.toml in the configuration directory, or remove it to use the \
                     defaults."
                        .to_string(),
                );
                let details = Some(format!("Configuration problem: {msg}"));
                (suggestion, details)
            }
            _ => (None, None),
        };

        ErrorContext {
            error,
            suggestion,
            details,
        }
    }
}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
