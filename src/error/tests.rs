use crate::error::format::format_error_with_color;
use crate::error::*;
use crate::locking::LockMode;

fn deadlock() -> TxlockError {
    TxlockError::DeadlockDetected {
        resource: "\"accounts\"".to_string(),
        transaction: "tx-2".to_string(),
        cycle: vec!["tx-2".to_string(), "tx-1".to_string(), "tx-2".to_string()],
    }
}

#[test]
fn test_error_context_deadlock_lists_cycle() {
    let error = deadlock();
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("Abort tx-2"));
    assert_eq!(
        context.details,
        Some("Wait-for cycle: tx-2 -> tx-1 -> tx-2".to_string())
    );
}

#[test]
fn test_error_context_lock_not_found() {
    let error = TxlockError::LockNotFound {
        resource: "node(4)".to_string(),
        transaction: "tx-9".to_string(),
        mode: LockMode::Read,
    };
    let context = ErrorContext::new(&error);

    assert!(context.suggestion.unwrap().contains("read release"));
    assert!(context.details.is_none());
    assert_eq!(error.to_string(), "tx-9 holds no read lock on node(4)");
}

#[test]
fn test_error_context_illegal_resource() {
    let error = TxlockError::IllegalResource("\"\"".to_string());
    let context = ErrorContext::new(&error);

    assert_eq!(context.details, Some("Rejected resource: \"\"".to_string()));
    assert!(context.suggestion.unwrap().contains("non-empty identifiers"));
}

#[test]
fn test_error_context_display() {
    let error = TxlockError::InvalidConfig("workers must be positive".to_string());
    let display = ErrorContext::new(&error).to_string();

    assert!(display.starts_with("Error: Invalid configuration: workers must be positive"));
    assert!(display.contains("Details:"));
    assert!(display.contains("Suggestion:"));
}

#[test]
fn test_exit_codes() {
    assert_eq!(get_exit_code(&deadlock()), 40);
    assert_eq!(
        get_exit_code(&TxlockError::LockNotFound {
            resource: "r".to_string(),
            transaction: "t".to_string(),
            mode: LockMode::Write,
        }),
        41
    );
    assert_eq!(get_exit_code(&TxlockError::IllegalResource(String::new())), 2);
    assert_eq!(get_exit_code(&TxlockError::ConfigError("x".to_string())), 2);

    let io = TxlockError::Io(std::io::Error::other("disk"));
    assert_eq!(get_exit_code(&io), 1);
}

#[test]
fn test_is_deadlock() {
    assert!(deadlock().is_deadlock());
    assert!(!TxlockError::ConfigError("x".to_string()).is_deadlock());
}

#[test]
fn test_format_error_chain() {
    let formatted = format_error_chain(&deadlock());
    assert!(formatted.contains("Deadlock detected"));
    assert!(formatted.contains("Details: Wait-for cycle"));
}

#[test]
fn test_format_error_with_color() {
    let formatted = format_error_with_color(&deadlock(), true);

    assert!(formatted.contains("\x1b[31m"));
    assert!(formatted.contains("Suggestions:"));
    assert!(formatted.contains("• Acquiring resources in a consistent order"));
    assert!(formatted.ends_with("\x1b[0m"));
}

#[test]
fn test_format_error_no_color_no_reset() {
    let formatted = format_error_with_color(&deadlock(), false);

    assert!(!formatted.contains("\x1b["));
    assert!(formatted.contains("Error:"));
    assert!(formatted.contains("Suggestions:"));
}
