pub mod scenario;
pub mod simulate;

use crate::config::{LockingConfig, TxlockConfig, resolve_termination_poll};
use crate::error::Result;

/// Locking settings with the poll interval resolved against CLI and environment overrides.
pub fn effective_locking(config: &TxlockConfig, poll_override: Option<&str>) -> Result<LockingConfig> {
    let resolution = resolve_termination_poll(poll_override, &config.locking)?;
    let mut locking = config.locking.clone();
    locking.termination_poll_ms = u64::try_from(resolution.value.as_millis()).unwrap_or(u64::MAX);
    Ok(locking)
}
