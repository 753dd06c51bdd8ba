mod resolver;

pub use resolver::{
    PollIntervalResolver, PollResolution, SettingParseError, SettingSource,
    TERMINATION_POLL_ENV, parse_millis_override, resolve_termination_poll,
};

use crate::error::{Result, TxlockError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "txlock.toml";
pub const DEFAULT_TERMINATION_POLL_MS: u64 = 50;
const DEFAULT_DUMP_TIMEOUT_MS: u64 = 250;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TxlockConfig {
    #[serde(default)]
    pub locking: LockingConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Tuning for the lock manager itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockingConfig {
    /// Upper bound on how long a parked waiter goes without re-checking
    /// whether its transaction was terminated.
    #[serde(default = "default_termination_poll_ms")]
    pub termination_poll_ms: u64,

    /// How long `dump_locks` waits for the table before reporting it busy.
    #[serde(default = "default_dump_timeout_ms")]
    pub dump_timeout_ms: u64,

    /// Log a dump of the contended resource whenever a wait is refused.
    #[serde(default)]
    pub dump_on_deadlock: bool,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            termination_poll_ms: DEFAULT_TERMINATION_POLL_MS,
            dump_timeout_ms: DEFAULT_DUMP_TIMEOUT_MS,
            dump_on_deadlock: false,
        }
    }
}

impl LockingConfig {
    pub fn termination_poll(&self) -> Duration {
        Duration::from_millis(self.termination_poll_ms)
    }

    pub fn dump_timeout(&self) -> Duration {
        Duration::from_millis(self.dump_timeout_ms)
    }
}

fn default_termination_poll_ms() -> u64 {
    DEFAULT_TERMINATION_POLL_MS
}

fn default_dump_timeout_ms() -> u64 {
    DEFAULT_DUMP_TIMEOUT_MS
}

/// Shape of the random workload run by `txlock simulate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub workers: usize,
    pub resources: usize,
    pub transactions_per_worker: usize,
    pub locks_per_transaction: usize,
    /// Fraction of lock requests that ask for write mode.
    pub write_ratio: f64,
    pub hold_micros: u64,
    /// Waits longer than this are logged as warnings.
    pub slow_wait_ms: u64,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            resources: 16,
            transactions_per_worker: 200,
            locks_per_transaction: 3,
            write_ratio: 0.3,
            hold_micros: 50,
            slow_wait_ms: 100,
            seed: None,
        }
    }
}

impl TxlockConfig {
    pub fn load(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            log::debug!("Config file not found at {config_path:?}, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: TxlockConfig = toml::from_str(&contents)
            .map_err(|e| TxlockError::ConfigError(format!("Failed to parse {CONFIG_FILE_NAME}: {e}")))?;
        config.validate()?;

        log::debug!("Loaded config from {config_path:?}");
        Ok(config)
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| TxlockError::ConfigError(format!("Failed to serialize config: {e}")))?;

        fs::write(&config_path, contents)?;
        log::debug!("Saved config to {config_path:?}");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.locking.termination_poll_ms == 0 {
            return Err(TxlockError::InvalidConfig(
                "locking.termination_poll_ms must be at least 1".to_string(),
            ));
        }

        let simulation = &self.simulation;
        for (name, value) in [
            ("workers", simulation.workers),
            ("resources", simulation.resources),
            ("locks_per_transaction", simulation.locks_per_transaction),
        ] {
            if value == 0 {
                return Err(TxlockError::InvalidConfig(format!(
                    "simulation.{name} must be positive"
                )));
            }
        }
        if !(0.0..=1.0).contains(&simulation.write_ratio) {
            return Err(TxlockError::InvalidConfig(format!(
                "simulation.write_ratio must be between 0 and 1, got {}",
                simulation.write_ratio
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = TxlockConfig::default();
        assert_eq!(config.locking.termination_poll(), Duration::from_millis(50));
        assert_eq!(config.locking.dump_timeout(), Duration::from_millis(250));
        assert!(!config.locking.dump_on_deadlock);
        assert_eq!(config.simulation.workers, 8);
        assert_eq!(config.simulation.seed, None);
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = TxlockConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config.locking, LockingConfig::default());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();

        let mut config = TxlockConfig::default();
        config.locking.termination_poll_ms = 5;
        config.simulation.seed = Some(42);

        config.save(temp_dir.path()).unwrap();

        let loaded = TxlockConfig::load(temp_dir.path()).unwrap();
        assert_eq!(loaded.locking.termination_poll_ms, 5);
        assert_eq!(loaded.simulation.seed, Some(42));
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);

        fs::write(
            &config_path,
            r#"
[locking]
dump_on_deadlock = true

[simulation]
workers = 2
"#,
        )
        .unwrap();

        let loaded = TxlockConfig::load(temp_dir.path()).unwrap();
        assert!(loaded.locking.dump_on_deadlock);
        assert_eq!(loaded.locking.termination_poll_ms, DEFAULT_TERMINATION_POLL_MS);
        assert_eq!(loaded.simulation.workers, 2);
        assert_eq!(loaded.simulation.resources, 16);
    }

    #[test]
    fn test_malformed_config_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "[locking\n").unwrap();

        let err = TxlockConfig::load(temp_dir.path()).unwrap_err();
        assert!(matches!(err, TxlockError::ConfigError(_)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = TxlockConfig::default();
        config.simulation.write_ratio = 1.5;
        assert!(matches!(config.validate(), Err(TxlockError::InvalidConfig(_))));

        let mut config = TxlockConfig::default();
        config.simulation.workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("simulation.workers"));

        let mut config = TxlockConfig::default();
        config.locking.termination_poll_ms = 0;
        assert!(config.validate().is_err());
    }
}
