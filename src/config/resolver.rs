// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::config::{DEFAULT_TERMINATION_POLL_MS, LockingConfig};
use crate::error::{Result, TxlockError};
use std::env;
use std::fmt;
use std::time::Duration;

pub const TERMINATION_POLL_ENV: &str = "TXLOCK_TERMINATION_POLL_MS";

/// Source precedence used when resolving an effective setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingSource {
    #[default]
    Default,
    Config,
    Environment,
    Cli,
}

impl fmt::Display for SettingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SettingSource::Default => "built-in default",
            SettingSource::Config => "configuration file",
            SettingSource::Environment => "environment variable",
            SettingSource::Cli => "CLI flag",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollResolution {
    pub value: Duration,
    pub source: SettingSource,
}

/// Error produced when parsing an interval override fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingParseError {
    message: String,
}

impl fmt::Display for SettingParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SettingParseError {}

impl SettingParseError {
    fn invalid_value(value: &str) -> Self {
        Self {
            message: format!(
                "Interval '{value}' is invalid. Use a positive whole number of milliseconds, \
                 optionally suffixed with 'ms'."
            ),
        }
    }
}

/// Parses a millisecond override such as `25` or `25ms`.
pub fn parse_millis_override(value: &str) -> std::result::Result<Duration, SettingParseError> {
    let trimmed = value.trim();
    let digits = trimmed.strip_suffix("ms").unwrap_or(trimmed).trim_end();

    match digits.parse::<u64>() {
        Ok(millis) if millis > 0 => Ok(Duration::from_millis(millis)),
        _ => Err(SettingParseError::invalid_value(trimmed)),
    }
}

/// Resolves the termination poll interval with CLI > env > config > default precedence.
pub struct PollIntervalResolver<'a> {
    cli_override: Option<&'a str>,
    env_override: Option<&'a str>,
    config_value: Duration,
    default_value: Duration,
}

impl<'a> PollIntervalResolver<'a> {
    pub fn new(
        cli_override: Option<&'a str>,
        env_override: Option<&'a str>,
        config_value: Duration,
        default_value: Duration,
    ) -> Self {
        Self {
            cli_override,
            env_override,
            config_value,
            default_value,
        }
    }

    pub fn resolve(self) -> std::result::Result<PollResolution, SettingParseError> {
        if let Some(cli_value) = self.cli_override {
            return Ok(PollResolution {
                value: parse_millis_override(cli_value)?,
                source: SettingSource::Cli,
            });
        }

        if let Some(env_value) = self.env_override {
            return Ok(PollResolution {
                value: parse_millis_override(env_value)?,
                source: SettingSource::Environment,
            });
        }

        if self.config_value != self.default_value {
            return Ok(PollResolution {
                value: self.config_value,
                source: SettingSource::Config,
            });
        }

        Ok(PollResolution {
            value: self.default_value,
            source: SettingSource::Default,
        })
    }
}

/// Resolves the poll interval for `config`, consulting `TXLOCK_TERMINATION_POLL_MS`.
pub fn resolve_termination_poll(
    cli_override: Option<&str>,
    config: &LockingConfig,
) -> Result<PollResolution> {
    let env_value = env::var(TERMINATION_POLL_ENV).ok();
    let resolution = PollIntervalResolver::new(
        cli_override,
        env_value.as_deref(),
        config.termination_poll(),
        Duration::from_millis(DEFAULT_TERMINATION_POLL_MS),
    )
    .resolve()
    .map_err(|e| TxlockError::InvalidConfig(e.to_string()))?;

    log::debug!(
        "Termination poll interval {}ms from {}",
        resolution.value.as_millis(),
        resolution.source
    );
    Ok(resolution)
}
