// Stress harness configuration, read from TOML.
//
//     callers = 256
//     rounds = 50
//     construction_delay_ms = 2
//     variants = ["double_checked", "once"]
//
// Every field is optional; missing ones take the defaults below.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PatternError, Result};
use crate::stress::Variant;

pub const MAX_CALLERS: usize = 4096;
pub const MAX_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StressConfig {
    /// Threads racing for the first access in each round.
    pub callers: usize,
    /// Fresh holders built per variant.
    pub rounds: usize,
    /// How long the constructor sleeps, widening the race window.
    pub construction_delay_ms: u64,
    pub variants: Vec<Variant>,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            callers: 128,
            rounds: 20,
            construction_delay_ms: 1,
            variants: Variant::ALL.to_vec(),
        }
    }
}

impl StressConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: StressConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.callers == 0 || self.callers > MAX_CALLERS {
            return Err(PatternError::invalid_config(
                "callers",
                format!("must be between 1 and {}, got {}", MAX_CALLERS, self.callers),
            ));
        }
        if self.rounds == 0 {
            return Err(PatternError::invalid_config("rounds", "must be at least 1"));
        }
        if self.construction_delay_ms > MAX_DELAY_MS {
            return Err(PatternError::invalid_config(
                "construction_delay_ms",
                format!("must be at most {}, got {}", MAX_DELAY_MS, self.construction_delay_ms),
            ));
        }
        if self.variants.is_empty() {
            return Err(PatternError::invalid_config(
                "variants",
                "must name at least one variant",
            ));
        }
        Ok(())
    }

    pub fn construction_delay(&self) -> Duration {
        Duration::from_millis(self.construction_delay_ms)
    }
}
