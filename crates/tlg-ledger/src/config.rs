use std::path::Path;

use serde::{Deserialize, Serialize};
use tlg_types::{MAX_GROUP, MAX_SUB};

use crate::error::{LedgerError, LedgerResult};

/// Tunables for a [`Ledger`](crate::Ledger).
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// thread_create_attempts = 8
/// require_change_reason = false
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Highest group a thread may claim. At most 99.
    pub max_group: u32,
    /// Highest sub-number a thread may issue. At most 999.
    pub max_sub: u32,
    /// How many times thread creation rescans for a free group after losing
    /// a uniqueness race.
    pub thread_create_attempts: u32,
    /// Reject amendments with a blank change reason.
    pub require_change_reason: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_group: MAX_GROUP,
            max_sub: MAX_SUB,
            thread_create_attempts: 5,
            require_change_reason: true,
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(raw: &str) -> LedgerResult<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| LedgerError::validation(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Storage(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if !(1..=MAX_GROUP).contains(&self.max_group) {
            return Err(LedgerError::validation(format!(
                "max_group must be within 1..={MAX_GROUP}"
            )));
        }
        if !(1..=MAX_SUB).contains(&self.max_sub) {
            return Err(LedgerError::validation(format!(
                "max_sub must be within 1..={MAX_SUB}"
            )));
        }
        if self.thread_create_attempts == 0 {
            return Err(LedgerError::validation(
                "thread_create_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}
