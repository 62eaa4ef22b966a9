//! Optional `.pulse/config.toml` overriding validation thresholds.

use crate::core::error::DocPulseError;
use crate::core::store::Store;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Days a tracked document may lag its sources before it is stale.
    pub staleness_days: i64,
    /// Days after which unresolved high-priority debt is flagged.
    pub debt_age_days: i64,
    /// Wall-clock budget per validator, in seconds.
    pub validator_budget_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            staleness_days: 30,
            debt_age_days: 30,
            validator_budget_secs: 30,
        }
    }
}

impl ValidationConfig {
    /// Load from `.pulse/config.toml`, falling back to defaults when the
    /// file is absent. A present-but-invalid file is an error, not a
    /// silent fallback.
    pub fn load(store: &Store) -> Result<Self, DocPulseError> {
        let path = store.config_path();
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(DocPulseError::IoError)?;
        toml::from_str(&content).map_err(|e| {
            DocPulseError::ValidationError(format!("invalid {}: {}", path.display(), e))
        })
    }
}
