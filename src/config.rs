//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration. Call [`EngineConfig::validate`] after loading.

use serde::{Deserialize, Serialize};

use crate::error::{MoocletResult, ValidationError};

/// Simulation defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Iterations used by scheduled recomputation.
    pub default_iterations: usize,
    /// Iterations used for quick diagnostic runs.
    pub diagnostic_iterations: usize,
    /// Number of worker threads per run.
    pub workers: usize,
    /// Seed for reproducible runs; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_iterations: 10_000,
            diagnostic_iterations: 100,
            workers: 4,
            seed: None,
        }
    }
}

/// Measurement facade settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Attempts at get-or-create before giving up on a contended name.
    pub variable_create_retries: usize,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            variable_create_retries: 5,
        }
    }
}

/// Settings for the write-ahead-logged backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentConfig {
    /// fsync after every append.
    pub sync_on_write: bool,
    /// Log size that triggers compaction (bytes).
    pub max_wal_size: u64,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
            max_wal_size: 64 * 1024 * 1024,
        }
    }
}

impl PersistentConfig {
    const MIN_WAL_SIZE: u64 = 4 * 1024;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_wal_size < Self::MIN_WAL_SIZE {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "persistent.max_wal_size must be at least {} bytes (got {})",
                    Self::MIN_WAL_SIZE,
                    self.max_wal_size
                ),
            });
        }
        Ok(())
    }
}

/// Top-level configuration.
///
/// # Examples
///
/// ```
/// use mooclet::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{"simulation": {"workers": 2}}"#).unwrap();
/// assert_eq!(config.simulation.workers, 2);
/// assert_eq!(config.simulation.default_iterations, 10_000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub simulation: SimulationConfig,
    pub measurements: MeasurementConfig,
    pub persistent: PersistentConfig,
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json(raw: &str) -> MoocletResult<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|e| ValidationError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let checks = [
            (
                self.simulation.default_iterations,
                "simulation.default_iterations",
            ),
            (
                self.simulation.diagnostic_iterations,
                "simulation.diagnostic_iterations",
            ),
            (self.simulation.workers, "simulation.workers"),
            (
                self.measurements.variable_create_retries,
                "measurements.variable_create_retries",
            ),
        ];
        for (value, field) in checks {
            if value == 0 {
                return Err(ValidationError::InvalidConfig {
                    reason: format!("{field} must be greater than zero"),
                });
            }
        }
        self.persistent.validate()
    }
}
