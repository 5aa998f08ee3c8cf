//! Engine configuration
//!
//! Loaded from TOML with every field optional; missing fields take the
//! defaults below.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::platform::SamplingRate;

/// Tunables for the fusion engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cadence requested for accelerometer and magnetometer streams
    pub heading_rate: SamplingRate,
    /// Cadence requested for the step counter stream
    pub step_rate: SamplingRate,
    /// Gravity must exceed this fraction of standard gravity to compute a heading
    pub free_fall_gravity_ratio: f32,
    /// Minimum |magnetic x gravity| before the field counts as collinear with gravity
    pub min_field_strength: f32,
    /// Capacity of queued subscriber channels
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heading_rate: SamplingRate::Ui,
            step_rate: SamplingRate::Normal,
            free_fall_gravity_ratio: 0.1,
            min_field_strength: 0.1,
            queue_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Default location: `<config dir>/compass-fusion/engine.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("compass-fusion")
            .join("engine.toml")
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(contents).context("Invalid engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), "engine configuration loaded");
        Ok(config)
    }

    /// Like [`EngineConfig::load`], falling back to defaults on any failure
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Using default engine configuration: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize engine configuration")
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.free_fall_gravity_ratio > 0.0 && self.free_fall_gravity_ratio < 1.0) {
            anyhow::bail!(
                "free_fall_gravity_ratio out of range (0, 1): {}",
                self.free_fall_gravity_ratio
            );
        }
        if !(self.min_field_strength > 0.0 && self.min_field_strength.is_finite()) {
            anyhow::bail!("min_field_strength must be positive: {}", self.min_field_strength);
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be at least 1");
        }
        Ok(())
    }
}
