//! Governor configuration with validation clamps.

use serde::{Deserialize, Serialize};

use crate::sched::{Algorithm, Mode};

/// Floor for the time-slice hint.
pub const MIN_TIME_SLICE_MS: u64 = 1;

/// Floor for the suspension memory threshold.
pub const MIN_MEM_THRESHOLD_MB: f64 = 50.0;

pub const DEFAULT_TIME_SLICE_MS: u64 = 5;
pub const DEFAULT_MEM_THRESHOLD_MB: f64 = 200.0;

/// Tuning knobs for the governor.
///
/// Out-of-range values are clamped up to their minimum rather than rejected,
/// both on `set_params` and on load from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorConfig {
    pub mode: Mode,
    pub algorithm: Algorithm,
    /// Retained as a hint for future policies; no current algorithm consults
    /// it. The round cadence is fixed at about one second.
    pub time_slice_ms: u64,
    /// Resident-size threshold above which a background process may be
    /// parked under pressure or power-saving.
    pub mem_threshold_mb: f64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Productivity,
            algorithm: Algorithm::Hybrid,
            time_slice_ms: DEFAULT_TIME_SLICE_MS,
            mem_threshold_mb: DEFAULT_MEM_THRESHOLD_MB,
        }
    }
}

impl GovernorConfig {
    /// Store the tuning knobs, clamping each to its minimum.
    pub fn set_params(&mut self, time_slice_ms: u64, mem_threshold_mb: f64) {
        self.time_slice_ms = time_slice_ms.max(MIN_TIME_SLICE_MS);
        self.mem_threshold_mb = mem_threshold_mb.max(MIN_MEM_THRESHOLD_MB);
    }

    /// Return a copy with all knobs forced into range.
    pub fn clamped(mut self) -> Self {
        let (slice, threshold) = (self.time_slice_ms, self.mem_threshold_mb);
        self.set_params(slice, threshold);
        self
    }

    /// Load from a TOML file, clamping whatever it contained.
    pub fn load(path: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config.clamped())
    }

    /// Save as pretty-printed TOML.
    pub fn save(&self, path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
