use super::{Error, Result};

pub const DEFAULT_CPU_THRESHOLD: f64 = 80.0;
pub const DEFAULT_MEMORY_THRESHOLD: f64 = 80.0;

/// Process-wide alerting configuration.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    /// Whether samples are evaluated against the thresholds at all.
    pub enabled: bool,
    pub cpu_threshold: f64,
    pub memory_threshold: f64,
    /// Whether start and restart events produce a notification.
    pub notify_on_start: bool,
    pub notify_on_stop: bool,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cpu_threshold: DEFAULT_CPU_THRESHOLD,
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            notify_on_start: true,
            notify_on_stop: true,
        }
    }
}

impl ThresholdConfig {
    /// Returns a copy with every field present in `update` replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidThreshold`] if a resulting threshold is not within `0..=100`.
    pub fn merge(&self, update: &ThresholdUpdate) -> Result<Self> {
        let merged = Self {
            enabled: update.enabled.unwrap_or(self.enabled),
            cpu_threshold: update.cpu_threshold.unwrap_or(self.cpu_threshold),
            memory_threshold: update.memory_threshold.unwrap_or(self.memory_threshold),
            notify_on_start: update.notify_on_start.unwrap_or(self.notify_on_start),
            notify_on_stop: update.notify_on_stop.unwrap_or(self.notify_on_stop),
        };
        merged.validate()?;
        Ok(merged)
    }

    pub fn validate(&self) -> Result<()> {
        validate_percentage("cpu", self.cpu_threshold)?;
        validate_percentage("memory", self.memory_threshold)
    }
}

fn validate_percentage(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidThreshold { name, value })
    }
}

/// A partial update of a [`ThresholdConfig`]; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdUpdate {
    pub enabled: Option<bool>,
    pub cpu_threshold: Option<f64>,
    pub memory_threshold: Option<f64>,
    pub notify_on_start: Option<bool>,
    pub notify_on_stop: Option<bool>,
}
