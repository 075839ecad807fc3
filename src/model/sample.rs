use chrono::{DateTime, Utc};

/// One timestamped metrics reading for a container.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    /// CPU usage in percent, clamped to `0..=100`.
    pub cpu_percent: f64,
    /// Memory usage in bytes.
    pub memory_usage: u64,
    /// Memory limit in bytes.
    pub memory_limit: u64,
    /// Memory usage in percent of the limit, clamped to `0..=100`.
    pub memory_percent: f64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
}

impl MetricSample {
    pub fn new(
        timestamp: DateTime<Utc>,
        cpu_percent: f64,
        memory_usage: u64,
        memory_limit: u64,
        memory_percent: f64,
        network_rx_bytes: u64,
        network_tx_bytes: u64,
    ) -> Self {
        Self {
            timestamp,
            cpu_percent: clamp_percent(cpu_percent),
            memory_usage,
            memory_limit,
            memory_percent: clamp_percent(memory_percent),
            network_rx_bytes,
            network_tx_bytes,
        }
    }

    /// A zero-valued sample used when stats for a container could not be read.
    pub fn placeholder(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, 0.0, 0, 0, 0.0, 0, 0)
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}
