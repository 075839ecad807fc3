//! Derivation of point-in-time resource percentages from raw runtime counters.
//!
//! The socket transport reports cumulative CPU counters, so a CPU percentage needs two
//! temporally ordered readings. The [`MetricsEngine`] remembers the last reading per container
//! and falls back to the `precpu` reading the runtime attaches to one-shot stats. The CLI
//! transport reports pre-computed percentages that are taken as they are.
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::container::ContainerID;
use crate::model::MetricSample;

/// Cumulative CPU counters of a container and of the whole host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounters {
    /// Total CPU time consumed by the container.
    pub total_usage: u64,
    /// Total CPU time of the host.
    pub system_usage: u64,
}

/// Network counters summed over all interfaces of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkTotals {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
}

impl std::ops::AddAssign for NetworkTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.rx_bytes += rhs.rx_bytes;
        self.rx_packets += rhs.rx_packets;
        self.tx_bytes += rhs.tx_bytes;
        self.tx_packets += rhs.tx_packets;
    }
}

/// Raw counters as reported by the socket transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsCounters {
    pub cpu: CpuCounters,
    /// The reading preceding `cpu`, if the runtime attached one.
    pub precpu: Option<CpuCounters>,
    pub online_cpus: u32,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub network: NetworkTotals,
}

/// Figures the CLI transport reports already computed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PrecomputedStats {
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
}

/// Stats payload of a single container, in the shape of the transport that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawStats {
    Counters(StatsCounters),
    Precomputed(PrecomputedStats),
}

/// Computes the CPU usage between two readings.
///
/// Returns `0` unless both the container delta and the system delta are positive.
pub fn compute_cpu_percent(prev: &CpuCounters, curr: &CpuCounters, online_cpus: u32) -> f64 {
    let cpu_delta = curr.total_usage as i128 - prev.total_usage as i128;
    let system_delta = curr.system_usage as i128 - prev.system_usage as i128;
    if cpu_delta <= 0 || system_delta <= 0 {
        return 0.0;
    }
    let online_cpus = online_cpus.max(1) as f64;

    (cpu_delta as f64 / system_delta as f64) * online_cpus * 100.0
}

/// Computes the memory usage in percent of the limit, `0` for an unknown limit.
pub fn compute_memory_percent(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    usage as f64 / limit as f64 * 100.0
}

/// Turns raw stats payloads into [`MetricSample`]s.
#[derive(Debug, Default)]
pub struct MetricsEngine {
    previous: DashMap<ContainerID, CpuCounters>,
}

impl MetricsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a sample and remembers the CPU counters for the next call.
    pub fn sample(
        &self,
        container_id: &ContainerID,
        raw: &RawStats,
        timestamp: DateTime<Utc>,
    ) -> MetricSample {
        match raw {
            RawStats::Counters(counters) => {
                let previous = self.previous.insert(container_id.clone(), counters.cpu);
                let cpu_percent = match previous.or(counters.precpu) {
                    Some(prev) => compute_cpu_percent(&prev, &counters.cpu, counters.online_cpus),
                    None => {
                        log::trace!("first cpu reading for container `{container_id}`");
                        0.0
                    }
                };
                MetricSample::new(
                    timestamp,
                    cpu_percent,
                    counters.memory_usage,
                    counters.memory_limit,
                    compute_memory_percent(counters.memory_usage, counters.memory_limit),
                    counters.network.rx_bytes,
                    counters.network.tx_bytes,
                )
            }
            RawStats::Precomputed(stats) => MetricSample::new(
                timestamp,
                stats.cpu_percent,
                stats.memory_usage,
                stats.memory_limit,
                compute_memory_percent(stats.memory_usage, stats.memory_limit),
                0,
                0,
            ),
        }
    }

    /// Drops the remembered counters of a container, e.g. after it was restarted.
    pub fn forget(&self, container_id: &ContainerID) {
        self.previous.remove(container_id);
    }
}
