use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use super::MetricSample;
use crate::container::ContainerID;

/// Lifecycle status of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Running,
    Stopped,
    Restarting,
    Paused,
    Exited,
    Dead,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Restarting => "restarting",
            ContainerStatus::Paused => "paused",
            ContainerStatus::Exited => "exited",
            ContainerStatus::Dead => "dead",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized view of a single container.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSnapshot {
    pub id: ContainerID,
    pub name: String,
    pub image: String,
    /// Image identifier, only known when listed through the socket transport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    pub status: ContainerStatus,
    /// Raw status text as reported by the runtime, e.g. `Up 2 hours`.
    pub status_text: String,
    pub created: Option<DateTime<Utc>>,
    pub ports: Vec<String>,
    pub uptime: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub cpu_percent: f64,
    pub memory_usage: String,
    pub memory_limit: String,
}

impl ContainerSnapshot {
    /// Fills the last-known metric fields from a sample.
    pub fn apply_sample(&mut self, sample: &MetricSample) {
        self.cpu_percent = sample.cpu_percent;
        self.memory_usage = crate::normalize::format_size(sample.memory_usage);
        self.memory_limit = crate::normalize::format_size(sample.memory_limit);
    }
}

/// The result of a stats call for one container.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStats {
    pub id: ContainerID,
    #[serde(flatten)]
    pub sample: MetricSample,
    pub memory_usage_text: String,
    pub memory_limit_text: String,
}

impl ContainerStats {
    pub fn new(id: ContainerID, sample: MetricSample) -> Self {
        Self {
            memory_usage_text: crate::normalize::format_size(sample.memory_usage),
            memory_limit_text: crate::normalize::format_size(sample.memory_limit),
            id,
            sample,
        }
    }
}

/// Lifecycle operations on a single container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    Start,
    Stop,
    Restart,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Stop => "stop",
            LifecycleAction::Restart => "restart",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LifecycleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(LifecycleAction::Start),
            "stop" => Ok(LifecycleAction::Stop),
            "restart" => Ok(LifecycleAction::Restart),
            other => Err(format!("unknown lifecycle action `{other}`")),
        }
    }
}
