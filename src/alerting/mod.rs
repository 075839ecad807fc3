//! Threshold evaluation and lifecycle notifications.
//!
//! Every new [`MetricSample`] is checked against the process-wide [`ThresholdConfig`]. A breach
//! of the CPU or the memory threshold raises an [`Alert`], unless the same container raised an
//! alert of the same category within the cool-down window.
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

mod error;
mod notification;
mod thresholds;

pub use error::{Error, Result};
pub use notification::{Alert, DEFAULT_NOTIFICATION_CAPACITY, Notification, NotificationStore};
pub use thresholds::{ThresholdConfig, ThresholdUpdate};

use crate::container::ContainerID;
use crate::model::{EventType, LifecycleAction, MetricSample, Severity};

/// Seconds in which repeated breaches of one category are suppressed.
pub const COOLDOWN_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Category {
    Cpu,
    Memory,
}

#[derive(Debug)]
pub struct AlertEngine {
    thresholds: RwLock<ThresholdConfig>,
    last_alert: DashMap<(ContainerID, Category), DateTime<Utc>>,
    cooldown: TimeDelta,
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new(ThresholdConfig::default())
    }
}

impl AlertEngine {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self {
            thresholds: RwLock::new(thresholds),
            last_alert: DashMap::new(),
            cooldown: TimeDelta::seconds(COOLDOWN_SECS),
        }
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        *self
            .thresholds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a partial update and returns the resulting configuration.
    pub fn update_thresholds(&self, update: &ThresholdUpdate) -> Result<ThresholdConfig> {
        let mut thresholds = self
            .thresholds
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *thresholds = thresholds.merge(update)?;
        log::info!("updated alert thresholds: {:?}", *thresholds);
        Ok(*thresholds)
    }

    /// Evaluates a sample against the thresholds.
    ///
    /// Each threshold is compared strictly, so a sample exactly at the threshold does not
    /// alert. Returns at most one alert per category.
    pub fn evaluate(
        &self,
        container_id: &ContainerID,
        container_name: &str,
        sample: &MetricSample,
    ) -> Vec<Alert> {
        let thresholds = self.thresholds();
        if !thresholds.enabled {
            return Vec::new();
        }

        let mut alerts = Vec::new();
        if sample.cpu_percent > thresholds.cpu_threshold
            && self.should_alert(container_id, Category::Cpu, sample.timestamp)
        {
            alerts.push(Alert {
                event_type: EventType::CpuThreshold,
                severity: Severity::Warning,
                title: "High CPU usage".to_owned(),
                message: format!(
                    "Container {container_name} is using {:.1}% CPU (threshold {}%)",
                    sample.cpu_percent, thresholds.cpu_threshold
                ),
                container_id: Some(container_id.clone()),
                container_name: Some(container_name.to_owned()),
                timestamp: sample.timestamp,
            });
        }
        if sample.memory_percent > thresholds.memory_threshold
            && self.should_alert(container_id, Category::Memory, sample.timestamp)
        {
            alerts.push(Alert {
                event_type: EventType::MemoryThreshold,
                severity: Severity::Warning,
                title: "High memory usage".to_owned(),
                message: format!(
                    "Container {container_name} is using {:.1}% memory (threshold {}%)",
                    sample.memory_percent, thresholds.memory_threshold
                ),
                container_id: Some(container_id.clone()),
                container_name: Some(container_name.to_owned()),
                timestamp: sample.timestamp,
            });
        }
        alerts
    }

    /// Records an alert at `at` unless one of the same category fired within the cool-down.
    fn should_alert(
        &self,
        container_id: &ContainerID,
        category: Category,
        at: DateTime<Utc>,
    ) -> bool {
        match self.last_alert.entry((container_id.clone(), category)) {
            Entry::Occupied(mut last) => {
                if at.signed_duration_since(*last.get()) < self.cooldown {
                    log::debug!("suppressing {category:?} alert for container `{container_id}`");
                    return false;
                }
                last.insert(at);
            }
            Entry::Vacant(last) => {
                last.insert(at);
            }
        }
        true
    }

    /// Builds the notification for a lifecycle action, if the configuration asks for one.
    ///
    /// Restarts are gated by `notify_on_start`.
    pub fn lifecycle_event(
        &self,
        container_id: &ContainerID,
        container_name: &str,
        action: LifecycleAction,
        timestamp: DateTime<Utc>,
    ) -> Option<Alert> {
        let thresholds = self.thresholds();
        let (event_type, severity, title, verb) = match action {
            LifecycleAction::Start if thresholds.notify_on_start => (
                EventType::ContainerStart,
                Severity::Success,
                "Container started",
                "started",
            ),
            LifecycleAction::Restart if thresholds.notify_on_start => (
                EventType::ContainerRestart,
                Severity::Info,
                "Container restarted",
                "restarted",
            ),
            LifecycleAction::Stop if thresholds.notify_on_stop => (
                EventType::ContainerStop,
                Severity::Info,
                "Container stopped",
                "stopped",
            ),
            _ => return None,
        };

        Some(Alert {
            event_type,
            severity,
            title: title.to_owned(),
            message: format!("Container {container_name} was {verb}"),
            container_id: Some(container_id.clone()),
            container_name: Some(container_name.to_owned()),
            timestamp,
        })
    }
}
