//! Canonical, transport-independent views of runtime entities.
//!
//! Every type in this module is a point-in-time snapshot. Snapshots are created per poll by the
//! [`normalize`](crate::normalize) functions and never mutated afterwards.
mod compose;
mod container;
mod event;
mod image;
mod sample;

pub use compose::{ComposeAction, ComposeProject, ComposeService, ComposeStatus};
pub use container::{ContainerSnapshot, ContainerStats, ContainerStatus, LifecycleAction};
pub use event::{EventType, Severity};
pub use image::{ImageSnapshot, PruneReport};
pub use sample::MetricSample;

/// Version information reported by the runtime daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersion {
    pub version: String,
    pub api_version: String,
    pub os: String,
    pub arch: String,
}
