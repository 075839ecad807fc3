//! Access to the container runtime daemon.
//!
//! Two interchangeable transports implement [`Transport`]:
//!
//! - [`SocketTransport`] talks HTTP to the daemon's versioned API over a Unix socket or TCP.
//! - [`CliTransport`] runs the runtime's command line client and parses its templated output.
//!
//! The [`Selector`] probes both, remembers which one is alive and falls back to the other one
//! for a single call whenever the active transport fails.
mod cli;
mod error;
mod selector;
mod socket;
mod unix;

#[cfg(test)]
pub(crate) mod fake;

use std::fmt;

pub use cli::{CliTransport, DEFAULT_CLI, DEFAULT_COMPOSE_LEGACY_CLI};
pub use error::{Error, Result};
pub use selector::{Selector, try_in_order};
pub use socket::{DEFAULT_API_VERSION, DEFAULT_SOCKET_PATH, Endpoint, SocketTransport};

use crate::metrics::RawStats;
use crate::model::{
    ComposeAction, ComposeProject, ContainerSnapshot, ImageSnapshot, LifecycleAction, PruneReport,
    RuntimeVersion,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Socket,
    Cli,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Socket => f.write_str("socket"),
            TransportKind::Cli => f.write_str("cli"),
        }
    }
}

/// Operations every runtime transport provides.
///
/// Container and image arguments accept anything the runtime accepts as a reference: ids,
/// id prefixes or names.
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// A lightweight liveness call.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    fn version(&self) -> impl Future<Output = Result<RuntimeVersion>> + Send;

    fn list_containers(
        &self,
        all: bool,
    ) -> impl Future<Output = Result<Vec<ContainerSnapshot>>> + Send;

    fn stats(&self, container: &str) -> impl Future<Output = Result<RawStats>> + Send;

    fn logs(
        &self,
        container: &str,
        tail: usize,
        timestamps: bool,
    ) -> impl Future<Output = Result<String>> + Send;

    fn lifecycle(
        &self,
        container: &str,
        action: LifecycleAction,
        timeout: Option<u32>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn list_images(&self, all: bool) -> impl Future<Output = Result<Vec<ImageSnapshot>>> + Send;

    fn remove_image(&self, image: &str, force: bool) -> impl Future<Output = Result<()>> + Send;

    fn prune_images(&self) -> impl Future<Output = Result<PruneReport>> + Send;

    fn list_compose_projects(&self) -> impl Future<Output = Result<Vec<ComposeProject>>> + Send;

    fn compose_action(
        &self,
        project: &str,
        action: ComposeAction,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Rejects references that could escape a URL path segment or a CLI argument.
pub(crate) fn validate_reference(reference: &str) -> Result<&str> {
    let valid = !reference.is_empty()
        && !reference.starts_with('-')
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':' | '/' | '@'));
    if valid {
        Ok(reference)
    } else {
        Err(Error::InvalidArgument(reference.to_owned()))
    }
}
