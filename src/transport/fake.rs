use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{Error, Result, Transport, TransportKind};
use crate::metrics::RawStats;
use crate::model::{
    ComposeAction, ComposeProject, ContainerSnapshot, ImageSnapshot, LifecycleAction, PruneReport,
    RuntimeVersion,
};

/// A scriptable transport recording how often it was used.
///
/// Every call fails while `healthy` is unset. Stats are answered from `stats`, keyed by
/// container id. Containers may be addressed by name or id prefix; unknown containers fail
/// with a 404.
#[derive(Debug, Clone)]
pub(crate) struct FakeTransport {
    kind: TransportKind,
    pub healthy: Arc<AtomicBool>,
    pub calls: Arc<AtomicUsize>,
    pub containers: Vec<ContainerSnapshot>,
    pub images: Vec<ImageSnapshot>,
    pub stats: HashMap<String, RawStats>,
}

impl FakeTransport {
    pub(crate) fn new(kind: TransportKind, healthy: bool) -> Self {
        Self {
            kind,
            healthy: Arc::new(AtomicBool::new(healthy)),
            calls: Arc::default(),
            containers: Vec::new(),
            images: Vec::new(),
            stats: HashMap::new(),
        }
    }

    fn check(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Status {
                status: 500,
                message: format!("{} down", self.kind),
            })
        }
    }
}

impl Transport for FakeTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }

    async fn version(&self) -> Result<RuntimeVersion> {
        self.check()?;
        Ok(RuntimeVersion {
            version: self.kind.to_string(),
            ..Default::default()
        })
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSnapshot>> {
        self.check()?;
        Ok(self
            .containers
            .iter()
            .filter(|c| all || c.status.is_running())
            .cloned()
            .collect())
    }

    async fn stats(&self, container: &str) -> Result<RawStats> {
        self.check()?;
        let id = self
            .containers
            .iter()
            .find(|c| c.name == container || c.id.as_str().starts_with(container))
            .map_or(container, |c| c.id.as_str());
        self.stats.get(id).cloned().ok_or(Error::Status {
            status: 404,
            message: format!("No such container: {container}"),
        })
    }

    async fn logs(&self, _container: &str, _tail: usize, _timestamps: bool) -> Result<String> {
        self.check()?;
        Ok(self.kind.to_string())
    }

    async fn lifecycle(
        &self,
        _container: &str,
        _action: LifecycleAction,
        _timeout: Option<u32>,
    ) -> Result<()> {
        self.check()
    }

    async fn list_images(&self, _all: bool) -> Result<Vec<ImageSnapshot>> {
        self.check()?;
        Ok(self.images.clone())
    }

    async fn remove_image(&self, _image: &str, _force: bool) -> Result<()> {
        self.check()
    }

    async fn prune_images(&self) -> Result<PruneReport> {
        self.check()?;
        Ok(PruneReport::default())
    }

    async fn list_compose_projects(&self) -> Result<Vec<ComposeProject>> {
        self.check()?;
        Ok(Vec::new())
    }

    async fn compose_action(&self, _project: &str, _action: ComposeAction) -> Result<()> {
        if self.kind == TransportKind::Socket {
            self.calls.fetch_add(1, Ordering::SeqCst);
            return Err(Error::Unsupported {
                transport: self.kind,
                operation: "compose action",
            });
        }
        self.check()
    }
}
