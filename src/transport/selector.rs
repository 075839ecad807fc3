use std::sync::{PoisonError, RwLock};

use super::{CliTransport, Error, Result, SocketTransport, Transport, TransportKind};
use crate::metrics::RawStats;
use crate::model::{
    ComposeAction, ComposeProject, ContainerSnapshot, ImageSnapshot, LifecycleAction, PruneReport,
    RuntimeVersion,
};

/// Runs `first` and, if it fails, `second`.
///
/// Both futures are lazy, so `second` only runs when `first` failed. If both fail the error
/// carries every attempt.
pub async fn try_in_order<T, A, B>(
    operation: &'static str,
    first: (TransportKind, A),
    second: (TransportKind, B),
) -> Result<T>
where
    A: Future<Output = Result<T>>,
    B: Future<Output = Result<T>>,
{
    let (first_kind, first) = first;
    let first_err = match first.await {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let (second_kind, second) = second;
    log::debug!("{operation} via {first_kind} failed, falling back to {second_kind}: {first_err}");
    match second.await {
        Ok(value) => Ok(value),
        Err(second_err) => Err(Error::AllFailed {
            operation,
            attempts: vec![(first_kind, first_err), (second_kind, second_err)],
        }),
    }
}

/// Chooses between the socket and the CLI transport.
///
/// [`Selector::connect`] probes both transports and remembers the live one. Every call tries
/// the remembered transport first and falls back to the other one for that call only; the
/// remembered transport changes only when [`Selector::connect`] runs again. Without a live
/// transport, calls still try the socket first.
#[derive(Debug)]
pub struct Selector<S = SocketTransport, C = CliTransport> {
    socket: S,
    cli: C,
    active: RwLock<Option<TransportKind>>,
}

impl<S, C> Selector<S, C>
where
    S: Transport,
    C: Transport,
{
    pub fn new(socket: S, cli: C) -> Self {
        Self {
            socket,
            cli,
            active: RwLock::new(None),
        }
    }

    /// Probes the socket transport, then the CLI transport, and remembers the first live one.
    pub async fn connect(&self) -> Option<TransportKind> {
        let selected = match self.socket.ping().await {
            Ok(()) => Some(TransportKind::Socket),
            Err(socket_err) => {
                log::debug!("socket transport probe failed: {socket_err}");
                match self.cli.ping().await {
                    Ok(()) => Some(TransportKind::Cli),
                    Err(cli_err) => {
                        log::warn!(
                            "no runtime transport available: socket: {socket_err}; cli: {cli_err}"
                        );
                        None
                    }
                }
            }
        };

        *self.active.write().unwrap_or_else(PoisonError::into_inner) = selected;
        if let Some(kind) = selected {
            log::info!("using {kind} transport");
        }
        selected
    }

    /// The transport remembered by the last [`Selector::connect`].
    pub fn active(&self) -> Option<TransportKind> {
        *self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn call<'a, T, FS, FC>(
        &'a self,
        operation: &'static str,
        on_socket: impl FnOnce(&'a S) -> FS,
        on_cli: impl FnOnce(&'a C) -> FC,
    ) -> Result<T>
    where
        FS: Future<Output = Result<T>>,
        FC: Future<Output = Result<T>>,
    {
        match self.active() {
            Some(TransportKind::Cli) => {
                try_in_order(
                    operation,
                    (TransportKind::Cli, on_cli(&self.cli)),
                    (TransportKind::Socket, on_socket(&self.socket)),
                )
                .await
            }
            Some(TransportKind::Socket) | None => {
                try_in_order(
                    operation,
                    (TransportKind::Socket, on_socket(&self.socket)),
                    (TransportKind::Cli, on_cli(&self.cli)),
                )
                .await
            }
        }
    }

    pub async fn version(&self) -> Result<RuntimeVersion> {
        self.call("version", |s| s.version(), |c| c.version()).await
    }

    pub async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSnapshot>> {
        self.call(
            "list containers",
            |s| s.list_containers(all),
            |c| c.list_containers(all),
        )
        .await
    }

    pub async fn stats(&self, container: &str) -> Result<RawStats> {
        self.call("stats", |s| s.stats(container), |c| c.stats(container))
            .await
    }

    pub async fn logs(&self, container: &str, tail: usize, timestamps: bool) -> Result<String> {
        self.call(
            "logs",
            |s| s.logs(container, tail, timestamps),
            |c| c.logs(container, tail, timestamps),
        )
        .await
    }

    pub async fn lifecycle(
        &self,
        container: &str,
        action: LifecycleAction,
        timeout: Option<u32>,
    ) -> Result<()> {
        self.call(
            "lifecycle",
            |s| s.lifecycle(container, action, timeout),
            |c| c.lifecycle(container, action, timeout),
        )
        .await
    }

    pub async fn list_images(&self, all: bool) -> Result<Vec<ImageSnapshot>> {
        self.call(
            "list images",
            |s| s.list_images(all),
            |c| c.list_images(all),
        )
        .await
    }

    pub async fn remove_image(&self, image: &str, force: bool) -> Result<()> {
        self.call(
            "remove image",
            |s| s.remove_image(image, force),
            |c| c.remove_image(image, force),
        )
        .await
    }

    pub async fn prune_images(&self) -> Result<PruneReport> {
        self.call("prune images", |s| s.prune_images(), |c| c.prune_images())
            .await
    }

    pub async fn list_compose_projects(&self) -> Result<Vec<ComposeProject>> {
        self.call(
            "list compose projects",
            |s| s.list_compose_projects(),
            |c| c.list_compose_projects(),
        )
        .await
    }

    pub async fn compose_action(&self, project: &str, action: ComposeAction) -> Result<()> {
        self.call(
            "compose action",
            |s| s.compose_action(project, action),
            |c| c.compose_action(project, action),
        )
        .await
    }
}
