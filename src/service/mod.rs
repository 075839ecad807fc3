//! The monitoring service tying the runtime client to metrics, history and alerting.
//!
//! [`MonitorService`] owns all process-wide state: the remembered transport, the previous CPU
//! counters, the sample history, the thresholds and the notification list. It is constructed
//! once and shared behind an [`Arc`].
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;

mod error;

pub use error::{Error, Result};

use crate::alerting::{
    Alert, AlertEngine, Notification, NotificationStore, ThresholdConfig, ThresholdUpdate,
};
use crate::config::Config;
use crate::container::ContainerID;
use crate::error::ResultOkLogExt;
use crate::history::HistoryStore;
use crate::metrics::{MetricsEngine, RawStats};
use crate::model::{
    ComposeAction, ComposeProject, ContainerSnapshot, ContainerStats, ImageSnapshot,
    LifecycleAction, MetricSample, PruneReport, RuntimeVersion,
};
use crate::notify::{
    ChannelResult, ChannelStore, Channels, Dispatcher, JsonFileChannelStore, Mailer,
    NotificationEvent, Notifier, SmtpMailer, StaticChannelStore,
};
use crate::transport::{
    CliTransport, Selector, SocketTransport, Transport, TransportKind, validate_reference,
};

/// Connection state of the service.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub connected: bool,
    pub transport: Option<TransportKind>,
    pub version: Option<RuntimeVersion>,
    pub unread_notifications: usize,
}

#[derive(Debug)]
pub struct MonitorService<S = SocketTransport, C = CliTransport, CS = Channels, M = SmtpMailer> {
    selector: Selector<S, C>,
    metrics: MetricsEngine,
    history: HistoryStore,
    alerts: AlertEngine,
    notifications: NotificationStore,
    notifier: Arc<Notifier<CS, M>>,
    names: DashMap<ContainerID, String>,
}

impl MonitorService {
    /// Builds the service with the real transports and channels described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let socket = SocketTransport::new(
            config.endpoint.clone(),
            config.api_version.as_str(),
            config.command_timeout,
        );
        let cli = CliTransport::new(
            config.cli.as_str(),
            config.compose_legacy_cli.as_str(),
            config.command_timeout,
        );
        let channels = match &config.channels_file {
            Some(path) => Channels::File(JsonFileChannelStore::new(path)),
            None => Channels::Static(StaticChannelStore::default()),
        };
        let dispatcher = Dispatcher::new(
            SmtpMailer::new(config.channel_timeout),
            config.channel_timeout,
        );

        Self::new(
            Selector::new(socket, cli),
            Notifier::new(channels, dispatcher),
            config,
        )
    }
}

impl<S, C, CS, M> MonitorService<S, C, CS, M>
where
    S: Transport,
    C: Transport,
    CS: ChannelStore + 'static,
    M: Mailer,
{
    pub fn new(selector: Selector<S, C>, notifier: Notifier<CS, M>, config: &Config) -> Self {
        Self {
            selector,
            metrics: MetricsEngine::new(),
            history: HistoryStore::new(config.history_capacity),
            alerts: AlertEngine::new(config.thresholds),
            notifications: NotificationStore::new(config.notification_capacity),
            notifier: Arc::new(notifier),
            names: DashMap::new(),
        }
    }

    /// Probes the transports and remembers the live one.
    pub async fn connect(&self) -> Option<TransportKind> {
        self.selector.connect().await
    }

    /// The transport remembered by the last [`MonitorService::connect`].
    pub fn transport(&self) -> Option<TransportKind> {
        self.selector.active()
    }

    pub async fn status(&self) -> ServiceStatus {
        let transport = self.selector.active();
        let version = match transport {
            Some(_) => self.selector.version().await.ok_log(),
            None => None,
        };
        ServiceStatus {
            connected: transport.is_some(),
            transport,
            version,
            unread_notifications: self.notifications.unread_count(),
        }
    }

    pub async fn version(&self) -> Result<RuntimeVersion> {
        Ok(self.selector.version().await?)
    }

    pub async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSnapshot>> {
        let containers = self.selector.list_containers(all).await?;
        for container in &containers {
            self.names
                .insert(container.id.clone(), container.name.clone());
        }
        Ok(containers)
    }

    /// Lists containers and fills the metric fields of the running ones.
    ///
    /// A container whose stats cannot be read keeps zero-valued metrics; the listing itself
    /// only fails if the containers cannot be listed.
    pub async fn list_containers_with_stats(&self, all: bool) -> Result<Vec<ContainerSnapshot>> {
        let mut containers = self.list_containers(all).await?;
        let samples = join_all(containers.iter().map(|container| async move {
            if !container.status.is_running() {
                return None;
            }
            match self.collect(&container.id, &container.name).await {
                Ok(sample) => Some(sample),
                Err(err) => {
                    log::warn!("no stats for container `{}`: {err}", container.id);
                    Some(MetricSample::placeholder(Utc::now()))
                }
            }
        }))
        .await;

        for (container, sample) in containers.iter_mut().zip(samples) {
            let sample = sample.unwrap_or_else(|| MetricSample::placeholder(Utc::now()));
            container.apply_sample(&sample);
        }
        Ok(containers)
    }

    /// Reads the stats of one container and runs them through history and alerting.
    ///
    /// `reference` is an id, an id prefix or a name. History and alert state are kept under
    /// the container's canonical id, so every way of addressing a container shares them.
    pub async fn get_stats(&self, reference: &str) -> Result<ContainerStats> {
        let reference = validate_reference(reference)?;
        let raw = self.selector.stats(reference).await?;
        let id = self.resolve(reference).await?;
        let name = self.name_of(&id);
        let sample = self.record(&id, &name, &raw);
        Ok(ContainerStats::new(id, sample))
    }

    async fn collect(&self, id: &ContainerID, name: &str) -> Result<MetricSample> {
        let raw = self.selector.stats(id.as_str()).await?;
        Ok(self.record(id, name, &raw))
    }

    fn record(&self, id: &ContainerID, name: &str, raw: &RawStats) -> MetricSample {
        let sample = self.metrics.sample(id, raw, Utc::now());
        self.history.append(id, sample);
        for alert in self.alerts.evaluate(id, name, &sample) {
            self.raise(alert);
        }
        sample
    }

    /// Recorded samples of a container, oldest first. Unknown containers have none.
    pub fn history(&self, reference: &str) -> Result<Vec<MetricSample>> {
        let reference = validate_reference(reference)?;
        Ok(self
            .lookup(reference)
            .map(|id| self.history.get(&id))
            .unwrap_or_default())
    }

    pub async fn logs(&self, reference: &str, tail: usize, timestamps: bool) -> Result<String> {
        let reference = validate_reference(reference)?;
        Ok(self.selector.logs(reference, tail, timestamps).await?)
    }

    /// Starts, stops or restarts a container and raises the matching lifecycle notification.
    pub async fn lifecycle(
        &self,
        reference: &str,
        action: LifecycleAction,
        timeout: Option<u32>,
    ) -> Result<()> {
        let reference = validate_reference(reference)?;
        self.selector.lifecycle(reference, action, timeout).await?;
        log::info!("{action} container `{reference}`");

        let id = match self.resolve(reference).await {
            Ok(id) => id,
            Err(err) => {
                log::warn!("no lifecycle notification for `{reference}`: {err}");
                return Ok(());
            }
        };
        if matches!(action, LifecycleAction::Stop | LifecycleAction::Restart) {
            self.metrics.forget(&id);
        }
        let name = self.name_of(&id);
        if let Some(alert) = self.alerts.lifecycle_event(&id, &name, action, Utc::now()) {
            self.raise(alert);
        }
        Ok(())
    }

    pub async fn start(&self, id: &str) -> Result<()> {
        self.lifecycle(id, LifecycleAction::Start, None).await
    }

    pub async fn stop(&self, id: &str, timeout: Option<u32>) -> Result<()> {
        self.lifecycle(id, LifecycleAction::Stop, timeout).await
    }

    pub async fn restart(&self, id: &str, timeout: Option<u32>) -> Result<()> {
        self.lifecycle(id, LifecycleAction::Restart, timeout).await
    }

    /// Lists images, marking those used by any container.
    pub async fn list_images(&self, all: bool) -> Result<Vec<ImageSnapshot>> {
        let (images, containers) = futures::join!(
            self.selector.list_images(all),
            self.selector.list_containers(true)
        );
        let mut images = images?;
        let containers = containers.unwrap_or_else(|err| {
            log::warn!("cannot tell which images are in use: {err}");
            Vec::new()
        });

        for image in &mut images {
            image.in_use = containers.iter().any(|c| image.is_used_by(c));
        }
        Ok(images)
    }

    pub async fn remove_image(&self, image: &str, force: bool) -> Result<()> {
        let image = validate_reference(image)?;
        self.selector.remove_image(image, force).await?;
        log::info!("removed image `{image}`");
        Ok(())
    }

    pub async fn prune_images(&self) -> Result<PruneReport> {
        let report = self.selector.prune_images().await?;
        log::info!(
            "pruned {} image(s), reclaimed {}",
            report.images_deleted,
            crate::normalize::format_size(report.space_reclaimed)
        );
        Ok(report)
    }

    pub async fn list_compose(&self) -> Result<Vec<ComposeProject>> {
        Ok(self.selector.list_compose_projects().await?)
    }

    pub async fn compose_action(&self, project: &str, action: ComposeAction) -> Result<()> {
        let project = validate_reference(project)?;
        self.selector.compose_action(project, action).await?;
        log::info!("compose {action} for project `{project}`");
        Ok(())
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.alerts.thresholds()
    }

    pub fn update_thresholds(&self, update: &ThresholdUpdate) -> Result<ThresholdConfig> {
        Ok(self.alerts.update_thresholds(update)?)
    }

    /// Retained notifications, newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.list()
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.unread_count()
    }

    pub fn mark_read(&self, id: u64) -> Result<()> {
        Ok(self.notifications.mark_read(id)?)
    }

    pub fn mark_all_read(&self) {
        self.notifications.mark_all_read();
    }

    pub fn clear_notifications(&self) {
        self.notifications.clear();
    }

    pub async fn test_channel(&self, id: &str) -> Result<ChannelResult> {
        Ok(self.notifier.test_channel(id).await?)
    }

    /// Collects stats of all running containers, feeding history and alerting.
    pub async fn poll(&self) -> Result<usize> {
        let containers = self.list_containers_with_stats(false).await?;
        Ok(containers.len())
    }

    /// Finds the canonical id of a known container by name, then by id or id prefix.
    fn lookup(&self, reference: &str) -> Option<ContainerID> {
        let reference = reference.strip_prefix('/').unwrap_or(reference);
        let by_name = self
            .names
            .iter()
            .find(|entry| entry.value() == reference)
            .map(|entry| entry.key().clone());
        by_name.or_else(|| {
            let short = ContainerID::new(reference).ok()?;
            self.names
                .iter()
                .find(|entry| entry.key().as_str().starts_with(short.as_str()))
                .map(|entry| entry.key().clone())
        })
    }

    /// Like [`MonitorService::lookup`], refreshing the known containers once on a miss.
    async fn resolve(&self, reference: &str) -> Result<ContainerID> {
        if let Some(id) = self.lookup(reference) {
            return Ok(id);
        }
        self.list_containers(true)
            .await
            .ok_warn("cannot refresh the container listing");
        self.lookup(reference)
            .ok_or_else(|| Error::UnknownContainer(reference.to_owned()))
    }

    fn name_of(&self, id: &ContainerID) -> String {
        self.names
            .get(id)
            .map(|name| name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Stores an alert and hands it to the channels in the background.
    fn raise(&self, alert: Alert) -> Notification {
        let notification = self.notifications.push(alert);
        log::info!(
            "notification {}: {} ({})",
            notification.id,
            notification.title,
            notification.message
        );

        let event = NotificationEvent::from(&notification);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            notifier.notify(&event).await.ok_log();
        });
        notification
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::metrics::{CpuCounters, PrecomputedStats, StatsCounters};
    use crate::model::{ContainerStatus, EventType};
    use crate::notify::tests::RecordingMailer;
    use crate::transport::fake::FakeTransport;

    type TestService =
        MonitorService<FakeTransport, FakeTransport, StaticChannelStore, RecordingMailer>;

    fn container(id: &str, name: &str, status: ContainerStatus) -> ContainerSnapshot {
        ContainerSnapshot {
            id: ContainerID::new(id).unwrap(),
            name: name.to_owned(),
            image: "nginx:latest".to_owned(),
            image_id: None,
            status,
            status_text: String::new(),
            created: None,
            ports: Vec::new(),
            uptime: "-".to_owned(),
            labels: Default::default(),
            cpu_percent: 0.0,
            memory_usage: "0B".to_owned(),
            memory_limit: "0B".to_owned(),
        }
    }

    fn precomputed(cpu_percent: f64, memory_usage: u64, memory_limit: u64) -> RawStats {
        RawStats::Precomputed(PrecomputedStats {
            cpu_percent,
            memory_usage,
            memory_limit,
        })
    }

    fn service(socket: FakeTransport, cli: FakeTransport) -> TestService {
        let notifier = Notifier::new(
            StaticChannelStore::default(),
            Dispatcher::new(RecordingMailer::default(), std::time::Duration::from_secs(1)),
        );
        MonitorService::new(Selector::new(socket, cli), notifier, &Config::default())
    }

    fn runtime() -> FakeTransport {
        let mut socket = FakeTransport::new(TransportKind::Socket, true);
        socket.containers = vec![
            container("aaa111", "web", ContainerStatus::Running),
            container("bbb222", "db", ContainerStatus::Running),
            container("ccc333", "old", ContainerStatus::Exited),
        ];
        socket
            .stats
            .insert("aaa111".to_owned(), precomputed(95.0, 512, 1024));
        socket
    }

    #[tokio::test]
    async fn test_stats_feed_history_and_alerts() {
        let service = service(runtime(), FakeTransport::new(TransportKind::Cli, false));
        service.connect().await;
        service.list_containers(true).await.unwrap();

        let stats = service.get_stats("aaa111").await.unwrap();
        assert_eq!(stats.sample.cpu_percent, 95.0);
        assert_eq!(stats.sample.memory_percent, 50.0);
        service.get_stats("aaa111").await.unwrap();

        assert_eq!(service.history("aaa111").unwrap().len(), 2);
        let notifications = service.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].event_type, EventType::CpuThreshold);
        assert_eq!(notifications[0].container_name.as_deref(), Some("web"));
        assert!(notifications[0].message.contains("95.0%"));
    }

    #[tokio::test]
    async fn test_references_resolve_to_canonical_id() {
        let mut socket = runtime();
        socket
            .containers
            .push(container("ddd444", "my-container", ContainerStatus::Running));
        socket
            .containers
            .push(container("eee555", "my_app.1", ContainerStatus::Running));
        let service = service(socket, FakeTransport::new(TransportKind::Cli, false));
        service.connect().await;

        let by_name = service.get_stats("web").await.unwrap();
        assert_eq!(by_name.id.as_str(), "aaa111");
        service.get_stats("aaa111").await.unwrap();
        service.get_stats("aaa").await.unwrap();
        assert_eq!(service.history("aaa111").unwrap().len(), 3);
        assert_eq!(service.history("web").unwrap().len(), 3);
        assert_eq!(service.notifications().len(), 1);

        service.start("my-container").await.unwrap();
        let started = &service.notifications()[0];
        assert_eq!(started.event_type, EventType::ContainerStart);
        assert_eq!(started.container_id.as_ref().map(|id| id.as_str()), Some("ddd444"));
        assert_eq!(started.container_name.as_deref(), Some("my-container"));
        assert_eq!(service.logs("my_app.1", 10, false).await.unwrap(), "socket");

        assert!(service.history("nope").unwrap().is_empty());
        assert!(service.history("-rf").unwrap_err().is_invalid_input());
    }

    #[tokio::test]
    async fn test_listing_degrades_failed_stats() {
        let service = service(runtime(), FakeTransport::new(TransportKind::Cli, false));
        service.connect().await;

        let containers = service.list_containers_with_stats(true).await.unwrap();
        assert_eq!(containers.len(), 3);
        assert_eq!(containers[0].cpu_percent, 95.0);
        assert_eq!(containers[0].memory_usage, "512B");
        assert_eq!(containers[1].cpu_percent, 0.0);
        assert_eq!(containers[1].memory_usage, "0B");
        assert_eq!(containers[2].memory_limit, "0B");
        assert!(service.history("bbb222").unwrap().is_empty());

        assert_eq!(service.poll().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_notifications() {
        let service = service(runtime(), FakeTransport::new(TransportKind::Cli, false));
        service.connect().await;
        service.list_containers(true).await.unwrap();

        service.stop("bbb222", Some(5)).await.unwrap();
        service.start("bbb222").await.unwrap();
        service
            .update_thresholds(&ThresholdUpdate {
                notify_on_start: Some(false),
                ..Default::default()
            })
            .unwrap();
        service.restart("bbb222", None).await.unwrap();

        let kinds: Vec<EventType> = service
            .notifications()
            .iter()
            .map(|n| n.event_type)
            .collect();
        assert_eq!(kinds, vec![EventType::ContainerStart, EventType::ContainerStop]);
        assert_eq!(service.unread_count(), 2);

        let newest = service.notifications()[0].id;
        service.mark_read(newest).unwrap();
        assert_eq!(service.unread_count(), 1);
        assert!(service.mark_read(9999).unwrap_err().is_not_found());
        service.mark_all_read();
        assert_eq!(service.status().await.unread_notifications, 0);
        service.clear_notifications();
        assert!(service.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_cli() {
        let mut cli = FakeTransport::new(TransportKind::Cli, true);
        cli.containers = runtime().containers;
        let service = service(FakeTransport::new(TransportKind::Socket, false), cli);
        assert_eq!(service.connect().await, Some(TransportKind::Cli));

        let status = service.status().await;
        assert!(status.connected);
        assert_eq!(status.version.unwrap().version, "cli");
        assert_eq!(service.list_containers(false).await.unwrap().len(), 2);
        assert_eq!(service.logs("aaa111", 10, false).await.unwrap(), "cli");
    }

    #[tokio::test]
    async fn test_no_transport() {
        let service = service(
            FakeTransport::new(TransportKind::Socket, false),
            FakeTransport::new(TransportKind::Cli, false),
        );
        assert_eq!(service.connect().await, None);
        let status = service.status().await;
        assert!(!status.connected);
        assert!(status.version.is_none());
        assert!(matches!(
            service.list_containers(true).await,
            Err(Error::Transport(crate::transport::Error::AllFailed { .. }))
        ));
        assert!(service.get_stats("aaa111").await.is_err());
    }

    #[tokio::test]
    async fn test_images_in_use() {
        let mut socket = runtime();
        socket.images = vec![
            ImageSnapshot {
                id: "1234567890ab".to_owned(),
                repository: "nginx".to_owned(),
                tag: "latest".to_owned(),
                size: 1,
                created: None,
                in_use: false,
            },
            ImageSnapshot {
                id: "ba0987654321".to_owned(),
                repository: "redis".to_owned(),
                tag: "7".to_owned(),
                size: 1,
                created: None,
                in_use: false,
            },
        ];
        let service = service(socket, FakeTransport::new(TransportKind::Cli, false));
        service.connect().await;

        let images = service.list_images(false).await.unwrap();
        let in_use: Vec<bool> = images.iter().map(|i| i.in_use).collect();
        assert_eq!(in_use, vec![true, false]);

        let err = service.remove_image("-rf", false).await.unwrap_err();
        assert!(err.is_invalid_input());
        service.remove_image("redis:7", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_compose_action_falls_back_to_cli() {
        let socket = runtime();
        let socket_calls = Arc::clone(&socket.calls);
        let cli = FakeTransport::new(TransportKind::Cli, true);
        let cli_calls = Arc::clone(&cli.calls);
        let service = service(socket, cli);
        service.connect().await;

        service
            .compose_action("shop", ComposeAction::Up)
            .await
            .unwrap();
        assert_eq!(socket_calls.load(Ordering::SeqCst), 2);
        assert_eq!(cli_calls.load(Ordering::SeqCst), 1);
        assert!(service.get_stats("").await.unwrap_err().is_invalid_input());
    }

    #[tokio::test]
    async fn test_counters_reset_after_stop() {
        let mut socket = runtime();
        socket.stats.insert(
            "bbb222".to_owned(),
            RawStats::Counters(StatsCounters {
                cpu: CpuCounters {
                    total_usage: 200,
                    system_usage: 2000,
                },
                precpu: Some(CpuCounters {
                    total_usage: 100,
                    system_usage: 1000,
                }),
                online_cpus: 2,
                memory_usage: 10,
                memory_limit: 100,
                network: Default::default(),
            }),
        );
        let service = service(socket, FakeTransport::new(TransportKind::Cli, false));
        service.connect().await;

        let first = service.get_stats("bbb222").await.unwrap();
        assert_eq!(first.sample.cpu_percent, 20.0);
        // identical counters give no positive delta
        let second = service.get_stats("bbb222").await.unwrap();
        assert_eq!(second.sample.cpu_percent, 0.0);

        service.stop("bbb222", None).await.unwrap();
        let third = service.get_stats("bbb222").await.unwrap();
        assert_eq!(third.sample.cpu_percent, 20.0);
    }
}
