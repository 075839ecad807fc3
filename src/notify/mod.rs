//! Delivery of notifications to the configured channels.
//!
//! A [`Dispatcher`] formats one [`NotificationEvent`] for every enabled channel subscribed to
//! its event type and delivers it to all of them concurrently. Each channel gets its own
//! timeout and its own [`ChannelResult`]; one failing channel never affects the others.
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;

mod channel;
mod email;
mod error;
pub mod format;

pub use channel::{
    ChannelConfig, ChannelStore, Channels, EmailChannel, JsonFileChannelStore, SmtpSecurity,
    SmtpSettings, StaticChannelStore, Subscription, WebhookChannel, WebhookFormat,
};
pub use email::{EmailMessage, Mailer, SmtpMailer};
pub use error::{Error, Result};

use crate::alerting::Notification;
use crate::container::ContainerID;
use crate::model::{EventType, Severity};

pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);

/// An event as it is handed to the channels.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub event_type: EventType,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub container_id: Option<ContainerID>,
    pub container_name: Option<String>,
    pub details: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    /// The synthetic event sent when a channel is tested.
    pub fn test(channel: &ChannelConfig) -> Self {
        let mut details = serde_json::Map::new();
        details.insert("test".to_owned(), true.into());
        details.insert("channel".to_owned(), channel.name().into());
        Self {
            event_type: EventType::Test,
            title: "Test notification".to_owned(),
            message: format!("Channel {} is configured correctly.", channel.name()),
            severity: Severity::Info,
            container_id: None,
            container_name: None,
            details,
            timestamp: Utc::now(),
        }
    }
}

impl From<&Notification> for NotificationEvent {
    fn from(notification: &Notification) -> Self {
        let mut details = serde_json::Map::new();
        details.insert("notificationId".to_owned(), notification.id.into());
        Self {
            event_type: notification.event_type,
            title: notification.title.clone(),
            message: notification.message.clone(),
            severity: notification.severity,
            container_id: notification.container_id.clone(),
            container_name: notification.container_name.clone(),
            details,
            timestamp: notification.timestamp,
        }
    }
}

/// Outcome of the delivery to one channel.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    pub channel_id: String,
    pub channel_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelResult {
    fn new(channel_id: &str, channel_name: &str, result: Result<()>) -> Self {
        let error = result.err().map(|err| {
            log::warn!("delivery to channel `{channel_id}` failed: {err}");
            err.to_string()
        });
        Self {
            channel_id: channel_id.to_owned(),
            channel_name: channel_name.to_owned(),
            success: error.is_none(),
            error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub webhook_results: Vec<ChannelResult>,
    pub email_results: Vec<ChannelResult>,
}

impl DispatchReport {
    pub fn failures(&self) -> usize {
        self.webhook_results
            .iter()
            .chain(&self.email_results)
            .filter(|r| !r.success)
            .count()
    }
}

#[derive(Debug)]
pub struct Dispatcher<M = SmtpMailer> {
    client: reqwest::Client,
    mailer: M,
    timeout: Duration,
}

impl<M: Mailer> Dispatcher<M> {
    pub fn new(mailer: M, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            mailer,
            timeout,
        }
    }

    /// Delivers `event` to every channel that accepts it.
    pub async fn dispatch(
        &self,
        event: &NotificationEvent,
        channels: &[ChannelConfig],
    ) -> DispatchReport {
        let mut webhooks = Vec::new();
        let mut emails = Vec::new();
        for channel in channels.iter().filter(|c| c.accepts(event.event_type)) {
            match channel {
                ChannelConfig::Webhook(webhook) => webhooks.push(webhook),
                ChannelConfig::Email(email) => emails.push(email),
            }
        }
        log::debug!(
            "dispatching {} event to {} webhook and {} email channel(s)",
            event.event_type,
            webhooks.len(),
            emails.len()
        );

        let (webhook_results, email_results) = futures::join!(
            join_all(webhooks.into_iter().map(|c| self.deliver_webhook(c, event))),
            join_all(emails.into_iter().map(|c| self.deliver_email(c, event))),
        );
        DispatchReport {
            webhook_results,
            email_results,
        }
    }

    /// Sends a synthetic test event to `channel`, ignoring its enabled flag and subscriptions.
    pub async fn send_test(&self, channel: &ChannelConfig) -> ChannelResult {
        let event = NotificationEvent::test(channel);
        match channel {
            ChannelConfig::Webhook(webhook) => self.deliver_webhook(webhook, &event).await,
            ChannelConfig::Email(email) => self.deliver_email(email, &event).await,
        }
    }

    async fn deliver_webhook(
        &self,
        channel: &WebhookChannel,
        event: &NotificationEvent,
    ) -> ChannelResult {
        let result = self.bounded(self.post_webhook(channel, event)).await;
        ChannelResult::new(&channel.id, &channel.name, result)
    }

    async fn post_webhook(
        &self,
        channel: &WebhookChannel,
        event: &NotificationEvent,
    ) -> Result<()> {
        let payload = format::render(channel.format, event);
        let response = self.client.post(&channel.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn deliver_email(
        &self,
        channel: &EmailChannel,
        event: &NotificationEvent,
    ) -> ChannelResult {
        let message = EmailMessage::render(event);
        let result = self.bounded(self.mailer.send(channel, &message)).await;
        ChannelResult::new(&channel.id, &channel.name, result)
    }

    async fn bounded(&self, delivery: impl Future<Output = Result<()>>) -> Result<()> {
        tokio::time::timeout(self.timeout, delivery)
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }
}

/// Pairs a [`Dispatcher`] with the store its channels are read from.
#[derive(Debug)]
pub struct Notifier<S = Channels, M = SmtpMailer> {
    store: S,
    dispatcher: Dispatcher<M>,
}

impl<S: ChannelStore, M: Mailer> Notifier<S, M> {
    pub fn new(store: S, dispatcher: Dispatcher<M>) -> Self {
        Self { store, dispatcher }
    }

    /// Delivers `event` to the currently configured channels.
    pub async fn notify(&self, event: &NotificationEvent) -> Result<DispatchReport> {
        let channels = self.store.channels().await?;
        let report = self.dispatcher.dispatch(event, &channels).await;
        log::debug!(
            "{} event delivered with {} failure(s)",
            event.event_type,
            report.failures()
        );
        Ok(report)
    }

    pub async fn test_channel(&self, id: &str) -> Result<ChannelResult> {
        let channel = self.store.channel(id).await?;
        Ok(self.dispatcher.send_test(&channel).await)
    }
}
