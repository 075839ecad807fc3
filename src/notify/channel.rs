use std::fmt;
use std::path::{Path, PathBuf};

use super::{Error, Result};
use crate::model::EventType;

/// An event type a channel subscribes to, or every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Subscription {
    All,
    Event(EventType),
}

impl Subscription {
    pub fn matches(&self, event_type: EventType) -> bool {
        match self {
            Subscription::All => true,
            Subscription::Event(subscribed) => *subscribed == event_type,
        }
    }
}

impl TryFrom<String> for Subscription {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "all" => Ok(Subscription::All),
            other => other.parse().map(Subscription::Event),
        }
    }
}

impl From<Subscription> for String {
    fn from(value: Subscription) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subscription::All => f.write_str("all"),
            Subscription::Event(event_type) => event_type.fmt(f),
        }
    }
}

/// Payload shape of a webhook channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookFormat {
    Slack,
    Discord,
    Teams,
    Generic,
}

fn enabled() -> bool {
    true
}

fn all_events() -> Vec<Subscription> {
    vec![Subscription::All]
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookChannel {
    pub id: String,
    pub name: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub format: WebhookFormat,
    pub url: String,
    #[serde(default = "all_events")]
    pub events: Vec<Subscription>,
}

/// How the connection to the SMTP relay is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS, usually on port 465.
    Tls,
    #[default]
    StartTls,
    None,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub security: SmtpSecurity,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailChannel {
    pub id: String,
    pub name: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub smtp: SmtpSettings,
    pub recipients: Vec<String>,
    #[serde(default = "all_events")]
    pub events: Vec<Subscription>,
}

/// A configured notification destination.
///
/// Channel files hold a JSON array of these, tagged by `type`:
///
/// ```json
/// [
///   {"type": "webhook", "id": "ops", "name": "Ops", "format": "slack",
///    "url": "https://hooks.slack.com/services/...", "events": ["cpu_threshold"]},
///   {"type": "email", "id": "mail", "name": "Mail", "recipients": ["ops@example.com"],
///    "smtp": {"host": "smtp.example.com", "from": "dockwatch@example.com"}}
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelConfig {
    Webhook(WebhookChannel),
    Email(EmailChannel),
}

impl ChannelConfig {
    pub fn id(&self) -> &str {
        match self {
            ChannelConfig::Webhook(channel) => &channel.id,
            ChannelConfig::Email(channel) => &channel.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ChannelConfig::Webhook(channel) => &channel.name,
            ChannelConfig::Email(channel) => &channel.name,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            ChannelConfig::Webhook(channel) => channel.enabled,
            ChannelConfig::Email(channel) => channel.enabled,
        }
    }

    fn events(&self) -> &[Subscription] {
        match self {
            ChannelConfig::Webhook(channel) => &channel.events,
            ChannelConfig::Email(channel) => &channel.events,
        }
    }

    /// Whether the channel is enabled and subscribed to `event_type`.
    pub fn accepts(&self, event_type: EventType) -> bool {
        self.enabled() && self.events().iter().any(|s| s.matches(event_type))
    }
}

/// Source of the configured notification channels.
pub trait ChannelStore: Send + Sync {
    fn channels(&self) -> impl Future<Output = Result<Vec<ChannelConfig>>> + Send;

    fn channel(&self, id: &str) -> impl Future<Output = Result<ChannelConfig>> + Send {
        async move {
            self.channels()
                .await?
                .into_iter()
                .find(|channel| channel.id() == id)
                .ok_or_else(|| Error::UnknownChannel(id.to_owned()))
        }
    }
}

/// Channels fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticChannelStore {
    channels: Vec<ChannelConfig>,
}

impl StaticChannelStore {
    pub fn new(channels: Vec<ChannelConfig>) -> Self {
        Self { channels }
    }
}

impl ChannelStore for StaticChannelStore {
    async fn channels(&self) -> Result<Vec<ChannelConfig>> {
        Ok(self.channels.clone())
    }
}

/// Channels read from a JSON file on every access, so edits apply without a restart.
///
/// A missing file holds no channels.
#[derive(Debug, Clone)]
pub struct JsonFileChannelStore {
    path: PathBuf,
}

impl JsonFileChannelStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ChannelStore for JsonFileChannelStore {
    async fn channels(&self) -> Result<Vec<ChannelConfig>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("channel file `{}` does not exist", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(Error::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_slice(&content).map_err(|source| Error::Json {
            path: self.path.clone(),
            source,
        })
    }
}

/// The channel stores selectable at startup.
#[derive(Debug, Clone)]
pub enum Channels {
    Static(StaticChannelStore),
    File(JsonFileChannelStore),
}

impl ChannelStore for Channels {
    async fn channels(&self) -> Result<Vec<ChannelConfig>> {
        match self {
            Channels::Static(store) => store.channels().await,
            Channels::File(store) => store.channels().await,
        }
    }
}
