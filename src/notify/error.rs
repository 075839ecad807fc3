use std::path::PathBuf;
use std::time::Duration;

/// Failure to deliver a notification to one channel, or to load the channel configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("invalid email address `{address}`: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },
    #[error("failed to build email: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("email channel has no recipients")]
    NoRecipients,
    #[error("no notification channel with id `{0}`")]
    UnknownChannel(String),
    #[error("failed to read channel file `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid channel file `{}`: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
