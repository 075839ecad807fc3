use std::time::Duration;

use super::TransportKind;
use crate::normalize::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to `{endpoint}`: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("http exchange with `{endpoint}` failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: hyper::Error,
    },
    #[error("request to `{endpoint}` failed: {source}")]
    Client {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] hyper::http::Error),
    #[error("invalid argument `{0}`")]
    InvalidArgument(String),
    #[error("runtime responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "`{program}` exited with {}: {stderr}",
        .code.map_or_else(|| "a signal".to_owned(), |c| format!("code {c}"))
    )]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
    #[error("{operation} is not supported by the {transport} transport")]
    Unsupported {
        transport: TransportKind,
        operation: &'static str,
    },
    #[error("failed to parse runtime response: {0}")]
    Parse(#[from] ParseError),
    #[error("compose subcommand failed: {modern}; legacy compose failed: {legacy}")]
    ComposeFailed { modern: Box<Error>, legacy: Box<Error> },
    #[error("{operation} failed on every transport: {}", format_attempts(.attempts))]
    AllFailed {
        operation: &'static str,
        attempts: Vec<(TransportKind, Error)>,
    },
}

fn format_attempts(attempts: &[(TransportKind, Error)]) -> String {
    attempts
        .iter()
        .map(|(kind, err)| format!("[{kind}] {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Whether the runtime reported that the addressed entity does not exist.
    ///
    /// An aggregated failure counts as not found as soon as one transport reached the runtime
    /// and was told so.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Status { status, .. } => *status == 404,
            Error::Exit { stderr, .. } => stderr.to_lowercase().contains("no such"),
            Error::AllFailed { attempts, .. } => attempts.iter().any(|(_, err)| err.is_not_found()),
            Error::ComposeFailed { modern, legacy } => {
                modern.is_not_found() || legacy.is_not_found()
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
