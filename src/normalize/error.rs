/// Errors raised while mapping transport payloads onto the canonical model.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid size `{0}`")]
    InvalidSize(String),
    #[error("invalid percentage `{0}`")]
    InvalidPercent(String),
    #[error("invalid memory usage `{0}`, expected `used / limit`")]
    InvalidMemoryUsage(String),
    #[error("malformed output line {line}: `{content}`: {reason}")]
    MalformedLine {
        line: usize,
        content: String,
        reason: String,
    },
    #[error("unexpected payload shape: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    ContainerID(#[from] crate::container::Error),
}

pub type Result<T> = std::result::Result<T, ParseError>;
