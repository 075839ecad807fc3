#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] crate::transport::Error),
    #[error(transparent)]
    Alerting(#[from] crate::alerting::Error),
    #[error(transparent)]
    Notify(#[from] crate::notify::Error),
    #[error("no container matches `{0}`")]
    UnknownContainer(String),
}

impl Error {
    /// Whether the error refers to something that does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Transport(err) => err.is_not_found(),
            Error::UnknownContainer(_) => true,
            Error::Alerting(crate::alerting::Error::UnknownNotification(_)) => true,
            Error::Notify(crate::notify::Error::UnknownChannel(_)) => true,
            _ => false,
        }
    }

    /// Whether the caller supplied an unusable argument.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::Alerting(crate::alerting::Error::InvalidThreshold { .. })
                | Error::Transport(crate::transport::Error::InvalidArgument(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
