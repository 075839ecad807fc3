use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// The canonical length of a [`ContainerID`].
pub const SHORT_ID_LEN: usize = 12;

/// A canonicalized container identifier.
///
/// The runtime reports 64-character ids through its HTTP API and 12-character ids through its
/// CLI. Both are reduced to the short form so that history and alert state are keyed the same
/// way regardless of the transport that produced a sample.
///
/// # Examples
///
/// ```
/// # use dockwatch::container::ContainerID;
/// let raw_id = "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd";
/// let container_id = ContainerID::new(raw_id).unwrap();
/// assert_eq!(container_id.as_ref(), "abc123abc123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id, truncated to [`SHORT_ID_LEN`].
    ///
    /// A `sha256:` prefix is stripped first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] if the id is empty or contains characters other
    /// than ASCII alphanumerics.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref().trim();
        let src = src.strip_prefix("sha256:").unwrap_or(src);
        if src.is_empty() || !src.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        let end = src.len().min(SHORT_ID_LEN);
        Ok(Self(src[..end].into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContainerID {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for ContainerID {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}
