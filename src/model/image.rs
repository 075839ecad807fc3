use chrono::{DateTime, Utc};

use super::ContainerSnapshot;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSnapshot {
    pub id: String,
    pub repository: String,
    pub tag: String,
    /// Size in bytes.
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub in_use: bool,
}

impl ImageSnapshot {
    /// Returns `repository:tag`, or the bare id for dangling images.
    pub fn reference(&self) -> String {
        if self.repository.is_empty() || self.repository == "<none>" {
            return self.id.clone();
        }
        format!("{}:{}", self.repository, self.tag)
    }

    /// Checks whether the given container runs this image.
    ///
    /// Containers listed through the socket transport carry the image id; containers listed
    /// through the CLI only carry the reference they were created from.
    pub fn is_used_by(&self, container: &ContainerSnapshot) -> bool {
        if let Some(image_id) = &container.image_id {
            let image_id = image_id.strip_prefix("sha256:").unwrap_or(image_id);
            if !self.id.is_empty() && image_id.starts_with(&self.id) {
                return true;
            }
        }

        let image = container.image.as_str();
        if image.is_empty() {
            return false;
        }
        if !self.id.is_empty() && (image.starts_with(&self.id) || self.id.starts_with(image)) {
            return true;
        }
        if self.repository.is_empty() || self.repository == "<none>" {
            return false;
        }
        image == self.reference() || (self.tag == "latest" && image == self.repository)
    }
}

/// Outcome of an image prune.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    pub images_deleted: usize,
    pub space_reclaimed: u64,
}
