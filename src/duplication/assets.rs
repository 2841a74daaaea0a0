//! Client side of the asset service that copies binary visuals.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetServiceError {
    #[error("Asset service unavailable: {0}")]
    Unavailable(String),

    #[error("Asset service rejected the request: {0}")]
    Rejected(String),
}

/// One stored format of a duplicated asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatedFormat {
    /// Format name such as `MEDIUM` or `VIDEO_SCREENSHOT`.
    pub name: String,
    pub original_url: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatedAsset {
    pub original_id: String,
    pub new_id: String,
    #[serde(default)]
    pub formats: Vec<DuplicatedFormat>,
}

impl DuplicatedAsset {
    #[must_use]
    pub fn format(&self, name: &str) -> Option<&DuplicatedFormat> {
        self.formats.iter().find(|format| format.name == name)
    }
}

/// Copies every asset owned by one item to another owner.
#[async_trait]
pub trait AssetService: Send + Sync {
    async fn duplicate_assets(
        &self,
        source_owner_id: &str,
        target_owner_id: &str,
    ) -> Result<Vec<DuplicatedAsset>, AssetServiceError>;
}
