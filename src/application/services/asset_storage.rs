use async_trait::async_trait;

use crate::{
    application::{error::ApplicationError, services::namespace::PublicNamespace},
    domain::models::asset::{AssetCategory, StoredAsset, TranscodeResult},
};

/// Where a transcoded result should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub category: AssetCategory,
    pub owner_id: Option<String>,
    pub asset_id: String,
}

#[async_trait]
pub trait AssetStorage: Send + Sync {
    fn namespace(&self) -> &PublicNamespace;

    /// Moves `result` into the public namespace using the category's replace
    /// or append semantics and returns the public path.
    async fn store(
        &self,
        placement: Placement,
        result: &TranscodeResult,
    ) -> Result<StoredAsset, ApplicationError>;

    /// Removes one stored file and its parent directory once it is empty.
    async fn delete_file(&self, relative_path: &str) -> Result<(), ApplicationError>;

    /// Removes up to `batch_size` entries of a channel's attachments and the
    /// channel directory itself once it has been emptied. Returns the number
    /// of entries removed.
    async fn delete_channel_batch(
        &self,
        channel_id: &str,
        batch_size: usize,
    ) -> Result<usize, ApplicationError>;
}
