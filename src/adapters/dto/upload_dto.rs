use serde::Serialize;

use crate::domain::models::{asset::StoredAsset, geometry::Dimensions};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub path: String,
    pub dimensions: Dimensions,
}

impl From<StoredAsset> for UploadResponse {
    fn from(asset: StoredAsset) -> Self {
        Self {
            path: asset.public_path,
            dimensions: asset.dimensions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmojiUploadResponse {
    pub path: String,
    pub gif: bool,
    pub id: String,
}

impl From<StoredAsset> for EmojiUploadResponse {
    fn from(asset: StoredAsset) -> Self {
        Self {
            path: asset.public_path,
            gif: asset.is_animated,
            id: asset.asset_id,
        }
    }
}
