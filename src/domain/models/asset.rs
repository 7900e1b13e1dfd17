use std::path::PathBuf;

use super::geometry::Dimensions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    Avatar,
    Banner,
    Attachment,
    Emoji,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageSemantics {
    /// One current asset per owner; a new upload supersedes the old one.
    Replace,
    /// Every upload gets its own directory and is never overwritten.
    Append,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::Avatar,
        AssetCategory::Banner,
        AssetCategory::Attachment,
        AssetCategory::Emoji,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            AssetCategory::Avatar => "avatars",
            AssetCategory::Banner => "banners",
            AssetCategory::Attachment => "attachments",
            AssetCategory::Emoji => "emojis",
        }
    }

    pub fn semantics(self) -> StorageSemantics {
        match self {
            AssetCategory::Avatar | AssetCategory::Banner => StorageSemantics::Replace,
            AssetCategory::Attachment | AssetCategory::Emoji => StorageSemantics::Append,
        }
    }

    pub fn requires_owner(self) -> bool {
        !matches!(self, AssetCategory::Emoji)
    }

    /// Attachments keep the uploader's filename; everything else is renamed
    /// to the generated asset id.
    pub fn keeps_original_name(self) -> bool {
        matches!(self, AssetCategory::Attachment)
    }
}

/// Output of one transcode. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeResult {
    pub output_path: PathBuf,
    pub output_filename: String,
    pub dimensions: Dimensions,
    pub is_animated: bool,
}

/// A result that has been placed into the public namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub category: AssetCategory,
    pub owner_id: Option<String>,
    pub asset_id: String,
    pub filename: String,
    /// Relative to the public root, filename percent-encoded.
    pub public_path: String,
    pub dimensions: Dimensions,
    pub is_animated: bool,
}
