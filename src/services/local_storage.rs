use std::{
    collections::HashMap,
    io,
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use tracing::{info, warn};

use crate::{
    application::{
        error::ApplicationError,
        services::{
            asset_storage::{AssetStorage, Placement},
            namespace::{check_segment, PublicNamespace},
        },
    },
    domain::models::asset::{AssetCategory, StorageSemantics, StoredAsset, TranscodeResult},
};

type OwnerKey = (AssetCategory, String);
type OwnerLocks = Mutex<HashMap<OwnerKey, Arc<tokio::sync::Mutex<()>>>>;

/// Stores assets on the local filesystem below the public root.
pub struct LocalAssetStorage {
    namespace: PublicNamespace,
    owner_locks: OwnerLocks,
}

/// A claim on one owner's lock. Dropping it, awaited to completion or not,
/// removes the map entry once nobody else holds or waits for the lock.
struct OwnerLock<'a> {
    locks: &'a OwnerLocks,
    key: OwnerKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for OwnerLock<'_> {
    fn drop(&mut self) {
        if let Ok(mut locks) = self.locks.lock() {
            // One reference in the map, one here.
            if Arc::strong_count(&self.lock) == 2 {
                locks.remove(&self.key);
            }
        }
    }
}

impl LocalAssetStorage {
    pub fn new(namespace: PublicNamespace) -> Self {
        Self {
            namespace,
            owner_locks: Mutex::new(HashMap::new()),
        }
    }

    fn owner_lock(&self, key: OwnerKey) -> Result<OwnerLock<'_>, ApplicationError> {
        let mut locks = self
            .owner_locks
            .lock()
            .map_err(|e| ApplicationError::internal(format!("Owner lock map poisoned: {}", e)))?;
        let lock = locks.entry(key.clone()).or_default().clone();
        Ok(OwnerLock {
            locks: &self.owner_locks,
            key,
            lock,
        })
    }

    /// Wipes the owner's directory and moves the new file in, holding the
    /// owner's lock across the whole sequence.
    async fn replace(
        &self,
        category: AssetCategory,
        owner_id: &str,
        result: &TranscodeResult,
    ) -> Result<Vec<String>, ApplicationError> {
        let owner = self.owner_lock((category, owner_id.to_string()))?;
        let _guard = owner.lock.lock().await;

        let dir = self.namespace.category_dir(category).join(owner_id);
        replace_dir_contents(&dir, result)
            .await
            .map_err(ApplicationError::internal)?;
        Ok(vec![category.dir_name().to_string(), owner_id.to_string()])
    }

    async fn append(
        &self,
        category: AssetCategory,
        owner_id: Option<&str>,
        asset_id: &str,
        result: &TranscodeResult,
    ) -> Result<Vec<String>, ApplicationError> {
        let mut segments = vec![category.dir_name().to_string()];
        segments.extend(owner_id.map(str::to_string));
        segments.push(asset_id.to_string());

        let dir = segments
            .iter()
            .fold(self.namespace.root().to_path_buf(), |dir, s| dir.join(s));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(ApplicationError::internal)?;
        move_file(&result.output_path, &dir.join(&result.output_filename))
            .await
            .map_err(ApplicationError::internal)?;
        Ok(segments)
    }
}

#[async_trait]
impl AssetStorage for LocalAssetStorage {
    fn namespace(&self) -> &PublicNamespace {
        &self.namespace
    }

    async fn store(
        &self,
        placement: Placement,
        result: &TranscodeResult,
    ) -> Result<StoredAsset, ApplicationError> {
        let Placement {
            category,
            owner_id,
            asset_id,
        } = placement;

        if let Some(owner) = owner_id.as_deref() {
            check_segment(owner)?;
        }
        check_segment(&asset_id)?;

        let segments = match category.semantics() {
            StorageSemantics::Replace => {
                let owner = owner_id
                    .as_deref()
                    .ok_or(ApplicationError::MissingOwnerId)?;
                self.replace(category, owner, result).await?
            }
            StorageSemantics::Append => {
                self.append(category, owner_id.as_deref(), &asset_id, result)
                    .await?
            }
        };

        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let public_path = self
            .namespace
            .public_path(&segments, &result.output_filename);

        Ok(StoredAsset {
            category,
            owner_id,
            asset_id,
            filename: result.output_filename.clone(),
            public_path,
            dimensions: result.dimensions,
            is_animated: result.is_animated,
        })
    }

    async fn delete_file(&self, relative_path: &str) -> Result<(), ApplicationError> {
        let decoded = percent_decode_str(relative_path)
            .decode_utf8()
            .map_err(|_| ApplicationError::InvalidPath)?;
        let path = self.namespace.resolve_file(&decoded).await?;

        tokio::fs::remove_file(&path)
            .await
            .map_err(|_| ApplicationError::FileNotFound)?;

        let Some(parent) = path.parent() else {
            return Ok(());
        };
        if self.namespace.is_protected_dir(parent) {
            return Ok(());
        }

        let mut entries = tokio::fs::read_dir(parent)
            .await
            .map_err(ApplicationError::internal)?;
        let is_empty = entries
            .next_entry()
            .await
            .map_err(ApplicationError::internal)?
            .is_none();
        if is_empty {
            tokio::fs::remove_dir(parent)
                .await
                .map_err(ApplicationError::internal)?;
        }

        info!("Deleted {}", decoded);
        Ok(())
    }

    async fn delete_channel_batch(
        &self,
        channel_id: &str,
        batch_size: usize,
    ) -> Result<usize, ApplicationError> {
        check_segment(channel_id)?;
        let dir = self
            .namespace
            .category_dir(AssetCategory::Attachment)
            .join(channel_id);

        match tokio::fs::metadata(&dir).await {
            Ok(metadata) if metadata.is_dir() => {}
            _ => return Err(ApplicationError::InvalidPath),
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(ApplicationError::internal)?;
        let mut batch = Vec::new();
        while batch.len() < batch_size {
            match entries.next_entry().await {
                Ok(Some(entry)) => batch.push(entry.path()),
                Ok(None) => break,
                Err(e) => return Err(ApplicationError::internal(e)),
            }
        }

        let removals = batch.iter().map(|path| remove_entry(path));
        futures::future::join_all(removals).await;

        if batch.len() < batch_size {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                warn!("Failed to remove channel directory {}: {}", dir.display(), e);
            }
        }

        info!("Deleted {} attachment entries of channel {}", batch.len(), channel_id);
        Ok(batch.len())
    }
}

async fn replace_dir_contents(dir: &Path, result: &TranscodeResult) -> io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(dir).await?;
    move_file(&result.output_path, &dir.join(&result.output_filename)).await
}

/// Failures are logged and otherwise ignored.
async fn remove_entry(path: &Path) {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) if metadata.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Rename, falling back to copy and remove when the staging area sits on a
/// different filesystem.
async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}
