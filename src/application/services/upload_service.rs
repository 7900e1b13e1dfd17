use std::{path::PathBuf, sync::Arc};

use tracing::{info, warn};

use crate::{
    application::{
        error::ApplicationError,
        services::{
            asset_storage::{AssetStorage, Placement},
            geometry_resolver,
            id_generator::IdGenerator,
            namespace::check_segment,
            secret::verify_secret,
            transcoder::{TranscodeRequest, Transcoder},
        },
    },
    domain::{
        config::limits::UploadLimits,
        models::{
            asset::{AssetCategory, StoredAsset},
            geometry::{CropSpec, Dimensions, GeometryRequest, ResizeMode},
            image::is_supported_image_mime,
            upload::{IngestedUpload, UploadFields, UploadedFileDescriptor},
        },
    },
};

/// Per-category upload contract: output geometry and multipart limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProfile {
    pub category: AssetCategory,
    pub target: Dimensions,
    pub mode: ResizeMode,
    /// Used when the request carries no crop points.
    pub default_crop: Option<CropSpec>,
    pub accepts_points: bool,
    pub limits: UploadLimits,
}

impl UploadProfile {
    pub fn for_category(category: AssetCategory, max_file_size: u64) -> Self {
        match category {
            AssetCategory::Avatar => Self {
                category,
                target: Dimensions::square(200),
                mode: ResizeMode::Fit,
                default_crop: Some(CropSpec::SizeOnly(Dimensions::square(200))),
                accepts_points: true,
                limits: UploadLimits::new(max_file_size, 3).with_max_parts(4),
            },
            AssetCategory::Banner => Self::fit(category, Dimensions::new(1920, 1080), max_file_size),
            AssetCategory::Attachment => {
                Self::fit(category, Dimensions::square(1920), max_file_size)
            }
            AssetCategory::Emoji => Self::fit(category, Dimensions::square(100), max_file_size),
        }
    }

    fn fit(category: AssetCategory, target: Dimensions, max_file_size: u64) -> Self {
        Self {
            category,
            target,
            mode: ResizeMode::Fit,
            default_crop: None,
            accepts_points: false,
            limits: UploadLimits::new(max_file_size, 2).with_max_parts(3),
        }
    }

    fn geometry(&self, fields: &UploadFields) -> Result<GeometryRequest, ApplicationError> {
        if !self.accepts_points {
            return Ok(GeometryRequest {
                target: self.target,
                mode: self.mode,
                crop: None,
            });
        }
        let mut request = geometry_resolver::resolve(fields.points(), self.target, self.mode)?;
        if request.crop.is_none() {
            request.crop = self.default_crop;
        }
        Ok(request)
    }
}

#[derive(Clone)]
pub struct UploadService {
    secret: String,
    transcoder: Transcoder,
    storage: Arc<dyn AssetStorage>,
    ids: Arc<dyn IdGenerator>,
    staging_root: PathBuf,
}

impl UploadService {
    pub fn new(
        secret: String,
        transcoder: Transcoder,
        storage: Arc<dyn AssetStorage>,
        ids: Arc<dyn IdGenerator>,
        staging_root: PathBuf,
    ) -> Self {
        Self {
            secret,
            transcoder,
            storage,
            ids,
            staging_root,
        }
    }

    pub fn ids(&self) -> &Arc<dyn IdGenerator> {
        &self.ids
    }

    /// Validates, transcodes and stores one ingested upload. The scratch file
    /// is deleted before returning, whatever the outcome.
    pub async fn process(
        &self,
        profile: &UploadProfile,
        upload: IngestedUpload,
    ) -> Result<StoredAsset, ApplicationError> {
        let IngestedUpload { file, fields } = upload;
        let result = self.run(profile, &file, &fields).await;

        let scratch = file.scratch_path().to_path_buf();
        if let Err(e) = file.delete() {
            warn!("Failed to delete scratch file {}: {}", scratch.display(), e);
        }

        result
    }

    async fn run(
        &self,
        profile: &UploadProfile,
        file: &UploadedFileDescriptor,
        fields: &UploadFields,
    ) -> Result<StoredAsset, ApplicationError> {
        verify_secret(&self.secret, fields.secret())?;

        if !is_supported_image_mime(&file.mime_type) {
            return Err(ApplicationError::InvalidImageType);
        }
        let (_, extension) = file.original_name_parts();
        if extension.is_empty() {
            return Err(ApplicationError::InvalidImageType);
        }

        let owner_id = if profile.category.requires_owner() {
            let owner = fields.owner_id().ok_or(ApplicationError::MissingOwnerId)?;
            Some(check_segment(owner)?.to_string())
        } else {
            None
        };

        let geometry = profile.geometry(fields)?;

        let asset_id = self.ids.next_id();
        let staging = tempfile::Builder::new()
            .prefix("stage-")
            .tempdir_in(&self.staging_root)
            .map_err(ApplicationError::internal)?;

        let replacement = (!profile.category.keeps_original_name()).then_some(asset_id.as_str());
        let result = self
            .transcoder
            .transcode(TranscodeRequest {
                source: file.scratch_path(),
                geometry,
                destination_dir: staging.path(),
                original_filename: &file.original_filename,
                replacement_basename: replacement,
            })
            .await?;

        let stored = self
            .storage
            .store(
                Placement {
                    category: profile.category,
                    owner_id,
                    asset_id,
                },
                &result,
            )
            .await?;

        info!(
            category = profile.category.dir_name(),
            owner = stored.owner_id.as_deref().unwrap_or("-"),
            asset_id = %stored.asset_id,
            width = stored.dimensions.width,
            height = stored.dimensions.height,
            animated = stored.is_animated,
            bytes = file.size_bytes,
            "Stored upload"
        );

        Ok(stored)
    }
}
