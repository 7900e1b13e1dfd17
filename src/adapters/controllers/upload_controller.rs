use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use tracing::info;

use crate::{
    adapters::{
        dto::upload_dto::{EmojiUploadResponse, UploadResponse},
        multipart::UploadIngestor,
        state::AppState,
    },
    application::{error::ApplicationError, services::UploadProfile},
    domain::models::asset::{AssetCategory, StoredAsset},
};

pub struct UploadController;

impl UploadController {
    /// POST /avatars
    /// Fields: secret, ownerId, points (optional JSON `[x1,y1,x2,y2]`), one file
    pub async fn upload_avatar(
        State(app_state): State<AppState>,
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<Json<UploadResponse>, ApplicationError> {
        let stored = upload(&app_state, AssetCategory::Avatar, multipart).await?;
        Ok(Json(stored.into()))
    }

    /// POST /banners
    pub async fn upload_banner(
        State(app_state): State<AppState>,
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<Json<UploadResponse>, ApplicationError> {
        let stored = upload(&app_state, AssetCategory::Banner, multipart).await?;
        Ok(Json(stored.into()))
    }

    /// POST /attachments
    pub async fn upload_attachment(
        State(app_state): State<AppState>,
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<Json<UploadResponse>, ApplicationError> {
        let stored = upload(&app_state, AssetCategory::Attachment, multipart).await?;
        Ok(Json(stored.into()))
    }

    /// POST /emojis
    /// No owner; the response carries the generated id and the animated flag.
    pub async fn upload_emoji(
        State(app_state): State<AppState>,
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<Json<EmojiUploadResponse>, ApplicationError> {
        let stored = upload(&app_state, AssetCategory::Emoji, multipart).await?;
        Ok(Json(stored.into()))
    }
}

async fn upload(
    app_state: &AppState,
    category: AssetCategory,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<StoredAsset, ApplicationError> {
    let multipart = multipart?;
    info!("Upload requested for {}", category.dir_name());

    let profile = UploadProfile::for_category(category, app_state.config.max_upload_bytes);
    let service = &app_state.upload_service;

    let ingested = UploadIngestor::new(
        &app_state.config.temp_dir,
        profile.limits,
        service.ids().as_ref(),
    )
    .ingest(multipart)
    .await?;

    service.process(&profile, ingested).await
}
