use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use tracing::info;

use crate::{
    adapters::{
        dto::asset_dto::{DeleteBatchRequest, DeleteFileRequest, DeletedResponse},
        state::AppState,
    },
    application::{error::ApplicationError, services::secret::verify_secret},
};

/// Entries removed per batch call; callers repeat until the directory is gone.
pub const CHANNEL_BATCH_SIZE: usize = 1000;

pub struct DeleteController;

impl DeleteController {
    /// DELETE /
    /// Body: {"secret": "...", "path": "avatars/42/1.webp"}
    pub async fn delete_file(
        State(app_state): State<AppState>,
        body: Result<Json<DeleteFileRequest>, JsonRejection>,
    ) -> Result<Json<DeletedResponse>, ApplicationError> {
        let Json(body) = body?;
        verify_secret(&app_state.config.secret, body.secret.as_deref())?;
        let path = body.path.ok_or(ApplicationError::InvalidPath)?;
        info!("Delete requested for {}", path);

        app_state.storage.delete_file(&path).await?;

        Ok(Json(DeletedResponse::file()))
    }

    /// DELETE /channels/{channel_id}/attachments/batch
    pub async fn delete_channel_batch(
        State(app_state): State<AppState>,
        Path(channel_id): Path<String>,
        body: Result<Json<DeleteBatchRequest>, JsonRejection>,
    ) -> Result<Json<DeletedResponse>, ApplicationError> {
        let Json(body) = body?;
        verify_secret(&app_state.config.secret, body.secret.as_deref())?;
        info!("Batch delete requested for channel {}", channel_id);

        let count = app_state
            .storage
            .delete_channel_batch(&channel_id, CHANNEL_BATCH_SIZE)
            .await?;

        Ok(Json(DeletedResponse::batch(count)))
    }
}
