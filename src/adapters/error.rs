use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{application::error::ApplicationError, domain::models::image::SUPPORTED_IMAGE_MIME_TYPES};

impl ApplicationError {
    /// Wire name of the error kind, the `type` field of every error body.
    pub fn kind(&self) -> &'static str {
        match self {
            ApplicationError::InvalidSecret => "INVALID_SECRET",
            ApplicationError::NoFile => "NO_FILE",
            ApplicationError::MissingOwnerId => "MISSING_OWNER_ID",
            ApplicationError::MaxSizeLimit { .. } => "MAX_SIZE_LIMIT",
            ApplicationError::MaxFieldsLimit => "MAX_FIELD_LIMIT",
            ApplicationError::MaxFilesLimit => "MAX_FILES_LIMIT",
            ApplicationError::MaxPartsLimit => "MAX_PARTS_LIMIT",
            ApplicationError::InvalidImageType => "INVALID_IMAGE",
            ApplicationError::InvalidPoints => "INVALID_POINTS",
            ApplicationError::CompressError => "COMPRESS_ERROR",
            ApplicationError::InvalidPath => "INVALID_PATH",
            ApplicationError::FileNotFound => "FILE_NOT_FOUND",
            ApplicationError::InvalidUrl => "INVALID_URL",
            ApplicationError::InvalidRequest(_) => "INVALID_REQUEST",
            ApplicationError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApplicationError::InvalidPath | ApplicationError::FileNotFound => StatusCode::NOT_FOUND,
            ApplicationError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        let body = match self {
            ApplicationError::MaxSizeLimit { limit } => {
                warn!("Upload rejected: size limit of {} bytes exceeded", limit);
                json!({ "type": kind, "limit": limit })
            }
            ApplicationError::InvalidImageType => {
                warn!("Upload rejected: unsupported image type");
                json!({ "type": kind, "supported": SUPPORTED_IMAGE_MIME_TYPES })
            }
            ApplicationError::InvalidRequest(ref detail) => {
                warn!("Malformed request: {}", detail);
                json!({ "type": kind })
            }
            ApplicationError::InternalError(ref detail) => {
                error!("Internal server error: {}", detail);
                json!({ "type": kind })
            }
            ref other => {
                warn!("Request rejected: {}", other);
                json!({ "type": kind })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<MultipartRejection> for ApplicationError {
    fn from(rejection: MultipartRejection) -> Self {
        ApplicationError::InvalidRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for ApplicationError {
    fn from(rejection: JsonRejection) -> Self {
        ApplicationError::InvalidRequest(rejection.body_text())
    }
}
