use thiserror::Error;
use tracing::warn;

use crate::application::error::ApplicationError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unrecognised image format")]
    UnknownFormat,

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Crop box lies outside the image")]
    CropOutOfBounds,

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decoded frames exceed {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine task failed: {0}")]
    Task(String),
}

impl From<EngineError> for ApplicationError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Task(msg) => {
                ApplicationError::InternalError(format!("Engine error: {}", msg))
            }
            other => {
                warn!("Engine failure: {}", other);
                ApplicationError::CompressError
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Unsupported URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Remote answered with status {0}")]
    Status(u16),

    #[error("Remote body exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

impl From<FetchError> for ApplicationError {
    fn from(error: FetchError) -> Self {
        warn!("Remote fetch failed: {}", error);
        ApplicationError::InvalidUrl
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::NetworkError("Request timeout".to_string())
        } else if error.is_connect() {
            FetchError::NetworkError(format!("Connection failed: {}", error))
        } else if error.is_redirect() {
            FetchError::InvalidUrl(format!("Too many redirects: {}", error))
        } else if let Some(status) = error.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::NetworkError(error.to_string())
        }
    }
}
