use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("invalid secret")]
    InvalidSecret,

    #[error("no file part in request")]
    NoFile,

    #[error("missing owner id")]
    MissingOwnerId,

    #[error("file exceeds {limit} bytes")]
    MaxSizeLimit { limit: u64 },

    #[error("too many fields")]
    MaxFieldsLimit,

    #[error("too many files")]
    MaxFilesLimit,

    #[error("too many parts")]
    MaxPartsLimit,

    #[error("unsupported image type")]
    InvalidImageType,

    #[error("invalid crop points")]
    InvalidPoints,

    #[error("image could not be transcoded")]
    CompressError,

    #[error("invalid path")]
    InvalidPath,

    #[error("file not found")]
    FileNotFound,

    #[error("invalid remote url")]
    InvalidUrl,

    #[error("malformed request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        ApplicationError::InternalError(err.to_string())
    }
}
