use std::path::Path;

use axum::extract::{multipart::Field, Multipart};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::{
    application::{error::ApplicationError, services::IdGenerator},
    domain::{
        config::limits::UploadLimits,
        models::upload::{
            split_filename, IngestedUpload, ScratchFile, UploadFields, UploadedFileDescriptor,
        },
    },
};

/// Consumes a multipart request into one scratch file plus its text fields.
///
/// Nothing is returned until the stream has ended, so field and file order
/// never matter to the caller. Every early return drops the descriptor built
/// so far, which removes its scratch file; this includes a client that goes
/// away mid-upload.
pub struct UploadIngestor<'a> {
    scratch_dir: &'a Path,
    limits: UploadLimits,
    ids: &'a dyn IdGenerator,
}

#[derive(Debug, Default)]
struct Counters {
    parts: usize,
    fields: usize,
    files: usize,
}

impl<'a> UploadIngestor<'a> {
    pub fn new(scratch_dir: &'a Path, limits: UploadLimits, ids: &'a dyn IdGenerator) -> Self {
        Self {
            scratch_dir,
            limits,
            ids,
        }
    }

    pub async fn ingest(&self, mut multipart: Multipart) -> Result<IngestedUpload, ApplicationError> {
        let mut counters = Counters::default();
        let mut file: Option<UploadedFileDescriptor> = None;
        let mut fields = UploadFields::default();

        while let Some(field) = multipart.next_field().await.map_err(stream_error)? {
            counters.parts += 1;
            if self.limits.max_parts.is_some_and(|max| counters.parts > max) {
                return Err(ApplicationError::MaxPartsLimit);
            }

            if field.file_name().is_some() {
                counters.files += 1;
                if counters.files > self.limits.max_files {
                    return Err(ApplicationError::MaxFilesLimit);
                }
                file = Some(self.write_file(field).await?);
            } else {
                counters.fields += 1;
                if counters.fields > self.limits.max_fields {
                    return Err(ApplicationError::MaxFieldsLimit);
                }
                let name = field.name().unwrap_or_default().to_string();
                let value = self.read_text(field).await?;
                fields.insert(name, value);
            }
        }

        let file = file.ok_or(ApplicationError::NoFile)?;
        debug!(
            unique_id = %file.unique_id,
            bytes = file.size_bytes,
            fields = fields.len(),
            "Upload received"
        );
        Ok(IngestedUpload { file, fields })
    }

    async fn write_file(&self, mut field: Field<'_>) -> Result<UploadedFileDescriptor, ApplicationError> {
        let original_filename = field.file_name().unwrap_or_default().to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let unique_id = self.ids.next_id();
        let (_, extension) = split_filename(&original_filename);

        let (std_file, scratch) = ScratchFile::create(self.scratch_dir, &unique_id, &extension)
            .map_err(ApplicationError::internal)?;
        let mut out = tokio::fs::File::from_std(std_file);

        let mut size_bytes = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(stream_error)? {
            size_bytes += chunk.len() as u64;
            if size_bytes > self.limits.max_file_size {
                drop(out);
                if let Err(e) = scratch.delete() {
                    warn!("Failed to delete truncated upload: {}", e);
                }
                return Err(ApplicationError::MaxSizeLimit {
                    limit: self.limits.max_file_size,
                });
            }
            out.write_all(&chunk)
                .await
                .map_err(ApplicationError::internal)?;
        }
        out.flush().await.map_err(ApplicationError::internal)?;

        Ok(UploadedFileDescriptor::new(
            unique_id,
            original_filename,
            mime_type,
            scratch,
            size_bytes,
        ))
    }

    async fn read_text(&self, mut field: Field<'_>) -> Result<String, ApplicationError> {
        let mut value = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(stream_error)? {
            if (value.len() + chunk.len()) as u64 > self.limits.max_field_size {
                return Err(ApplicationError::MaxSizeLimit {
                    limit: self.limits.max_field_size,
                });
            }
            value.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&value).into_owned())
    }
}

fn stream_error(error: axum::extract::multipart::MultipartError) -> ApplicationError {
    ApplicationError::InvalidRequest(format!("multipart stream failed: {}", error.body_text()))
}
