use serde::Serialize;

/// Text fields are small (secret, owner id, crop points).
pub const DEFAULT_MAX_FIELD_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLimits {
    pub max_file_size: u64,
    pub max_files: usize,
    pub max_fields: usize,
    pub max_parts: Option<usize>,
    pub max_field_size: u64,
}

impl UploadLimits {
    pub fn new(max_file_size: u64, max_fields: usize) -> Self {
        Self {
            max_file_size,
            max_files: 1,
            max_fields,
            max_parts: None,
            max_field_size: DEFAULT_MAX_FIELD_SIZE,
        }
    }

    pub fn with_max_parts(mut self, max_parts: usize) -> Self {
        self.max_parts = Some(max_parts);
        self
    }
}
