use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use tempfile::TempPath;

/// A scratch file that is removed exactly once.
///
/// Deletion happens either through [`ScratchFile::delete`], which consumes the
/// handle, or on drop. Dropping covers every early return and a request task
/// cancelled by a client disconnect.
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    /// Creates `<dir>/<unique_id><extension>` exclusively and returns the open
    /// handle alongside its reaper.
    pub fn create(
        dir: &Path,
        unique_id: &str,
        extension: &str,
    ) -> io::Result<(std::fs::File, Self)> {
        let named = tempfile::Builder::new()
            .prefix(unique_id)
            .suffix(extension)
            .rand_bytes(0)
            .tempfile_in(dir)?;
        let (file, path) = named.into_parts();
        Ok((file, Self { path }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delete(self) -> io::Result<()> {
        match self.path.close() {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[derive(Debug)]
pub struct UploadedFileDescriptor {
    pub unique_id: String,
    pub original_filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    scratch: ScratchFile,
}

impl UploadedFileDescriptor {
    pub fn new(
        unique_id: String,
        original_filename: String,
        mime_type: String,
        scratch: ScratchFile,
        size_bytes: u64,
    ) -> Self {
        Self {
            unique_id,
            original_filename,
            mime_type,
            size_bytes,
            scratch,
        }
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Stem and extension of the client-supplied filename; the extension
    /// keeps its leading dot and is empty when absent.
    pub fn original_name_parts(&self) -> (String, String) {
        split_filename(&self.original_filename)
    }

    pub fn delete(self) -> io::Result<()> {
        self.scratch.delete()
    }
}

pub fn split_filename(filename: &str) -> (String, String) {
    let base = Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let path = PathBuf::from(&base);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, ext)
}

/// Text fields of a multipart request, last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadFields {
    values: HashMap<String, String>,
}

impl UploadFields {
    pub fn insert(&mut self, name: String, value: String) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn secret(&self) -> Option<&str> {
        self.get("secret")
    }

    /// `ownerId`, falling back to the legacy `id` field.
    pub fn owner_id(&self) -> Option<&str> {
        self.get("ownerId")
            .or_else(|| self.get("id"))
            .filter(|s| !s.is_empty())
    }

    pub fn points(&self) -> Option<&str> {
        self.get("points")
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything a multipart request produced, available only once the whole
/// stream has been consumed.
#[derive(Debug)]
pub struct IngestedUpload {
    pub file: UploadedFileDescriptor,
    pub fields: UploadFields,
}
