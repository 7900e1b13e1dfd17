//! The public namespace: every stored asset lives below one root, one fixed
//! directory per category. No resolved path may leave the root.

use std::{
    io,
    path::{Component, Path, PathBuf},
};

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::{application::error::ApplicationError, domain::models::asset::AssetCategory};

/// Characters escaped in the filename component of a public path. Mirrors
/// what a browser's `encodeURI` would escape, plus `#` and `?` which would
/// otherwise cut the path short.
const FILENAME_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

pub fn encode_filename(filename: &str) -> String {
    utf8_percent_encode(filename, FILENAME_ENCODE_SET).to_string()
}

#[derive(Debug, Clone)]
pub struct PublicNamespace {
    root: PathBuf,
}

impl PublicNamespace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: AssetCategory) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Creates the root and every category directory.
    pub async fn ensure_layout(&self) -> io::Result<()> {
        for category in AssetCategory::ALL {
            tokio::fs::create_dir_all(self.category_dir(category)).await?;
        }
        Ok(())
    }

    /// Lexically joins a client supplied relative path onto the root.
    /// Any `..`, drive prefix or NUL byte is rejected outright.
    pub fn join_relative(&self, relative: &str) -> Result<PathBuf, ApplicationError> {
        if relative.contains('\0') {
            return Err(ApplicationError::InvalidPath);
        }

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(relative.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ApplicationError::InvalidPath);
                }
            }
        }

        if depth == 0 {
            return Err(ApplicationError::InvalidPath);
        }
        Ok(resolved)
    }

    /// Resolves a path that must name an existing regular file inside the
    /// root. Symlinks pointing outside the root are rejected as well.
    pub async fn resolve_file(&self, relative: &str) -> Result<PathBuf, ApplicationError> {
        let path = self.join_relative(relative)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ApplicationError::FileNotFound)
            }
            Err(e) => return Err(ApplicationError::internal(e)),
        };
        if metadata.is_dir() {
            return Err(ApplicationError::InvalidPath);
        }

        let canonical_root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(ApplicationError::internal)?;
        let canonical = tokio::fs::canonicalize(&path)
            .await
            .map_err(ApplicationError::internal)?;
        if !canonical.starts_with(&canonical_root) {
            return Err(ApplicationError::InvalidPath);
        }

        Ok(path)
    }

    /// The root and the category roots are never removed by cleanup.
    pub fn is_protected_dir(&self, dir: &Path) -> bool {
        dir == self.root
            || AssetCategory::ALL
                .iter()
                .any(|category| dir == self.category_dir(*category))
    }

    /// Relative public path for a stored file, filename percent-encoded.
    pub fn public_path(&self, directories: &[&str], filename: &str) -> String {
        let mut parts: Vec<String> = directories.iter().map(|d| d.to_string()).collect();
        parts.push(encode_filename(filename));
        parts.join("/")
    }
}

/// Accepts a value used as a single directory name: non-empty, no
/// separators, not `.` or `..`.
pub fn check_segment(segment: &str) -> Result<&str, ApplicationError> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0']);
    if valid {
        Ok(segment)
    } else {
        Err(ApplicationError::InvalidPath)
    }
}
