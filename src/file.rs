//! Input files, the upload validator, and downloaded artifacts.
//!
//! Validation is deliberately shallow: a suffix check and a size ceiling.
//! The service re-validates and inspects the content itself, so the client
//! never sniffs magic bytes.

use crate::config::{ACCEPTED_EXTENSION, MAX_UPLOAD_BYTES};
use crate::error::{ClientError, ValidationError};
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A file chosen by the user: its name and full content.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// File name as shown to the user (no directory part).
    pub name: String,
    /// Raw document bytes. `Bytes` so the upload can share it without copying.
    pub content: Bytes,
}

impl std::fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("size", &self.size())
            .finish()
    }
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Read a local file into memory.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ClientError::NoFileName {
                path: path.to_path_buf(),
            })?;
        let content = tokio::fs::read(path)
            .await
            .map_err(|source| ClientError::FileReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Read {} ({} bytes)", path.display(), content.len());
        Ok(Self::new(name, content))
    }
}

/// Acceptance rules for candidate files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRules {
    /// Required suffix, matched exactly (no case folding).
    pub accepted_extension: String,
    /// Inclusive upper bound on the byte size.
    pub max_bytes: u64,
}

impl Default for FileRules {
    fn default() -> Self {
        Self {
            accepted_extension: ACCEPTED_EXTENSION.to_string(),
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl FileRules {
    /// Accept or reject a file by name and size. The extension is checked first.
    pub fn check(&self, name: &str, size: u64) -> Result<(), ValidationError> {
        if !name.ends_with(&self.accepted_extension) {
            return Err(ValidationError::WrongExtension {
                name: name.to_string(),
                expected: self.accepted_extension.clone(),
            });
        }
        if size > self.max_bytes {
            return Err(ValidationError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Validate against the default rules (`.pdf`, 50 MiB).
pub fn validate_file(name: &str, size: u64) -> Result<(), ValidationError> {
    FileRules::default().check(name, size)
}

/// The translated document returned by the service.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Suggested file name: the configured prefix + the original name.
    pub file_name: String,
    pub content: Bytes,
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifact")
            .field("file_name", &self.file_name)
            .field("size", &self.content.len())
            .finish()
    }
}

impl Artifact {
    /// Write the artifact into `dir` under [`Artifact::file_name`].
    ///
    /// Atomic: the bytes go to a temp file in the same directory which is then
    /// renamed over the target, so a crash never leaves a truncated PDF.
    pub async fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ClientError> {
        let dir = dir.as_ref().to_path_buf();
        let target = dir.join(&self.file_name);
        let dest = target.clone();
        let content = self.content.clone();

        let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&content)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&dest).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| ClientError::ArtifactWriteFailed {
            path: target.clone(),
            source: std::io::Error::other(e),
        })?;

        written.map_err(|source| ClientError::ArtifactWriteFailed {
            path: target.clone(),
            source,
        })?;
        debug!("Wrote {} ({} bytes)", target.display(), self.content.len());
        Ok(target)
    }
}

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2 MB`.
///
/// 1024-based, at most two decimals, trailing zeros dropped. Sizes beyond
/// the GB range stay in GB.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
