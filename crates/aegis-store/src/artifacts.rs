//! Content-addressed artifact store with hardened file permissions.
//!
//! Artifacts are stored by their SHA-256 hash in a two-level directory
//! layout (first two hex chars as subdirectory). Duplicate content is
//! deduplicated automatically: storing the same bytes twice returns the
//! same reference without writing a second file.
//!
//! Security measures:
//! - base directory and subdirectories created with mode 0o700
//! - files written with mode 0o600
//! - `original_name` is never used as a path segment
//! - every supplied hash or stored path must resolve under the base
//!   directory

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// A blob waiting to be stored, together with its display metadata.
#[derive(Debug, Clone, Default)]
pub struct ArtifactPayload {
    /// Raw content bytes.
    pub content: Vec<u8>,
    /// Name the producer gave the blob. Display only, never a path.
    pub original_name: String,
    /// MIME type of the content.
    pub media_type: String,
    /// Human-readable description.
    pub description: String,
}

impl ArtifactPayload {
    /// Create a payload with the default `text/plain` media type.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            original_name: String::new(),
            media_type: "text/plain".into(),
            description: String::new(),
        }
    }
}

/// Handle to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Lowercase hex SHA-256 of the content.
    pub sha256: String,
    /// Absolute path of the stored file (always under the base directory).
    pub stored_path: String,
    /// Name the producer gave the blob.
    pub original_name: String,
    /// MIME type of the content.
    pub media_type: String,
    /// Human-readable description.
    pub description: String,
    /// Content length in bytes.
    pub size_bytes: u64,
}

/// Store and retrieve binary artifacts by content hash.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    /// Open (or create) an artifact store rooted at `base_dir`.
    ///
    /// The base directory is created with owner-only permissions.
    pub fn new(base_dir: impl AsRef<Path>) -> StoreResult<Self> {
        std::fs::create_dir_all(base_dir.as_ref())?;
        restrict_dir(base_dir.as_ref())?;
        // Canonicalize once so traversal checks compare resolved paths.
        let base_dir = std::fs::canonicalize(base_dir.as_ref())?;
        Ok(Self { base_dir })
    }

    /// Root directory of the store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    // ── public API ───────────────────────────────────────────────────

    /// Store artifact content and return a reference.
    ///
    /// If the same content has been stored before, the existing file is
    /// reused. Writes go to a sibling temp file first and are renamed into
    /// place, so concurrent stores of identical bytes are safe.
    pub fn store(&self, payload: &ArtifactPayload) -> StoreResult<ArtifactRef> {
        let sha = hex::encode(Sha256::digest(&payload.content));
        let file_path = self.artifact_path(&sha)?;

        if !file_path.exists() {
            let subdir = file_path
                .parent()
                .ok_or_else(|| self.traversal_error(&file_path))?;
            std::fs::create_dir_all(subdir)?;
            restrict_dir(subdir)?;

            let mut tmp = tempfile::NamedTempFile::new_in(subdir)?;
            tmp.write_all(&payload.content)?;
            tmp.as_file().sync_all()?;
            restrict_file(tmp.path())?;
            // Losers of a concurrent store race overwrite with identical
            // bytes, which is harmless for content-addressed data.
            tmp.persist(&file_path).map_err(|e| e.error)?;
            debug!(sha256 = %sha, bytes = payload.content.len(), "artifact stored");
        }

        Ok(ArtifactRef {
            sha256: sha,
            stored_path: file_path.to_string_lossy().into_owned(),
            original_name: payload.original_name.clone(),
            media_type: payload.media_type.clone(),
            description: payload.description.clone(),
            size_bytes: payload.content.len() as u64,
        })
    }

    /// Retrieve the raw bytes for an artifact reference.
    pub fn get(&self, artifact: &ArtifactRef) -> StoreResult<Vec<u8>> {
        let path = Path::new(&artifact.stored_path);
        let resolved = std::fs::canonicalize(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::ArtifactNotFound {
                    sha256: artifact.sha256.clone(),
                }
            } else {
                StoreError::Io(e)
            }
        })?;
        if !resolved.starts_with(&self.base_dir) {
            return Err(self.traversal_error(path));
        }
        Ok(std::fs::read(resolved)?)
    }

    /// Whether an artifact with the given hash is stored.
    pub fn exists(&self, sha256: &str) -> StoreResult<bool> {
        Ok(self.artifact_path(sha256)?.exists())
    }

    /// Read an artifact's bytes by hash.
    pub fn read(&self, sha256: &str) -> StoreResult<Vec<u8>> {
        let path = self.artifact_path(sha256)?;
        if !path.exists() {
            return Err(StoreError::ArtifactNotFound {
                sha256: sha256.to_owned(),
            });
        }
        Ok(std::fs::read(path)?)
    }

    /// Remove a stored artifact. Returns `true` if the file existed.
    ///
    /// The parent subdirectory is removed if it becomes empty.
    pub fn delete(&self, sha256: &str) -> StoreResult<bool> {
        let path = self.artifact_path(sha256)?;
        if !path.exists() {
            return Ok(false);
        }

        std::fs::remove_file(&path)?;
        if let Some(subdir) = path.parent() {
            // Only succeeds when empty.
            let _ = std::fs::remove_dir(subdir);
        }
        Ok(true)
    }

    // ── internals ────────────────────────────────────────────────────

    /// Canonical file path for a hash: `<base>/<sha[0:2]>/<sha>`.
    ///
    /// Rejects anything that is not plain lowercase/uppercase hex, which
    /// closes off separator and `..` traversal through the hash argument.
    fn artifact_path(&self, sha256: &str) -> StoreResult<PathBuf> {
        if sha256.len() < 2 || !sha256.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(self.traversal_error(Path::new(sha256)));
        }
        Ok(self.base_dir.join(&sha256[..2]).join(sha256))
    }

    fn traversal_error(&self, path: &Path) -> StoreError {
        StoreError::PathTraversal {
            path: path.to_string_lossy().into_owned(),
            base: self.base_dir.to_string_lossy().into_owned(),
        }
    }
}

#[cfg(unix)]
fn restrict_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(unix)]
fn restrict_file(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────
