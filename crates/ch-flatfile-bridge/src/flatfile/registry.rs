//! Registry of server-assigned file handles.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::FileHandle;
use crate::error::{BridgeError, Result};

/// Maps opaque [`FileHandle`]s to files on disk.
///
/// Uploaded bytes are stored under the upload directory with a name of the form
/// `<uuid>-<sanitized original name>`. Only handles issued by this registry
/// resolve; nothing a caller passes in is ever used as a path directly.
pub struct UploadRegistry {
    upload_dir: PathBuf,
    files: Mutex<HashMap<FileHandle, StoredFile>>,
}

struct StoredFile {
    path: PathBuf,
    /// Stored by [`UploadRegistry::upload`], so the registry may delete it.
    owned: bool,
}

impl UploadRegistry {
    /// Create a registry storing uploads under `upload_dir`.
    ///
    /// The directory is created on the first upload.
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            files: Mutex::new(HashMap::new()),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Store uploaded bytes and issue a handle for them.
    pub async fn upload(&self, bytes: &[u8], original_name: &str) -> Result<FileHandle> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;

        let handle = new_handle(original_name);
        let path = self.upload_dir.join(handle.as_str());
        tokio::fs::write(&path, bytes).await?;

        info!(
            "Stored upload '{}' ({} bytes) as {}",
            original_name,
            bytes.len(),
            handle
        );
        self.insert(handle.clone(), path, true);
        Ok(handle)
    }

    /// Issue a handle for a file that already exists locally.
    pub fn register(&self, path: impl AsRef<Path>) -> Result<FileHandle> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(BridgeError::NotFound(format!(
                "file '{}' does not exist",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let handle = new_handle(&name);
        self.insert(handle.clone(), path.to_path_buf(), false);
        Ok(handle)
    }

    /// Resolve a handle to its file.
    pub fn resolve(&self, handle: &FileHandle) -> Result<PathBuf> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        let path = files.get(handle).map(|f| f.path.clone()).ok_or_else(|| {
            BridgeError::NotFound(format!("no uploaded file with handle '{}'", handle))
        })?;
        if !path.is_file() {
            return Err(BridgeError::NotFound(format!(
                "file for handle '{}' is no longer available",
                handle
            )));
        }
        Ok(path)
    }

    /// Drop a handle so it no longer resolves.
    ///
    /// Uploaded bytes are deleted from disk; registered local files are left alone.
    /// Returns the path the handle pointed to, if it was known.
    pub fn forget(&self, handle: &FileHandle) -> Option<PathBuf> {
        let stored = {
            let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
            files.remove(handle)?
        };

        if stored.owned {
            match std::fs::remove_file(&stored.path) {
                Ok(()) => debug!("Removed upload {} ({})", handle, stored.path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove upload {}: {}", stored.path.display(), e),
            }
        } else {
            debug!("Released handle {}", handle);
        }
        Some(stored.path)
    }

    fn insert(&self, handle: FileHandle, path: PathBuf, owned: bool) {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.insert(handle, StoredFile { path, owned });
    }
}

fn new_handle(original_name: &str) -> FileHandle {
    FileHandle::new(format!(
        "{}-{}",
        Uuid::new_v4().simple(),
        sanitize_name(original_name)
    ))
}

/// Reduce a client-supplied name to a safe single path component.
fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
