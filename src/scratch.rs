//! Scratch files for uploaded payloads.
//!
//! Each upload is written under the configured upload directory with a
//! request-unique name and removed when the guard drops, so no scratch file
//! survives its request on any exit path.

use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

/// An on-disk scratch file that deletes itself on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Write `data` to a freshly named file under `dir`.
    ///
    /// The extension is taken from the client filename, defaulting to `.jpg`
    /// when absent or unusable.
    pub fn write(dir: &Path, client_filename: Option<&str>, data: &[u8]) -> std::io::Result<Self> {
        let path = dir.join(unique_name(client_filename));
        std::fs::write(&path, data)?;
        Ok(Self { path })
    }

    /// Claim an already-written path (used for derived images such as the
    /// preprocessed PNG fed to the engine).
    pub fn adopt(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path with the same unique stem and a new suffix.
    pub fn sibling(&self, suffix: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("img");
        self.path.with_file_name(format!("{stem}{suffix}"))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove scratch file {:?}: {}", self.path, e);
            }
        }
    }
}

/// `img_<uuid>.<ext>` — unique per request, collision-free under concurrency.
fn unique_name(client_filename: Option<&str>) -> String {
    let ext = client_filename
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("jpg")
        .to_ascii_lowercase();
    format!("img_{}.{}", Uuid::new_v4().simple(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unique_names_do_not_collide() {
        let names: HashSet<String> = (0..10_000).map(|_| unique_name(Some("a.png"))).collect();
        assert_eq!(names.len(), 10_000);
    }

    #[test]
    fn test_extension_from_client_filename() {
        assert!(unique_name(Some("scan.PNG")).ends_with(".png"));
        assert!(unique_name(Some("noext")).ends_with(".jpg"));
        assert!(unique_name(None).ends_with(".jpg"));
        // Path traversal attempts never leak into the name
        assert!(unique_name(Some("../../etc/passwd")).ends_with(".jpg"));
    }

    #[test]
    fn test_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchFile::write(dir.path(), Some("x.png"), b"bytes").unwrap();
            assert!(scratch.path().exists());
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_tolerates_already_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchFile::write(dir.path(), None, b"bytes").unwrap();
        std::fs::remove_file(scratch.path()).unwrap();
        drop(scratch); // must not panic
    }

    #[test]
    fn test_sibling_shares_stem() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchFile::write(dir.path(), Some("x.jpg"), b"b").unwrap();
        let sib = scratch.sibling("_pre.png");
        let stem = scratch.path().file_stem().unwrap().to_str().unwrap();
        assert!(sib.file_name().unwrap().to_str().unwrap().starts_with(stem));
    }
}
