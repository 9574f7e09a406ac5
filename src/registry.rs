//! Durable set of processed file names, shared by the converter and by
//! external collaborators (upload handlers, status listings).
//!
//! The backing file is a single human-readable JSON array of strings,
//! rewritten wholesale on every accepted update:
//!
//! ```json
//! [
//!     "report.pdf",
//!     "scan.pdf"
//! ]
//! ```
//!
//! ## Concurrency
//!
//! `register` is a read-decide-append-write sequence. Two writers that both
//! read the same prior state and each append would lose one update, so the
//! whole sequence runs under one async mutex. The rewrite itself goes to a
//! uniquely named sibling file that is then renamed over the registry, so a
//! concurrent reader sees either the old array or the new one, never a torn
//! write. Exclusion covers one process; several processes sharing one
//! registry file must not write to it concurrently.

use crate::error::RegistryError;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// File-backed, insertion-ordered, duplicate-free set of file names.
#[derive(Debug)]
pub struct ProcessedFileRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ProcessedFileRegistry {
    /// Open the registry at `path`, creating an empty one if absent.
    ///
    /// The parent directory is created as needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RegistryError::Io {
                    path: path.clone(),
                    source,
                })?;
        }

        let registry = Self {
            path,
            write_lock: Mutex::new(()),
        };

        let _guard = registry.write_lock.lock().await;
        match tokio::fs::metadata(&registry.path).await {
            Ok(_) => {
                // Fail early on a corrupt file rather than on the first update.
                registry.read_entries().await?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                registry.write_entries(&[]).await?;
                info!("Created empty registry at {}", registry.path.display());
            }
            Err(source) => {
                return Err(RegistryError::Io {
                    path: registry.path.clone(),
                    source,
                })
            }
        }
        drop(_guard);

        Ok(registry)
    }

    /// Path of the backing JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add `filename` if not already present.
    ///
    /// Returns `true` when the entry was added, `false` when it was already
    /// listed (the file is left untouched in that case).
    pub async fn register(&self, filename: &str) -> Result<bool, RegistryError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_entries().await?;
        if entries.iter().any(|e| e == filename) {
            debug!("'{}' already registered", filename);
            return Ok(false);
        }
        entries.push(filename.to_string());
        self.write_entries(&entries).await?;

        info!("'{}' added to processed list", filename);
        Ok(true)
    }

    /// Whether `filename` has been registered.
    pub async fn exists(&self, filename: &str) -> Result<bool, RegistryError> {
        Ok(self.read_entries().await?.iter().any(|e| e == filename))
    }

    /// All registered names in insertion order.
    pub async fn list_all(&self) -> Result<Vec<String>, RegistryError> {
        self.read_entries().await
    }

    async fn read_entries(&self) -> Result<Vec<String>, RegistryError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            // Deleted out from under us: behave like a fresh registry.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(RegistryError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| RegistryError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_entries(&self, entries: &[String]) -> Result<(), RegistryError> {
        let json = to_pretty_json(entries).map_err(|source| RegistryError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.sibling_temp_path();
        let io_err = |source| RegistryError::Io {
            path: self.path.clone(),
            source,
        };

        tokio::fs::write(&tmp_path, json).await.map_err(io_err)?;
        if let Err(source) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_err(source));
        }
        Ok(())
    }

    fn sibling_temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "registry".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()))
    }
}

/// Serialise with a four-space indent.
fn to_pretty_json(entries: &[String]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    entries.serialize(&mut ser)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_creates_empty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed_files.json");
        let reg = ProcessedFileRegistry::open(&path).await.unwrap();
        assert!(reg.list_all().await.unwrap().is_empty());
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.trim(), "[]");
    }

    #[tokio::test]
    async fn register_preserves_order_and_suppresses_duplicates() {
        let dir = TempDir::new().unwrap();
        let reg = ProcessedFileRegistry::open(dir.path().join("r.json"))
            .await
            .unwrap();
        assert!(reg.register("b.pdf").await.unwrap());
        assert!(reg.register("a.pdf").await.unwrap());
        assert!(!reg.register("b.pdf").await.unwrap());
        assert_eq!(reg.list_all().await.unwrap(), vec!["b.pdf", "a.pdf"]);
        assert!(reg.exists("a.pdf").await.unwrap());
        assert!(!reg.exists("c.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.json");
        {
            let reg = ProcessedFileRegistry::open(&path).await.unwrap();
            reg.register("keep.pdf").await.unwrap();
        }
        let reg = ProcessedFileRegistry::open(&path).await.unwrap();
        assert_eq!(reg.list_all().await.unwrap(), vec!["keep.pdf"]);
    }

    #[tokio::test]
    async fn file_is_indented_json_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.json");
        let reg = ProcessedFileRegistry::open(&path).await.unwrap();
        reg.register("x.pdf").await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "[\n    \"x.pdf\"\n]");
    }

    #[tokio::test]
    async fn corrupt_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = ProcessedFileRegistry::open(&path).await.unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }), "got {err:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_lose_no_updates() {
        let dir = TempDir::new().unwrap();
        let reg = Arc::new(
            ProcessedFileRegistry::open(dir.path().join("r.json"))
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..32 {
            let reg = Arc::clone(&reg);
            handles.push(tokio::spawn(async move {
                reg.register(&format!("file-{i:02}.pdf")).await.unwrap()
            }));
        }
        for h in handles {
            assert!(h.await.unwrap());
        }

        let mut all = reg.list_all().await.unwrap();
        assert_eq!(all.len(), 32);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 32);

        // No stray temp files left next to the registry.
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
