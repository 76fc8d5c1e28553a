//! Whole-document JSON persistence.
//!
//! A [`JsonDocument`] holds one value in memory and writes all of it to disk
//! on every [`flush`](JsonDocument::flush). There is no delta log: the file
//! is always a complete, human-readable snapshot.
//!
//! Writes go to a sibling `*.tmp` file which is then renamed over the
//! document, so a crash mid-write leaves the previous snapshot intact.
//! Flushes are serialized and each one captures the in-memory state after
//! acquiring the write slot, so the last write to land is always the newest
//! state.
//!
//! One document holds every key, so a flush made for one key also writes
//! whatever other keys have changed in memory. A failed flush is therefore
//! undone with [`revert`](JsonDocument::revert), which restores memory and
//! saves again: another key's flush may already have put the abandoned
//! change on disk. If that second save fails too, the disk keeps the
//! abandoned change until the next successful flush.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};

use crate::error::DbError;

/// A JSON document loaded once and saved as a whole.
#[derive(Debug)]
pub struct JsonDocument<T> {
    path: PathBuf,
    state: RwLock<T>,
    write_slot: Mutex<()>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Load the document at `path`.
    ///
    /// A missing file yields `T::default()`; the file is created on the
    /// first flush.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the file exists but cannot be read, or
    /// [`DbError::Serialization`] if it is not valid JSON for `T`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, DbError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => T::default(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| {
                DbError::Serialization {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "document not found, starting empty");
                T::default()
            }
            Err(source) => return Err(DbError::Io { path, source }),
        };

        Ok(Self::with_state(path, state))
    }

    /// Wrap an in-memory value without touching the disk.
    pub fn with_state(path: impl Into<PathBuf>, state: T) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(state),
            write_slot: Mutex::new(()),
        }
    }

    /// The file this document is saved to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the current in-memory state.
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.state.read().await;
        f(&guard)
    }

    /// Mutate the in-memory state. Nothing is written until
    /// [`flush`](Self::flush).
    pub async fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.state.write().await;
        f(&mut guard)
    }

    /// Write the current in-memory state to disk.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if encoding fails and
    /// [`DbError::Io`] if creating the directory, writing the temp file, or
    /// renaming it fails.
    pub async fn flush(&self) -> Result<(), DbError> {
        let _slot = self.write_slot.lock().await;

        let bytes = {
            let guard = self.state.read().await;
            serde_json::to_vec_pretty(&*guard).map_err(|source| DbError::Serialization {
                path: self.path.clone(),
                source,
            })?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| DbError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| DbError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| DbError::Io {
                path: self.path.clone(),
                source,
            })?;

        tracing::trace!(path = %self.path.display(), bytes = bytes.len(), "document flushed");
        Ok(())
    }

    /// Undo an in-memory change after a failed flush and save the result.
    ///
    /// A second failure is logged; the caller already reports the first.
    pub async fn revert(&self, undo: impl FnOnce(&mut T)) {
        self.update(undo).await;
        if let Err(e) = self.flush().await {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "could not save rolled-back document"
            );
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
