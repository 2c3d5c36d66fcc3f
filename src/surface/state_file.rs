//! Management surface backed by a JSON state file.
//!
//! Lets `plan` and `apply` run offline against a recorded snapshot of a
//! server.  Every successful operation rewrites the file.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::memory::InMemorySurface;
use super::{ManagementSurface, SurfaceError};
use crate::engine::Operation;
use crate::model::{CurrentState, Identity};

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    objects: Vec<CurrentState>,
}

/// Surface that loads objects from, and saves them to, a JSON file.
#[derive(Debug)]
pub struct StateFileSurface {
    path: PathBuf,
    inner: InMemorySurface,
    write_lock: Mutex<()>,
}

impl StateFileSurface {
    /// Load `path`; a missing file is an empty state.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Io`] if the file cannot be read, or
    /// [`SurfaceError::InvalidResponse`] if it is not a valid state document.
    pub fn open(path: &Path) -> Result<Self, SurfaceError> {
        let document = if path.exists() {
            let text = fs::read_to_string(path).map_err(|source| SurfaceError::Io {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str::<StateDocument>(&text).map_err(|e| {
                SurfaceError::InvalidResponse {
                    resource: path.display().to_string(),
                    reason: e.to_string(),
                }
            })?
        } else {
            StateDocument::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            inner: InMemorySurface::from_objects(document.objects),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), SurfaceError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let document = StateDocument {
            objects: self.inner.snapshot(),
        };
        let io_err = |source| SurfaceError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let text = serde_json::to_string_pretty(&document).map_err(|e| {
            SurfaceError::InvalidResponse {
                resource: self.path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&self.path, text + "\n").map_err(io_err)
    }
}

impl ManagementSurface for StateFileSurface {
    fn fetch(&self, identity: &Identity) -> Result<Option<CurrentState>, SurfaceError> {
        self.inner.fetch(identity)
    }

    fn execute(&self, operation: &Operation) -> Result<(), SurfaceError> {
        self.inner.execute(operation)?;
        self.persist()
    }
}
