//! Workspace file access, root-locked.
//!
//! Persistence itself is an external concern; this trait is the seam the
//! expand engine reads through. The bundled [`FsStore`] resolves
//! workspace-relative paths and refuses anything that would escape the
//! root. Session paths get the stricter `sessions/<file>.jsonl` shape
//! check so a ref cannot smuggle an arbitrary path through the transcript
//! namespace.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("path escapes the workspace: {0}")]
    Traversal(String),

    #[error("invalid session path: {0}")]
    InvalidSessionPath(String),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

pub trait FileStore: Send + Sync {
    /// Read a workspace-relative file as UTF-8.
    fn read_file(&self, rel_path: &str) -> Result<String, StoreError>;
}

/// Filesystem-backed store rooted at a workspace directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, rel_path: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(rel_path);
        if rel.is_absolute() {
            return Err(StoreError::Traversal(rel_path.to_string()));
        }
        for component in rel.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(StoreError::Traversal(rel_path.to_string())),
            }
        }

        // Transcript refs must look exactly like sessions/<file>.jsonl.
        if rel_path == "sessions" || rel_path.starts_with("sessions/") {
            let mut parts = rel.components();
            let _sessions = parts.next();
            let file = match (parts.next(), parts.next()) {
                (Some(Component::Normal(file)), None) => file,
                _ => return Err(StoreError::InvalidSessionPath(rel_path.to_string())),
            };
            recall_indexer::transcript::session_id_from_path(Path::new(file))
                .map_err(|_| StoreError::InvalidSessionPath(rel_path.to_string()))?;
        }

        Ok(self.root.join(rel))
    }
}

impl FileStore for FsStore {
    fn read_file(&self, rel_path: &str) -> Result<String, StoreError> {
        let path = self.resolve(rel_path)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(rel_path.to_string()))
            }
            Err(source) => Err(StoreError::Io {
                path: rel_path.to_string(),
                source,
            }),
        }
    }
}
