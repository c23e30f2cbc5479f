use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not under media folder: {0}")]
    InvalidLocation(String),
    #[error("invalid name: {0:?}")]
    InvalidName(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot load snapshot: {0}")]
    Load(String),
    #[error(transparent)]
    Storage(#[from] storage::StorageError),
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Aggregate result of a batch operation. Items keep being processed after a
/// failure; `success` is false as soon as one item failed.
#[derive(Debug, Clone, Serialize)]
pub struct OpReport {
    pub success: bool,
    pub errors: Vec<String>,
    /// Non-fatal problems, e.g. a preview that could not follow its file.
    pub warnings: Vec<String>,
}

impl Default for OpReport {
    fn default() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl OpReport {
    pub fn fail(&mut self, item: &str, err: impl std::fmt::Display) {
        warn!("{}: {}", item, err);
        self.success = false;
        self.errors.push(format!("{}: {}", item, err));
    }

    pub fn record<T>(&mut self, item: &str, res: Result<T>) -> Option<T> {
        match res {
            Ok(v) => Some(v),
            Err(e) => {
                self.fail(item, e);
                None
            }
        }
    }
}
