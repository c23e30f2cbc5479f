//! Storage layer: JSON snapshot files under the media root.
//!
//! Every snapshot is a whole-file rewrite. Writes go to a sibling temp file
//! first and are renamed into place, so a crash mid-write leaves the previous
//! snapshot intact.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const SNAPSHOT_EXT: &str = "json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A directory of named JSON snapshots, e.g. `<media>/.database`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Opens the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot called `name` (without extension).
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, SNAPSHOT_EXT))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    /// Reads and decodes a snapshot. A missing file is `Ok(None)`.
    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.path_of(name);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        let value =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Decode { path, source })?;
        Ok(Some(value))
    }

    /// Encodes and writes a snapshot via temp file + rename.
    pub fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.path_of(name);
        let bytes = serde_json::to_vec(value).map_err(|source| StorageError::Encode {
            path: path.clone(),
            source,
        })?;
        let tmp = self.dir.join(format!(".{}.{}.tmp", name, SNAPSHOT_EXT));
        fs::write(&tmp, &bytes).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("wrote snapshot {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_snapshot_reads_as_none() {
        let temp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(temp.path().join(".database")).unwrap();
        let value: Option<BTreeMap<String, u32>> = store.read("absent").unwrap();
        assert!(value.is_none());
        assert!(store.dir().is_dir());
    }

    #[test]
    fn write_then_read_replaces_whole_file() {
        let temp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(temp.path()).unwrap();
        store.write("clip_data", &vec![1, 2, 3]).unwrap();
        store.write("clip_data", &vec![4]).unwrap();
        let value: Vec<i32> = store.read("clip_data").unwrap().unwrap();
        assert_eq!(value, vec![4]);
        assert!(store.exists("clip_data"));
        assert!(!temp.path().join(".clip_data.json.tmp").exists());
    }

    #[test]
    fn corrupt_snapshot_is_a_decode_error() {
        let temp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(temp.path()).unwrap();
        std::fs::write(store.path_of("tags"), "{not json").unwrap();
        let err = store.read::<Vec<String>>("tags").unwrap_err();
        assert!(matches!(err, StorageError::Decode { .. }));
    }
}
