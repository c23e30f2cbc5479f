use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use storage::SnapshotStore;
use tracing::{info, warn};

pub const CLIPS_SNAPSHOT: &str = "clip_data";

/// A marked time range inside a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipEntry {
    pub start: f64,
    #[serde(alias = "end")]
    pub stop: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ClipEntry {
    pub fn new(start: f64, stop: f64) -> Self {
        Self {
            start,
            stop,
            name: None,
        }
    }
}

/// Clip lists keyed by media URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipStore {
    clips: BTreeMap<String, Vec<ClipEntry>>,
}

impl ClipStore {
    pub fn set_clips(&mut self, key: &str, clips: Vec<ClipEntry>) {
        self.clips.insert(key.to_string(), clips);
    }

    pub fn get_clips(&self, key: &str) -> &[ClipEntry] {
        self.clips.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.clips.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<ClipEntry>> {
        self.clips.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<ClipEntry>)> {
        self.clips.iter()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Moves the list at `old` to `new`, replacing whatever `new` held.
    pub fn rekey(&mut self, old: &str, new: &str) -> bool {
        match self.clips.remove(old) {
            Some(list) => {
                self.clips.insert(new.to_string(), list);
                true
            }
            None => false,
        }
    }

    /// Re-points every key under the directory URL `old_prefix`.
    pub fn rekey_prefix(&mut self, old_prefix: &str, new_prefix: &str) -> usize {
        let old_dir = format!("{}/", old_prefix.trim_end_matches('/'));
        let new_dir = format!("{}/", new_prefix.trim_end_matches('/'));
        let keys: Vec<String> = self
            .clips
            .keys()
            .filter(|k| k.starts_with(&old_dir))
            .cloned()
            .collect();
        for key in &keys {
            let new_key = format!("{}{}", new_dir, &key[old_dir.len()..]);
            self.rekey(key, &new_key);
        }
        keys.len()
    }

    /// Drops every key under the directory URL `prefix`, and `prefix` itself.
    pub fn remove_prefix(&mut self, prefix: &str) -> usize {
        let prefix = prefix.trim_end_matches('/');
        let dir = format!("{}/", prefix);
        let before = self.clips.len();
        self.clips.retain(|k, _| k != prefix && !k.starts_with(&dir));
        before - self.clips.len()
    }

    /// Reads the clip snapshot. A missing file is an empty store; an
    /// unreadable one is a `Load` error.
    pub fn read(store: &SnapshotStore) -> crate::Result<Self> {
        let clips = store
            .read::<BTreeMap<String, Vec<ClipEntry>>>(CLIPS_SNAPSHOT)
            .map_err(|e| crate::CatalogError::Load(e.to_string()))?
            .unwrap_or_default();
        info!("loaded clips for {} media", clips.len());
        Ok(Self { clips })
    }

    /// Loads the clip snapshot; unreadable data yields an empty store.
    pub fn load(store: &SnapshotStore) -> Self {
        Self::read(store).unwrap_or_else(|e| {
            warn!("can't load saved clip data: {}", e);
            Self::default()
        })
    }

    pub fn save(&self, store: &SnapshotStore) -> crate::Result<()> {
        store.write(CLIPS_SNAPSHOT, &self.clips)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_reads_empty() {
        let store = ClipStore::default();
        assert!(store.get_clips("/static/v.mp4").is_empty());
    }

    #[test]
    fn rekey_moves_and_overwrites() {
        let mut store = ClipStore::default();
        store.set_clips("/static/a.mp4", vec![ClipEntry::new(1.0, 2.0)]);
        store.set_clips("/static/b.mp4", vec![ClipEntry::new(5.0, 6.0)]);
        assert!(store.rekey("/static/a.mp4", "/static/b.mp4"));
        assert!(!store.contains("/static/a.mp4"));
        assert_eq!(store.get_clips("/static/b.mp4"), &[ClipEntry::new(1.0, 2.0)]);
        assert!(!store.rekey("/static/missing.mp4", "/static/x.mp4"));
        assert!(!store.contains("/static/x.mp4"));
    }

    #[test]
    fn rekey_prefix_only_touches_directory_members() {
        let mut store = ClipStore::default();
        store.set_clips("/static/trip/a.mp4", vec![ClipEntry::new(0.0, 1.0)]);
        store.set_clips("/static/trip2/b.mp4", vec![ClipEntry::new(0.0, 1.0)]);
        assert_eq!(store.rekey_prefix("/static/trip", "/static/holiday"), 1);
        assert!(store.contains("/static/holiday/a.mp4"));
        assert!(store.contains("/static/trip2/b.mp4"));
    }

    #[test]
    fn remove_prefix_drops_directory_members_only() {
        let mut store = ClipStore::default();
        store.set_clips("/static/deleted/album/a.mp4", vec![ClipEntry::new(0.0, 1.0)]);
        store.set_clips("/static/deleted/album/sub/b.mp4", vec![ClipEntry::new(0.0, 1.0)]);
        store.set_clips("/static/deleted/album2/c.mp4", vec![ClipEntry::new(0.0, 1.0)]);
        assert_eq!(store.remove_prefix("/static/deleted/album"), 2);
        assert_eq!(store.len(), 1);
        assert!(store.contains("/static/deleted/album2/c.mp4"));
    }

    #[test]
    fn accepts_legacy_end_key_and_persists() {
        let temp = tempfile::tempdir().unwrap();
        let snapshots = SnapshotStore::open(temp.path()).unwrap();
        std::fs::write(
            snapshots.path_of(CLIPS_SNAPSHOT),
            r#"{"/static/v.mp4": [{"start": 10.0, "end": 20.0, "name": "clip1"}]}"#,
        )
        .unwrap();
        let mut store = ClipStore::load(&snapshots);
        assert_eq!(store.get_clips("/static/v.mp4")[0].stop, 20.0);

        store.set_clips("/static/w.mp4", vec![ClipEntry::new(3.5, 4.0)]);
        store.save(&snapshots).unwrap();
        assert_eq!(ClipStore::load(&snapshots), store);
    }

    #[test]
    fn corrupt_snapshot_loads_empty() {
        let temp = tempfile::tempdir().unwrap();
        let snapshots = SnapshotStore::open(temp.path()).unwrap();
        std::fs::write(snapshots.path_of(CLIPS_SNAPSHOT), "[1,").unwrap();
        assert!(matches!(ClipStore::read(&snapshots), Err(crate::CatalogError::Load(_))));
        assert!(ClipStore::load(&snapshots).is_empty());
    }
}
