//! Tag index: tag name -> member basenames, hidden tags and the recency list.

use crate::collate::Transliterator;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use storage::SnapshotStore;
use tracing::{debug, info, warn};

pub type TagMap = BTreeMap<String, BTreeSet<String>>;

pub const TAGS_SNAPSHOT: &str = "tags";
pub const DEFAULT_TAG: &str = "best";
pub const RECENT_LIMIT: usize = 10;

/// On-disk shapes of the tag snapshot, newest first.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagSnapshot {
    Full(TagMap, BTreeSet<String>, Vec<String>),
    WithHidden(TagMap, BTreeSet<String>),
    Bare(TagMap),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagFilter {
    And,
    Or,
}

/// One row of the user-facing tag listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagListing {
    pub name: String,
    pub transliteration: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagIndex {
    tags: TagMap,
    hidden: BTreeSet<String>,
    recent: Vec<String>,
}

impl TagIndex {
    pub fn new(tags: TagMap) -> Self {
        Self {
            tags,
            ..Self::default()
        }
    }

    /// State used when no snapshot can be loaded.
    pub fn fallback() -> Self {
        Self::new(TagMap::from([(DEFAULT_TAG.to_string(), BTreeSet::new())]))
    }

    pub fn raw(&self) -> &TagMap {
        &self.tags
    }

    pub fn hidden(&self) -> &BTreeSet<String> {
        &self.hidden
    }

    /// Most-recently applied tags, most recent last.
    pub fn recent(&self) -> &[String] {
        &self.recent
    }

    pub fn contains_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn members(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.tags.get(tag)
    }

    pub fn has_member(&self, tag: &str, basename: &str) -> bool {
        self.tags.get(tag).is_some_and(|m| m.contains(basename))
    }

    /// Applies `requested` to `basename`. Missing tags are created; with
    /// `allow_remove` the file is also dropped from every tag not requested.
    /// Returns whether anything changed.
    pub fn add_tags_to_media(&mut self, basename: &str, requested: &[String], allow_remove: bool) -> bool {
        let requested: Vec<&str> = requested
            .iter()
            .map(|t| t.trim())
            .filter(|t| {
                let ok = is_valid_tag_name(t);
                if !ok {
                    warn!("skipping invalid tag name {:?}", t);
                }
                ok
            })
            .collect();

        let mut changed = false;
        for tag in &requested {
            if !self.tags.contains_key(*tag) {
                self.tags.insert(tag.to_string(), BTreeSet::new());
                changed = true;
            }
        }
        for tag in &requested {
            let Some(members) = self.tags.get_mut(*tag) else {
                continue;
            };
            if members.insert(basename.to_string()) {
                changed = true;
                self.touch_recent(tag);
            }
        }
        if allow_remove {
            for (tag, members) in self.tags.iter_mut() {
                if !requested.contains(&tag.as_str()) && members.remove(basename) {
                    changed = true;
                }
            }
        }
        if changed {
            debug!("tags of {} updated", basename);
        }
        changed
    }

    fn touch_recent(&mut self, tag: &str) {
        self.recent.retain(|t| t != tag);
        self.recent.push(tag.to_string());
        if self.recent.len() > RECENT_LIMIT {
            let excess = self.recent.len() - RECENT_LIMIT;
            self.recent.drain(..excess);
        }
    }

    /// Folds every source tag (and any existing destination) into `dest`,
    /// then removes the sources. `dest` itself may appear among the sources.
    /// An invalid destination name leaves the index untouched.
    pub fn merge_tags(&mut self, sources: &[String], dest: &str) -> crate::Result<()> {
        let dest = dest.trim();
        if !is_valid_tag_name(dest) {
            warn!("refusing to merge into invalid tag name {:?}", dest);
            return Err(crate::CatalogError::InvalidName(dest.to_string()));
        }
        let mut merged = self.tags.get(dest).cloned().unwrap_or_default();
        for tag in sources {
            if let Some(members) = self.tags.get(tag) {
                merged.extend(members.iter().cloned());
            }
        }
        for tag in sources {
            self.tags.remove(tag);
        }
        info!("merged {} tag(s) into {} ({} members)", sources.len(), dest, merged.len());
        self.tags.insert(dest.to_string(), merged);
        Ok(())
    }

    /// Deletes the named tags outright.
    pub fn remove_tags(&mut self, names: &[String]) -> usize {
        names.iter().filter(|n| self.tags.remove(n.as_str()).is_some()).count()
    }

    /// Swaps `old` for `new` in every tag containing it. Returns the tags touched.
    pub fn rename_member(&mut self, old: &str, new: &str) -> Vec<String> {
        let mut touched = Vec::new();
        for (tag, members) in self.tags.iter_mut() {
            if members.remove(old) {
                members.insert(new.to_string());
                touched.push(tag.clone());
            }
        }
        touched
    }

    pub fn remove_member(&mut self, basename: &str) -> bool {
        let mut removed = false;
        for members in self.tags.values_mut() {
            removed |= members.remove(basename);
        }
        removed
    }

    /// Symmetric difference of the hidden set with `names`.
    pub fn toggle_hidden(&mut self, names: &[String]) {
        for name in names {
            if !self.hidden.remove(name) {
                self.hidden.insert(name.clone());
            }
        }
    }

    /// True when `basename` belongs to a hidden tag other than `except`.
    pub fn is_hidden_member(&self, basename: &str, except: Option<&str>) -> bool {
        self.hidden
            .iter()
            .filter(|t| Some(t.as_str()) != except)
            .any(|t| self.has_member(t, basename))
    }

    /// Listable tags: non-empty, alphanumeric names, in transliterated order.
    pub fn sorted_view(&self, translit: &dyn Transliterator) -> Vec<TagListing> {
        let mut keyed: Vec<(String, &String)> = self
            .tags
            .iter()
            .filter(|(name, members)| {
                !members.is_empty() && !name.is_empty() && name.chars().all(char::is_alphanumeric)
            })
            .map(|(name, _)| (translit.sort_key(name), name))
            .collect();
        keyed.sort();
        keyed
            .into_iter()
            .map(|(_, name)| TagListing {
                name: name.clone(),
                transliteration: translit.transliterate(name),
            })
            .collect()
    }

    /// Listable tags that contain `basename`, in listing order.
    pub fn tags_for(&self, basename: &str, translit: &dyn Transliterator) -> Vec<String> {
        self.sorted_view(translit)
            .into_iter()
            .filter(|t| self.has_member(&t.name, basename))
            .map(|t| t.name)
            .collect()
    }

    /// Every listable tag paired with whether `basename` carries it.
    pub fn tag_states(&self, basename: &str, translit: &dyn Transliterator) -> Vec<(String, bool)> {
        self.sorted_view(translit)
            .into_iter()
            .map(|t| {
                let has = self.has_member(&t.name, basename);
                (t.name, has)
            })
            .collect()
    }

    /// Members matching all (`And`) or any (`Or`) of `tags`.
    pub fn select(&self, op: TagFilter, tags: &[String]) -> BTreeSet<String> {
        let Some((first, rest)) = tags.split_first() else {
            return BTreeSet::new();
        };
        let lookup = |t: &String| self.tags.get(t).cloned().unwrap_or_default();
        match op {
            TagFilter::And => rest
                .iter()
                .fold(lookup(first), |acc, t| &acc & &lookup(t)),
            TagFilter::Or => tags.iter().flat_map(|t| lookup(t)).collect(),
        }
    }

    /// Decodes any supported snapshot shape, dropping tags with whitespace in
    /// the name or no members and normalizing separators in member names.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        let (raw, hidden, recent) = match serde_json::from_slice::<TagSnapshot>(bytes)? {
            TagSnapshot::Full(t, h, r) => (t, h, r),
            TagSnapshot::WithHidden(t, h) => (t, h, Vec::new()),
            TagSnapshot::Bare(t) => (t, BTreeSet::new(), Vec::new()),
        };
        let tags = raw
            .into_iter()
            .filter(|(name, members)| !name.contains(char::is_whitespace) && !members.is_empty())
            .map(|(name, members)| {
                let members = members.into_iter().map(|m| m.replace('\\', "/")).collect();
                (name, members)
            })
            .collect();
        Ok(Self { tags, hidden, recent })
    }

    /// Reads the tag snapshot. A missing or undecodable file is a `Load` error.
    pub fn read(store: &SnapshotStore) -> crate::Result<Self> {
        let path = store.path_of(TAGS_SNAPSHOT);
        let bytes = std::fs::read(&path)
            .map_err(|e| crate::CatalogError::Load(format!("{}: {}", path.display(), e)))?;
        let index = Self::from_json(&bytes)
            .map_err(|e| crate::CatalogError::Load(format!("{}: {}", path.display(), e)))?;
        info!("loaded {} tag(s) from {}", index.tags.len(), path.display());
        Ok(index)
    }

    /// Loads the tag snapshot, falling back to [`TagIndex::fallback`] on any failure.
    pub fn load(store: &SnapshotStore) -> Self {
        Self::read(store).unwrap_or_else(|e| {
            warn!("can't load saved tags data: {}", e);
            Self::fallback()
        })
    }

    /// Writes the canonical triple plus the dated backup for `today`.
    pub fn save_at(&self, store: &SnapshotStore, today: NaiveDate) -> crate::Result<()> {
        store.write(TAGS_SNAPSHOT, &(&self.tags, &self.hidden, &self.recent))?;
        store.write(&dated_snapshot_name(today), &(&self.tags, &self.hidden))?;
        Ok(())
    }

    pub fn save(&self, store: &SnapshotStore) -> crate::Result<()> {
        self.save_at(store, chrono::Local::now().date_naive())
    }
}

/// Tag names are non-empty and free of whitespace.
pub fn is_valid_tag_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}

pub fn dated_snapshot_name(day: NaiveDate) -> String {
    format!("{}_{}", TAGS_SNAPSHOT, day.format("%Y%m%d"))
}
