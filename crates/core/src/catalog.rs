//! The catalog context: tag index, clip store and media listing kept
//! consistent with the filesystem, constructed once and flushed on close.

use crate::clips::{ClipEntry, ClipStore};
use crate::collate::{natural_cmp, TableTransliterator, Transliterator};
use crate::config::Settings;
use crate::error::{CatalogError, OpReport, Result};
use crate::media::{self, build_globset, filter_hidden, preview_or_self, MediaCatalog};
use crate::operations::{self, BatchTarget, DeleteOutcome, MoveReport};
use crate::paths::{basename, normalize, url_basename, PathMapper};
use crate::tags::{TagFilter, TagIndex, TagListing, TAGS_SNAPSHOT};
use globset::GlobSet;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use storage::SnapshotStore;
use tracing::{info, warn};

/// Context under which listing hidden tags are not filtered at all.
pub const HIDDEN_CONTEXT: &str = "hidden";

/// One media item prepared for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaEntry {
    pub name: String,
    pub url: String,
    pub preview_url: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryPage {
    pub directories: Vec<String>,
    pub media: Vec<MediaEntry>,
    pub breadcrumbs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenamedMedia {
    pub url: String,
    pub name: String,
    pub transliteration: String,
    pub warnings: Vec<String>,
}

pub struct Catalog {
    settings: Settings,
    mapper: PathMapper,
    store: SnapshotStore,
    tags: TagIndex,
    clips: ClipStore,
    media: MediaCatalog,
    clipboard: Vec<String>,
    translit: Box<dyn Transliterator>,
}

impl Catalog {
    /// Loads persisted state for `settings`, recovering to defaults when a
    /// snapshot is missing or unreadable, and writes initial snapshots.
    pub fn open(settings: Settings) -> Result<Self> {
        fs::create_dir_all(&settings.trash_dir).map_err(|e| CatalogError::io(&settings.trash_dir, e))?;
        let store = SnapshotStore::open(&settings.db_dir)?;
        let mapper = PathMapper::new(&settings.media_path, &settings.media_url, &settings.trash_dir);
        let exclude = build_globset(&settings.scan_exclude).unwrap_or_else(|e| {
            warn!("ignoring scan excludes: {}", e);
            GlobSet::empty()
        });
        let translit: Box<dyn Transliterator> = match &settings.pinyin_table {
            Some(path) => Box::new(TableTransliterator::load(path)),
            None => Box::new(TableTransliterator::default()),
        };

        let tags = TagIndex::load(&store);
        let clips = ClipStore::load(&store);
        if !store.exists(TAGS_SNAPSHOT) {
            tags.save(&store)?;
        }
        if !store.exists(crate::clips::CLIPS_SNAPSHOT) {
            clips.save(&store)?;
        }
        info!("catalog opened at {}", settings.media_path.display());

        Ok(Self {
            media: MediaCatalog::new(mapper.media_root(), exclude),
            settings,
            mapper,
            store,
            tags,
            clips,
            clipboard: Vec::new(),
            translit,
        })
    }

    pub fn with_transliterator(mut self, translit: Box<dyn Transliterator>) -> Self {
        self.translit = translit;
        self
    }

    /// Flushes both persisted units.
    pub fn close(self) -> Result<()> {
        self.save_tags()?;
        self.save_clips()?;
        info!("catalog closed");
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    pub fn tags(&self) -> &TagIndex {
        &self.tags
    }

    pub fn clips(&self) -> &ClipStore {
        &self.clips
    }

    pub fn translit(&self) -> &dyn Transliterator {
        self.translit.as_ref()
    }

    pub fn clipboard(&self) -> &[String] {
        &self.clipboard
    }

    pub fn save_tags(&self) -> Result<()> {
        self.tags.save(&self.store)
    }

    pub fn save_clips(&self) -> Result<()> {
        self.clips.save(&self.store)
    }

    pub fn invalidate_media(&mut self) {
        self.media.invalidate();
    }

    // ---- tags ----

    pub fn sorted_tags(&self) -> Vec<TagListing> {
        self.tags.sorted_view(self.translit.as_ref())
    }

    /// Adds `tags` to every media item (URL or basename). Persists only on change.
    pub fn tag_media(&mut self, medias: &[String], tags: &[String]) -> Result<bool> {
        let mut changed = false;
        for media in medias {
            changed |= self.tags.add_tags_to_media(url_basename(media), tags, false);
        }
        if changed {
            self.save_tags()?;
        }
        Ok(changed)
    }

    pub fn tag_states(&self, media: &str) -> Vec<(String, bool)> {
        self.tags.tag_states(url_basename(media), self.translit.as_ref())
    }

    pub fn toggle_hidden(&mut self, names: &[String]) -> Result<()> {
        self.tags.toggle_hidden(names);
        self.save_tags()
    }

    /// Media carrying `tag`, or `None` for an unknown tag.
    pub fn tag_page(&mut self, tag: &str) -> Option<Vec<MediaEntry>> {
        let members = self.tags.members(tag)?.clone();
        Some(self.media_page(&members, tag))
    }

    pub fn filter_by_tags(&mut self, op: TagFilter, names: &[String]) -> Vec<MediaEntry> {
        let members = self.tags.select(op, names);
        let label = match op {
            TagFilter::And => "and",
            TagFilter::Or => "or",
        };
        info!("{} medias in {} filter result", members.len(), label);
        self.media_page(&members, &format!("{}({})", label, names.join(",")))
    }

    /// The tag-listing flavour of merge: fold `names` into `new_name`.
    pub fn merge_listed_tags(&mut self, names: &[String], new_name: &str) -> Result<()> {
        operations::merge_listed_tags(names, new_name, &mut self.tags)?;
        self.save_tags()
    }

    // ---- clips ----

    pub fn clips_for(&self, key: &str) -> &[ClipEntry] {
        self.clips.get_clips(key)
    }

    pub fn set_clips(&mut self, key: &str, clips: Vec<ClipEntry>) -> Result<()> {
        info!("saving {} clip(s) for {}", clips.len(), key);
        self.clips.set_clips(key, clips);
        self.save_clips()
    }

    // ---- file operations ----

    /// Renames the media at `url`, cascading to previews, tags and clips.
    pub fn rename(&mut self, url: &str, new_name: &str) -> Result<RenamedMedia> {
        let path = self.mapper.resolve(url)?;
        if !path.exists() {
            return Err(CatalogError::NotFound(url.to_string()));
        }
        let outcome =
            operations::rename_file(&path, new_name, &mut self.tags, &mut self.clips, &self.mapper)?;
        self.media.invalidate();
        self.save_tags()?;
        self.save_clips()?;
        Ok(RenamedMedia {
            url: self.mapper.to_url(&outcome.new_path),
            transliteration: self.translit.transliterate(&outcome.new_name),
            name: outcome.new_name,
            warnings: outcome.warnings,
        })
    }

    /// Batch rename. From the tag listing this merges the tags into
    /// `pattern`; for media every `#` in `pattern` is replaced by the old
    /// file name, and directories are renamed to `pattern` as is.
    pub fn rename_multiple(&mut self, target: BatchTarget, items: &[String], pattern: &str) -> OpReport {
        let mut report = OpReport::default();
        if target == BatchTarget::Tags {
            let res = self.merge_listed_tags(items, pattern);
            report.record(pattern, res);
            return report;
        }

        for item in items {
            let Some(path) = report.record(item, self.mapper.resolve(item)) else {
                continue;
            };
            if path.is_file() {
                let new_name = pattern.replace('#', &basename(&path));
                let res = operations::rename_file(
                    &path,
                    &new_name,
                    &mut self.tags,
                    &mut self.clips,
                    &self.mapper,
                );
                if let Some(outcome) = report.record(item, res) {
                    report.warnings.extend(outcome.warnings);
                }
            } else if path.is_dir() {
                let res = operations::rename_directory(&path, pattern, &mut self.clips, &self.mapper);
                report.record(item, res);
            } else {
                report.fail(item, CatalogError::NotFound(item.clone()));
            }
        }
        self.media.invalidate();
        let saved = self.save_tags().and_then(|()| self.save_clips());
        report.record("snapshot", saved);
        report
    }

    /// Deletes the media at `url` (trash first, permanently from the trash).
    pub fn delete(&mut self, url: &str) -> Result<DeleteOutcome> {
        let source = self.mapper.resolve(url)?;
        let was_dir = source.is_dir();
        let old_url = self.mapper.to_url(&source);
        let old_name = url_basename(&old_url).to_string();
        let outcome = operations::delete_file(url, &self.mapper)?;
        self.media.invalidate();
        match &outcome {
            DeleteOutcome::Trashed(dest) => {
                let new_url = self.mapper.to_url(dest);
                if was_dir {
                    self.clips.rekey_prefix(&old_url, &new_url);
                } else {
                    self.clips.rekey(&old_url, &new_url);
                }
                let new_name = basename(dest);
                if new_name != old_name && !self.basename_in_catalog(&old_name) {
                    self.tags.rename_member(&old_name, &new_name);
                }
            }
            DeleteOutcome::Removed if was_dir => {
                self.clips.remove_prefix(&old_url);
            }
            DeleteOutcome::Removed => {
                self.clips.remove(&old_url);
                if !self.basename_in_catalog(&old_name) {
                    self.tags.remove_member(&old_name);
                }
            }
        }
        self.save_tags()?;
        self.save_clips()?;
        Ok(outcome)
    }

    /// Batch delete. From the tag listing this removes the tags themselves.
    pub fn delete_multiple(&mut self, target: BatchTarget, items: &[String]) -> OpReport {
        let mut report = OpReport::default();
        match target {
            BatchTarget::Tags => {
                let removed = self.tags.remove_tags(items);
                info!("removed {} tag(s)", removed);
                report.record("tags", self.save_tags());
            }
            BatchTarget::Media => {
                for item in items {
                    let res = self.delete(item);
                    report.record(item, res);
                }
            }
        }
        report
    }

    /// Moves items under `<media root>/<destination>`, re-pointing clip keys.
    pub fn move_items(&mut self, items: &[String], destination: &str) -> OpReport {
        let MoveReport { mut report, moved } = match operations::move_items(items, destination, &self.mapper) {
            Ok(r) => r,
            Err(e) => {
                let mut report = OpReport::default();
                report.fail(destination, e);
                return report;
            }
        };
        for (from, to) in &moved {
            let (old_url, new_url) = (self.mapper.to_url(from), self.mapper.to_url(to));
            if to.is_dir() {
                self.clips.rekey_prefix(&old_url, &new_url);
            } else {
                self.clips.rekey(&old_url, &new_url);
            }
        }
        self.media.invalidate();
        report.record("clips", self.save_clips());
        report
    }

    pub fn cut(&mut self, items: Vec<String>) {
        self.clipboard = items;
    }

    /// Moves the clipboard to `destination`; the clipboard is emptied either way.
    pub fn paste(&mut self, destination: &str) -> OpReport {
        let items = std::mem::take(&mut self.clipboard);
        self.move_items(&items, destination)
    }

    fn basename_in_catalog(&mut self, name: &str) -> bool {
        let trash = self.mapper.trash_root().to_path_buf();
        self.media
            .all_media()
            .iter()
            .any(|f| url_basename(f) == name && !normalize(Path::new(f)).starts_with(&trash))
    }

    // ---- listings ----

    fn entry_for(&self, path: &Path) -> MediaEntry {
        let name = basename(path);
        MediaEntry {
            url: self.mapper.to_url(path),
            preview_url: self.mapper.to_url(&preview_or_self(path)),
            tags: self.tags.tags_for(&name, self.translit.as_ref()),
            name,
        }
    }

    /// Contents of the directory at `subpath` below the media root.
    pub fn browse(&mut self, subpath: &str) -> Result<DirectoryPage> {
        let subpath = subpath.trim_matches('/');
        let dir = normalize(&self.mapper.media_root().join(subpath));
        if !self.mapper.contains(&dir) {
            return Err(CatalogError::InvalidLocation(subpath.to_string()));
        }
        if !dir.is_dir() {
            return Err(CatalogError::NotFound(subpath.to_string()));
        }
        let mut directories = Vec::new();
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| CatalogError::io(&dir, e))? {
            let entry = entry.map_err(|e| CatalogError::io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if path.is_dir() {
                if !name.starts_with('.') {
                    directories.push(name);
                }
            } else if media::is_media(&path) {
                files.push(name);
            }
        }
        directories.sort_by(|a, b| natural_cmp(a, b));
        files.sort_by(|a, b| natural_cmp(a, b));
        let media = filter_hidden(&files, &self.tags)
            .iter()
            .map(|name| self.entry_for(&dir.join(name)))
            .collect();
        Ok(DirectoryPage {
            directories,
            media,
            breadcrumbs: subpath.split('/').filter(|s| !s.is_empty()).map(String::from).collect(),
        })
    }

    /// Resolves basenames to cataloged files outside the trash, applies
    /// hidden-tag filtering (sparing the tag named by `context`) and orders
    /// them by transliterated name.
    pub fn media_page(&mut self, basenames: &BTreeSet<String>, context: &str) -> Vec<MediaEntry> {
        let trash = self.mapper.trash_root().to_path_buf();
        let located: HashMap<String, PathBuf> = self
            .media
            .all_media()
            .iter()
            .map(|f| normalize(Path::new(f)))
            .filter(|p| !p.starts_with(&trash))
            .map(|p| (basename(&p), p))
            .collect();

        let mut found: Vec<(String, &PathBuf)> = basenames
            .iter()
            .filter_map(|name| located.get(name).map(|p| (name, p)))
            .filter(|(_, p)| p.is_file())
            .filter(|(name, _)| context == HIDDEN_CONTEXT || !self.tags.is_hidden_member(name, Some(context)))
            .map(|(name, p)| (self.translit.sort_key(name), p))
            .collect();
        found.sort();
        found.into_iter().map(|(_, p)| self.entry_for(p)).collect()
    }

    pub fn search(&mut self, keywords: &[String]) -> Vec<MediaEntry> {
        let hits: BTreeSet<String> = self.media.search(keywords, self.translit.as_ref()).into_iter().collect();
        self.media_page(&hits, "search")
    }

    /// Visible media, at most `limit` entries.
    pub fn all_media_page(&mut self, limit: usize) -> Vec<MediaEntry> {
        let visible = filter_hidden(self.media.all_media(), &self.tags);
        visible.iter().take(limit).map(|f| self.entry_for(Path::new(f))).collect()
    }

    /// Visible primary videos, at most `limit` entries.
    pub fn all_videos_page(&mut self, limit: usize) -> Vec<MediaEntry> {
        let visible = filter_hidden(self.media.all_videos(), &self.tags);
        visible.iter().take(limit).map(|f| self.entry_for(Path::new(f))).collect()
    }
}

/// A catalog shared between threads. Each call to [`SharedCatalog::with`]
/// is one critical section over tags, clips and the media cache.
#[derive(Clone)]
pub struct SharedCatalog {
    inner: Arc<Mutex<Catalog>>,
}

impl SharedCatalog {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            inner: Arc::new(Mutex::new(catalog)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Catalog) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
