//! Cached flat listing of the media tree and the queries served from it.

use crate::collate::Transliterator;
use crate::paths::{basename, slashed, url_basename};
use crate::tags::TagIndex;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::info;
use walkdir::{DirEntry, WalkDir};

pub const MEDIA_EXTS: &[&str] = &["png", "jpg", "jpeg", "gif", "mp4", "webm", "webp", "ogg"];
pub const VIDEO_EXTS: &[&str] = &["mp4", "webm", "ogg"];
pub const PREVIEW_DIR: &str = "previews";
pub const PREVIEW_SUFFIX: &str = "preview.mp4";

fn ext_in(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

pub fn is_media(path: &Path) -> bool {
    ext_in(path, MEDIA_EXTS)
}

pub fn is_video(path: &Path) -> bool {
    ext_in(path, VIDEO_EXTS)
}

/// `<dir>/previews/<stem> preview<.ext>` for a media file.
pub fn preview_path(file: &Path) -> PathBuf {
    let dir = file.parent().unwrap_or_else(|| Path::new(""));
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = file
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    dir.join(PREVIEW_DIR).join(format!("{} preview{}", stem, ext))
}

/// The preview when one was generated, else the file itself.
pub fn preview_or_self(file: &Path) -> PathBuf {
    let preview = preview_path(file);
    if preview.is_file() {
        preview
    } else {
        file.to_path_buf()
    }
}

fn in_previews(path: &str) -> bool {
    Path::new(path)
        .components()
        .any(|c| matches!(c, Component::Normal(s) if s == PREVIEW_DIR))
}

pub fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat)?);
    }
    Ok(builder.build()?)
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

/// Flat media listing under `root`, built on first use and kept until
/// [`MediaCatalog::invalidate`] is called.
#[derive(Debug, Clone)]
pub struct MediaCatalog {
    root: PathBuf,
    exclude: GlobSet,
    media: Vec<String>,
    videos: Vec<String>,
}

impl MediaCatalog {
    pub fn new(root: impl Into<PathBuf>, exclude: GlobSet) -> Self {
        Self {
            root: root.into(),
            exclude,
            media: Vec::new(),
            videos: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_cached(&self) -> bool {
        !self.media.is_empty()
    }

    pub fn invalidate(&mut self) {
        self.media.clear();
        self.videos.clear();
    }

    /// Every media file under the root as a slashed path. Traversal order is
    /// whatever the filesystem yields.
    pub fn all_media(&mut self) -> &[String] {
        if self.media.is_empty() {
            info!("caching all media files from {}", self.root.display());
            let exclude = &self.exclude;
            self.media = WalkDir::new(&self.root)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| !is_hidden_dir(e) && !exclude.is_match(e.path()))
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file() && is_media(e.path()))
                .map(|e| slashed(e.path()))
                .collect();
            info!("total {} media files cached", self.media.len());
        }
        &self.media
    }

    /// Video subset of [`MediaCatalog::all_media`], never including generated previews.
    pub fn all_videos(&mut self) -> &[String] {
        if self.videos.is_empty() {
            let videos: Vec<String> = self
                .all_media()
                .iter()
                .filter(|f| is_video(Path::new(f)) && !in_previews(f))
                .cloned()
                .collect();
            self.videos = videos;
        }
        &self.videos
    }

    /// Basenames of media whose name, or transliterated path, contains any
    /// keyword (case-insensitive). An empty keyword matches everything.
    pub fn search(&mut self, keywords: &[String], translit: &dyn Transliterator) -> Vec<String> {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        self.all_media()
            .iter()
            .filter_map(|file| {
                let name = basename(Path::new(file));
                let lower = name.to_lowercase();
                let path_key = translit.transliterate(file).to_lowercase();
                let hit = keywords
                    .iter()
                    .any(|k| lower.contains(k.as_str()) || path_key.contains(k.as_str()));
                (hit && !name.ends_with(PREVIEW_SUFFIX)).then_some(name)
            })
            .collect()
    }
}

/// Drops items (paths, URLs or basenames) that belong to a hidden tag.
pub fn filter_hidden(items: &[String], tags: &TagIndex) -> Vec<String> {
    items
        .iter()
        .filter(|item| !tags.is_hidden_member(url_basename(item), None))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collate::TableTransliterator;
    use crate::tags::TagMap;
    use std::collections::BTreeSet;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn catalog(root: &Path) -> MediaCatalog {
        MediaCatalog::new(root, GlobSet::empty())
    }

    #[test]
    fn all_media_walks_recursively_and_caches() {
        let temp = tempfile::tempdir().unwrap();
        touch(&temp.path().join("a.jpg"));
        touch(&temp.path().join("sub/deeper/b.MP4"));
        touch(&temp.path().join("notes.txt"));
        touch(&temp.path().join(".database/tags.json"));

        let mut cat = catalog(temp.path());
        let mut found: Vec<String> = cat.all_media().iter().map(|p| url_basename(p).to_string()).collect();
        found.sort();
        assert_eq!(found, vec!["a.jpg", "b.MP4"]);

        touch(&temp.path().join("c.png"));
        assert_eq!(cat.all_media().len(), 2);
        cat.invalidate();
        assert_eq!(cat.all_media().len(), 3);
    }

    #[test]
    fn exclude_patterns_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        touch(&temp.path().join("keep/a.jpg"));
        touch(&temp.path().join("skip/b.jpg"));
        let pattern = format!("{}/skip", slashed(temp.path()));
        let mut cat = MediaCatalog::new(temp.path(), build_globset(&[pattern]).unwrap());
        assert_eq!(cat.all_media().len(), 1);
    }

    #[test]
    fn videos_exclude_previews() {
        let temp = tempfile::tempdir().unwrap();
        touch(&temp.path().join("clip.mp4"));
        touch(&temp.path().join("clip.webm"));
        touch(&temp.path().join("photo.jpg"));
        touch(&temp.path().join("previews/clip preview.mp4"));
        let mut cat = catalog(temp.path());
        let mut videos: Vec<&str> = cat.all_videos().iter().map(|v| url_basename(v)).collect();
        videos.sort();
        assert_eq!(videos, vec!["clip.mp4", "clip.webm"]);
    }

    #[test]
    fn search_matches_names_case_insensitively() {
        let temp = tempfile::tempdir().unwrap();
        touch(&temp.path().join("cat_photo.jpg"));
        touch(&temp.path().join("dog.jpg"));
        touch(&temp.path().join("previews/cat preview.mp4"));
        let mut cat = catalog(temp.path());
        let t = TableTransliterator::default();
        assert_eq!(cat.search(&["CAT".into()], &t), vec!["cat_photo.jpg"]);
        assert!(cat.search(&[], &t).is_empty());
        assert!(cat.search(&["zebra".into()], &t).is_empty());
        assert_eq!(cat.search(&[String::new()], &t).len(), 2);
    }

    #[test]
    fn search_uses_transliterated_path() {
        let temp = tempfile::tempdir().unwrap();
        touch(&temp.path().join("猫/1.jpg"));
        let mut cat = catalog(temp.path());
        let t = TableTransliterator::new(
            std::collections::HashMap::from([('猫', "mao".to_string())]),
            Default::default(),
        );
        assert_eq!(cat.search(&["mao".into()], &t), vec!["1.jpg"]);
    }

    #[test]
    fn preview_path_layout() {
        let p = preview_path(Path::new("/m/trip/clip.mp4"));
        assert_eq!(p, PathBuf::from("/m/trip/previews/clip preview.mp4"));
        assert_eq!(preview_or_self(Path::new("/m/none.mp4")), PathBuf::from("/m/none.mp4"));
    }

    #[test]
    fn hidden_members_are_filtered() {
        let map: TagMap = [("private".to_string(), BTreeSet::from(["b.jpg".to_string()]))].into();
        let mut tags = TagIndex::new(map);
        tags.toggle_hidden(&["private".into()]);
        let items = vec!["/static/a.jpg".to_string(), "/static/x/b.jpg".to_string(), "b.jpg".to_string()];
        assert_eq!(filter_hidden(&items, &tags), vec!["/static/a.jpg"]);
    }
}
