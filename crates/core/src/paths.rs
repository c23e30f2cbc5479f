//! Translation between browsable media URLs and filesystem paths.

use std::path::{Component, Path, PathBuf};

/// Resolves a URL such as `/static/a/b.jpg` under `media_root`.
///
/// Anything not under `/<url_prefix>` is passed through as a plain path and
/// made absolute. That fallback does not validate; callers that care about
/// staying inside the media root must check with [`PathMapper::contains`].
pub fn url_to_fs(url: &str, media_root: &Path, url_prefix: &str) -> PathBuf {
    let p = url.trim_start_matches('/');
    if p.is_empty() || p == url_prefix {
        return media_root.to_path_buf();
    }
    if let Some(rel) = p.strip_prefix(url_prefix).and_then(|r| r.strip_prefix('/')) {
        return media_root.join(rel);
    }
    std::path::absolute(p).unwrap_or_else(|_| PathBuf::from(p))
}

/// Inverse of [`url_to_fs`] for paths under `media_root`.
///
/// A path that cannot be expressed relative to the root degrades to
/// `/<url_prefix>/<basename>`.
pub fn fs_to_url(path: &Path, media_root: &Path, url_prefix: &str) -> String {
    let path = normalize(path);
    let root = normalize(media_root);
    match path.strip_prefix(&root) {
        Ok(rel) if rel.as_os_str().is_empty() => format!("/{}", url_prefix),
        Ok(rel) => format!("/{}/{}", url_prefix, slashed(rel)),
        Err(_) => format!("/{}/{}", url_prefix, basename(&path)),
    }
}

/// Forward-slash rendering of a path regardless of platform.
pub fn slashed(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Last `/`-separated segment of a URL or slashed path.
pub fn url_basename(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

/// Lexically resolves `.` and `..` without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Media root, URL prefix and trash root bundled for the catalog.
#[derive(Debug, Clone)]
pub struct PathMapper {
    media_root: PathBuf,
    url_prefix: String,
    trash_root: PathBuf,
}

impl PathMapper {
    pub fn new(media_root: impl Into<PathBuf>, url_prefix: &str, trash_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: normalize(&media_root.into()),
            url_prefix: url_prefix.trim_matches('/').to_string(),
            trash_root: normalize(&trash_root.into()),
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn trash_root(&self) -> &Path {
        &self.trash_root
    }

    pub fn to_fs(&self, url: &str) -> PathBuf {
        url_to_fs(url, &self.media_root, &self.url_prefix)
    }

    pub fn to_url(&self, path: &Path) -> String {
        fs_to_url(path, &self.media_root, &self.url_prefix)
    }

    /// True when the URL (leading slashes ignored) is the media prefix or lies below it.
    pub fn is_media_url(&self, url: &str) -> bool {
        let p = url.trim_start_matches('/');
        p == self.url_prefix
            || p.strip_prefix(self.url_prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// True when `path` lexically lies inside the media root (the root itself included).
    pub fn contains(&self, path: &Path) -> bool {
        normalize(path).starts_with(&self.media_root)
    }

    pub fn in_trash(&self, path: &Path) -> bool {
        normalize(path).starts_with(&self.trash_root)
    }

    /// Resolves a media URL for a mutating operation, rejecting URLs outside
    /// the prefix and paths that escape the media root.
    pub fn resolve(&self, url: &str) -> crate::Result<PathBuf> {
        if !self.is_media_url(url) {
            return Err(crate::CatalogError::InvalidLocation(url.to_string()));
        }
        let path = normalize(&self.to_fs(url));
        if !self.contains(&path) {
            return Err(crate::CatalogError::InvalidLocation(url.to_string()));
        }
        Ok(path)
    }
}
