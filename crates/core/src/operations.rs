//! Filesystem mutations and the index cascades that must follow them.

use crate::clips::ClipStore;
use crate::error::{CatalogError, OpReport, Result};
use crate::media::preview_path;
use crate::paths::{basename, normalize, PathMapper};
use crate::tags::TagIndex;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of a file rename. `warnings` lists cascade steps that failed after
/// the file itself was renamed; those are not rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct RenameOutcome {
    pub new_path: PathBuf,
    pub new_name: String,
    pub retagged: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Trashed(PathBuf),
    Removed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MoveReport {
    pub report: OpReport,
    pub moved: Vec<(PathBuf, PathBuf)>,
}

/// Which listing a batch operation was invoked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchTarget {
    Media,
    Tags,
}

/// Renames the file at `path` to `new_base` (the original extension is
/// appended when missing), then renames its preview, swaps the basename in
/// every tag and re-points its clip entry.
pub fn rename_file(
    path: &Path,
    new_base: &str,
    tags: &mut TagIndex,
    clips: &mut ClipStore,
    mapper: &PathMapper,
) -> Result<RenameOutcome> {
    if !path.is_file() {
        return Err(CatalogError::NotFound(path.display().to_string()));
    }
    check_new_name(new_base)?;
    let old_name = basename(path);
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let new_name = if new_base.ends_with(&ext) {
        new_base.to_string()
    } else {
        format!("{}{}", new_base, ext)
    };
    if new_name.trim() == ext {
        return Err(CatalogError::InvalidName(new_base.to_string()));
    }
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let new_path = dir.join(&new_name);
    if !mapper.contains(&new_path) {
        return Err(CatalogError::InvalidLocation(new_path.display().to_string()));
    }

    let mut outcome = RenameOutcome {
        new_path: new_path.clone(),
        new_name: new_name.clone(),
        retagged: Vec::new(),
        warnings: Vec::new(),
    };
    if new_path == path {
        return Ok(outcome);
    }
    if new_path.exists() {
        return Err(CatalogError::io(
            &new_path,
            io::Error::new(io::ErrorKind::AlreadyExists, "target already exists"),
        ));
    }
    fs::rename(path, &new_path).map_err(|e| CatalogError::io(path, e))?;
    info!("renamed {} -> {}", path.display(), new_path.display());

    let old_preview = preview_path(path);
    if old_preview.is_file() {
        let new_preview = preview_path(&new_path);
        if let Err(e) = fs::rename(&old_preview, &new_preview) {
            warn!("preview rename failed for {}: {}", old_preview.display(), e);
            outcome
                .warnings
                .push(format!("preview {}: {}", old_preview.display(), e));
        }
    }

    outcome.retagged = tags.rename_member(&old_name, &new_name);
    clips.rekey(&mapper.to_url(path), &mapper.to_url(&new_path));
    Ok(outcome)
}

/// Renames a directory in place, re-pointing clip keys beneath it.
pub fn rename_directory(
    path: &Path,
    new_name: &str,
    clips: &mut ClipStore,
    mapper: &PathMapper,
) -> Result<PathBuf> {
    check_new_name(new_name)?;
    let new_path = path.parent().unwrap_or_else(|| Path::new("")).join(new_name);
    if !mapper.contains(&new_path) {
        return Err(CatalogError::InvalidLocation(new_path.display().to_string()));
    }
    fs::rename(path, &new_path).map_err(|e| CatalogError::io(path, e))?;
    clips.rekey_prefix(&mapper.to_url(path), &mapper.to_url(&new_path));
    info!("renamed directory {} -> {}", path.display(), new_path.display());
    Ok(new_path)
}

/// Deletes the media at `url`: outside the trash it is moved into the trash,
/// inside the trash it is removed for good.
pub fn delete_file(url: &str, mapper: &PathMapper) -> Result<DeleteOutcome> {
    let path = mapper.resolve(url)?;
    if path == mapper.media_root() || path == mapper.trash_root() {
        return Err(CatalogError::InvalidLocation(url.to_string()));
    }
    if !path.exists() {
        return Err(CatalogError::NotFound(url.to_string()));
    }

    if mapper.in_trash(&path) {
        let res = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        res.map_err(|e| CatalogError::io(&path, e))?;
        info!("media permanently deleted: {}", path.display());
        return Ok(DeleteOutcome::Removed);
    }

    let trash = mapper.trash_root();
    fs::create_dir_all(trash).map_err(|e| CatalogError::io(trash, e))?;
    let mut dest = trash.join(basename(&path));
    if dest.exists() {
        dest = resolve_conflict(&dest);
    }
    move_path(&path, &dest)?;
    info!("media moved to recycle bin: {}", dest.display());
    Ok(DeleteOutcome::Trashed(dest))
}

/// Moves every existing item into `<media root>/<destination>`, creating it
/// first. Items that no longer exist are skipped.
pub fn move_items(items: &[String], destination: &str, mapper: &PathMapper) -> Result<MoveReport> {
    let dest_dir = normalize(&mapper.media_root().join(destination.trim_matches('/')));
    if !mapper.contains(&dest_dir) {
        return Err(CatalogError::InvalidLocation(destination.to_string()));
    }
    fs::create_dir_all(&dest_dir).map_err(|e| CatalogError::io(&dest_dir, e))?;

    let mut out = MoveReport::default();
    for item in items {
        let Some(src) = out.report.record(item, mapper.resolve(item)) else {
            continue;
        };
        if !src.exists() {
            debug!("skipping vanished item {}", src.display());
            continue;
        }
        let target = dest_dir.join(basename(&src));
        if target == src || dest_dir.starts_with(&src) {
            continue;
        }
        if out.report.record(item, move_path(&src, &target)).is_some() {
            out.moved.push((src, target));
        }
    }
    info!("moved {} item(s) to {}", out.moved.len(), dest_dir.display());
    Ok(out)
}

/// Merges the tags selected in the tag listing into `new_name`.
pub fn merge_listed_tags(names: &[String], new_name: &str, tags: &mut TagIndex) -> Result<()> {
    tags.merge_tags(names, new_name)
}

/// A rename target is a single path segment: not empty, no separators and
/// not `.` or `..`.
fn check_new_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::InvalidName(name.to_string()));
    }
    if name.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
        return Err(CatalogError::InvalidLocation(name.to_string()));
    }
    Ok(())
}

/// Rename, falling back to copy + delete for files when rename fails
/// (e.g. across filesystems).
fn move_path(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if from.is_file() => {
            debug!("rename {} failed ({}), copying instead", from.display(), e);
            fs::copy(from, to).map_err(|e| CatalogError::io(to, e))?;
            fs::remove_file(from).map_err(|e| CatalogError::io(from, e))
        }
        Err(e) => Err(CatalogError::io(from, e)),
    }
}

/// First free `<stem>_<n><.ext>` next to `dest`.
fn resolve_conflict(dest: &Path) -> PathBuf {
    let stem = dest
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file")
        .to_string();
    let ext = dest
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut counter = 1;
    loop {
        let name = if ext.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
