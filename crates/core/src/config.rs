use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_MEDIA_URL: &str = "static";
pub const TRASH_DIR: &str = "deleted";
pub const DB_DIR: &str = ".database";

/// Keys accepted in `config.json` (and as `GALLERY_*` environment variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default, alias = "MEDIA_PATH")]
    pub media_path: Option<String>,
    #[serde(default, alias = "ASSET_PATH")]
    pub asset_path: Option<String>,
    #[serde(default, alias = "MEDIA_URL")]
    pub media_url: Option<String>,
    #[serde(default, alias = "SCAN_EXCLUDE")]
    pub scan_exclude: Vec<String>,
    #[serde(default, alias = "PINYIN_TABLE")]
    pub pinyin_table: Option<String>,
}

/// Resolved locations the catalog works with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub media_path: PathBuf,
    pub asset_path: PathBuf,
    pub media_url: String,
    pub trash_dir: PathBuf,
    pub db_dir: PathBuf,
    pub scan_exclude: Vec<String>,
    pub pinyin_table: Option<PathBuf>,
}

/// Reads `<root>/config.json` plus `GALLERY_*` overrides. A broken file is
/// reported and treated as empty.
pub fn load_file(root: &Path) -> FileConfig {
    let settings = config::Config::builder()
        .add_source(
            File::from(root.join(CONFIG_FILE))
                .format(FileFormat::Json)
                .required(false),
        )
        .add_source(Environment::with_prefix("GALLERY"))
        .build()
        .and_then(|c| c.try_deserialize::<FileConfig>());
    match settings {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("error loading config: {}", e);
            FileConfig::default()
        }
    }
}

fn absolute_under(root: &Path, p: &str) -> PathBuf {
    let p = Path::new(p);
    let joined = if p.is_absolute() { p.to_path_buf() } else { root.join(p) };
    crate::paths::normalize(&joined)
}

impl Settings {
    pub fn from_file(root: &Path, file: FileConfig) -> Self {
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        let media_path = file
            .media_path
            .as_deref()
            .map(|p| absolute_under(&root, p))
            .unwrap_or_else(|| root.join("static"));
        let asset_path = file
            .asset_path
            .as_deref()
            .map(|p| absolute_under(&root, p))
            .unwrap_or_else(|| root.join("assets"));
        let media_url = file
            .media_url
            .map(|u| u.trim_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_MEDIA_URL.to_string());
        Self {
            trash_dir: media_path.join(TRASH_DIR),
            db_dir: media_path.join(DB_DIR),
            pinyin_table: file.pinyin_table.as_deref().map(|p| absolute_under(&root, p)),
            scan_exclude: file.scan_exclude,
            media_path,
            asset_path,
            media_url,
            root,
        }
    }

    /// Convenience for tests and embedding: everything derived from a media root.
    pub fn for_media_root(media_path: &Path) -> Self {
        let file = FileConfig {
            media_path: Some(media_path.to_string_lossy().into_owned()),
            ..FileConfig::default()
        };
        Self::from_file(media_path, file)
    }
}

pub fn load(root: &Path) -> Settings {
    Settings::from_file(root, load_file(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let temp = tempfile::tempdir().unwrap();
        let s = load(temp.path());
        assert_eq!(s.media_path, temp.path().join("static"));
        assert_eq!(s.asset_path, temp.path().join("assets"));
        assert_eq!(s.media_url, "static");
        assert_eq!(s.trash_dir, temp.path().join("static").join("deleted"));
        assert_eq!(s.db_dir, temp.path().join("static").join(".database"));
    }

    #[test]
    fn reads_upper_case_keys() {
        let temp = tempfile::tempdir().unwrap();
        let media = temp.path().join("media");
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            format!(
                r#"{{"MEDIA_PATH": "{}", "MEDIA_URL": "/files/", "ASSET_PATH": "a"}}"#,
                media.to_string_lossy().replace('\\', "/")
            ),
        )
        .unwrap();
        let s = load(temp.path());
        assert_eq!(s.media_path, media);
        assert_eq!(s.media_url, "files");
        assert_eq!(s.asset_path, temp.path().join("a"));
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "invalid json {").unwrap();
        let s = load(temp.path());
        assert_eq!(s.media_path, temp.path().join("static"));
    }
}
