use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const SETTINGS_FILE: &str = "settings.json";

/// Persistent user settings, stored as JSON in the platform config dir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Explicit yt-dlp executable; wins over the bundled copy and `PATH`
    pub ytdlp_path: Option<PathBuf>,
    /// Folder chosen in the previous session
    pub last_folder: Option<PathBuf>,
    /// Selector used when the user confirms without a resolvable format
    pub default_format: String,
    pub merge_output_format: String,
    pub concurrent_fragments: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            last_folder: None,
            default_format: "bestvideo+bestaudio/best".to_string(),
            merge_output_format: "mp4".to_string(),
            concurrent_fragments: 10,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "ytgrab", "ytgrab").map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// Loads from `path`, falling back to defaults when the file is absent or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(Some(cfg)) => cfg,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        let cfg = serde_json::from_str(&raw)?;
        Ok(Some(cfg))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| AppError::Config(format!("no parent directory for {}", path.display())))?;
        fs::create_dir_all(parent)?;
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.default_format, "bestvideo+bestaudio/best");
        assert_eq!(cfg.merge_output_format, "mp4");
        assert_eq!(cfg.concurrent_fragments, 10);
        assert!(cfg.ytdlp_path.is_none());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert!(AppConfig::load(&path).unwrap().is_none());
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let cfg = AppConfig {
            last_folder: Some(PathBuf::from("/tmp/out")),
            concurrent_fragments: 4,
            ..AppConfig::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), Some(cfg));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{ "merge_output_format": "mkv" }"#).unwrap();
        let cfg = AppConfig::load_or_default(&path);
        assert_eq!(cfg.merge_output_format, "mkv");
        assert_eq!(cfg.concurrent_fragments, 10);
    }

    #[test]
    fn corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load(&path).is_err());
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
    }
}
