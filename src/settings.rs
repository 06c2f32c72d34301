//! Display preferences persisted between runs.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub font_size: FontSize,
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "theme: {:?}, font size: {:?}", self.theme, self.font_size)
    }
}

/// Missing or unreadable files fall back to defaults.
pub fn load(path: &Path) -> Settings {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Settings::default(),
    };
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        warn!("Ignoring unreadable settings in {}: {}", path.display(), e);
        Settings::default()
    })
}

pub fn save(path: &Path, settings: &Settings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to save settings to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load(&dir.path().join("settings.json"));
        assert_eq!(s, Settings::default());
        assert_eq!(s.theme, Theme::Light);
        assert_eq!(s.font_size, FontSize::Medium);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let s = Settings {
            theme: Theme::Dark,
            font_size: FontSize::Large,
        };
        save(&path, &s).unwrap();
        assert_eq!(load(&path), s);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"dark\""));
    }

    #[test]
    fn test_corrupt_or_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(load(&path), Settings::default());

        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();
        assert_eq!(
            load(&path),
            Settings {
                theme: Theme::Dark,
                font_size: FontSize::Medium
            }
        );
    }
}
