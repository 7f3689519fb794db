// User preferences: a tiny key-value file next to the database.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub fn label(&self) -> &'static str {
        match self {
            ThemeMode::System => "System",
            ThemeMode::Light => "Light",
            ThemeMode::Dark => "Dark",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            ThemeMode::System => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::System,
        }
    }
}

/// Persisted settings. Keys missing from the file fall back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dynamic_color: bool,
    pub theme_mode: ThemeMode,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            dynamic_color: true,
            theme_mode: ThemeMode::System,
        }
    }
}

pub struct PreferencesStore {
    /// None keeps settings in memory only
    path: Option<PathBuf>,
    settings: RwLock<Settings>,
}

impl PreferencesStore {
    /// Load settings from `path`; a missing file means defaults
    pub fn load(path: &Path) -> Result<Self> {
        let settings = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read preferences {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse preferences {}", path.display()))?
        } else {
            debug!(path = %path.display(), "no preferences file, using defaults");
            Settings::default()
        };

        Ok(PreferencesStore {
            path: Some(path.to_path_buf()),
            settings: RwLock::new(settings),
        })
    }

    pub fn in_memory() -> Self {
        PreferencesStore {
            path: None,
            settings: RwLock::new(Settings::default()),
        }
    }

    pub fn settings(&self) -> Settings {
        *self.settings.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_dynamic_color(&self, enabled: bool) -> Result<Settings> {
        self.update(|s| s.dynamic_color = enabled)
    }

    pub fn set_theme_mode(&self, mode: ThemeMode) -> Result<Settings> {
        self.update(|s| s.theme_mode = mode)
    }

    /// Apply `change`, persist, and return the new settings. The in-memory
    /// value is only replaced once the file write succeeded.
    fn update<F>(&self, change: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.settings.write().unwrap_or_else(|e| e.into_inner());
        let mut next = *guard;
        change(&mut next);

        if let Some(path) = &self.path {
            write_atomic(path, &next)?;
        }

        *guard = next;
        info!(dynamic_color = next.dynamic_color, theme = next.theme_mode.label(), "preferences saved");
        Ok(next)
    }
}

fn write_atomic(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace preferences {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let store = PreferencesStore::in_memory();
        let settings = store.settings();
        assert!(settings.dynamic_color);
        assert_eq!(settings.theme_mode, ThemeMode::System);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferencesStore::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(store.settings(), Settings::default());
    }

    #[test]
    fn test_writes_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs").join("settings.json");

        let store = PreferencesStore::load(&path).unwrap();
        store.set_dynamic_color(false).unwrap();
        let saved = store.set_theme_mode(ThemeMode::Dark).unwrap();
        assert!(!saved.dynamic_color);
        assert_eq!(saved.theme_mode, ThemeMode::Dark);

        let reloaded = PreferencesStore::load(&path).unwrap();
        assert_eq!(reloaded.settings(), saved);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_keys_fall_back_independently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "theme_mode": "light" }"#).unwrap();

        let settings = PreferencesStore::load(&path).unwrap().settings();
        assert!(settings.dynamic_color);
        assert_eq!(settings.theme_mode, ThemeMode::Light);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();

        assert!(PreferencesStore::load(&path).is_err());
    }

    #[test]
    fn test_theme_cycle() {
        assert_eq!(ThemeMode::System.next(), ThemeMode::Light);
        assert_eq!(ThemeMode::Light.next(), ThemeMode::Dark);
        assert_eq!(ThemeMode::Dark.next(), ThemeMode::System);
    }
}
