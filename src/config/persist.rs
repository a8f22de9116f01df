//! Persisted key-value store (§6 "Persisted state").
//!
//! The original keeps this in the Windows registry (`HKCU\Software\
//! gimy.net\yamy`) or a local INI file. This is a cross-platform target, so
//! it is a single TOML file under the OS config directory
//! (`dirs::config_dir`) instead.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("could not resolve config directory")]
    NoConfigDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml decode error: {0}")]
    Decode(#[from] toml::de::Error),
    #[error("toml encode error: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// One `.mayuN` entry: a named, path-addressed configuration with its
/// `-D` symbol list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingEntry {
    pub name: String,
    pub path: String,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogFont {
    pub face_name: String,
    pub point_size: u32,
}

impl Default for LogFont {
    fn default() -> Self {
        LogFont {
            face_name: "monospace".to_string(),
            point_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedState {
    #[serde(default)]
    pub settings: Vec<SettingEntry>,
    #[serde(default)]
    pub active_index: Option<usize>,
    #[serde(default)]
    pub log_font: LogFont,
    #[serde(default)]
    pub escape_nls_keys: i32,
}

impl Default for PersistedState {
    fn default() -> Self {
        PersistedState {
            settings: Vec::new(),
            active_index: None,
            log_font: LogFont::default(),
            escape_nls_keys: 0,
        }
    }
}

impl PersistedState {
    pub fn active_entry(&self) -> Option<&SettingEntry> {
        self.active_index.and_then(|i| self.settings.get(i))
    }

    pub fn load(path: &Path) -> Result<PersistedState, PersistError> {
        if !path.exists() {
            return Ok(PersistedState::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Resolves the default persisted-state file path: `<config dir>/yamy/state.toml`.
pub fn default_state_path() -> Result<PathBuf, PersistError> {
    let dir = dirs::config_dir().ok_or(PersistError::NoConfigDir)?;
    Ok(dir.join("yamy").join("state.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let state = PersistedState {
            settings: vec![SettingEntry {
                name: "default".into(),
                path: "/home/user/.yamyrc".into(),
                symbols: vec!["LAPTOP".into()],
            }],
            active_index: Some(0),
            log_font: LogFont::default(),
            escape_nls_keys: 1,
        };
        let dir = std::env::temp_dir().join(format!("yamy-persist-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.toml");
        state.save(&path).unwrap();
        let loaded = PersistedState::load(&path).unwrap();
        assert_eq!(state, loaded);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_yields_default() {
        let path = std::env::temp_dir().join("yamy-persist-does-not-exist.toml");
        let loaded = PersistedState::load(&path).unwrap();
        assert_eq!(loaded, PersistedState::default());
    }
}
