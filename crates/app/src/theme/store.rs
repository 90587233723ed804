use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::settings::config::config_dir;
use crate::theme::state::ThemePreference;

pub const PREFERENCES_FILE_NAME: &str = "preferences.json";

/// Everything Quill remembers between launches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: ThemePreference,
}

pub struct PreferenceStore {
    preferences: Arc<ArcSwap<Preferences>>,
    path: PathBuf,
}

impl PreferenceStore {
    pub fn default_path() -> PathBuf {
        config_dir().join(PREFERENCES_FILE_NAME)
    }

    pub fn new(path: PathBuf) -> Self {
        let preferences = Self::load_from_disk(&path);
        Self {
            preferences: Arc::new(ArcSwap::from_pointee(preferences)),
            path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn theme(&self) -> ThemePreference {
        self.preferences.load().theme
    }

    /// Updates the in-memory preference, then persists it.
    ///
    /// Memory is updated even if the write fails so the UI stays consistent
    /// for the rest of the run.
    pub fn set_theme(&self, theme: ThemePreference) -> Result<(), PreferencesError> {
        let next = Preferences { theme };
        self.preferences.store(Arc::new(next));
        self.persist(&next)
    }

    fn load_from_disk(path: &Path) -> Preferences {
        if !path.exists() {
            tracing::info!(path = %path.display(), "preferences file not found, using defaults");
            return Preferences::default();
        }

        let figment =
            Figment::from(Serialized::defaults(Preferences::default())).merge(Json::file(path));

        match figment.extract::<Preferences>() {
            Ok(preferences) => preferences,
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "failed to parse preferences, using defaults"
                );
                Preferences::default()
            }
        }
    }

    fn persist(&self, preferences: &Preferences) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-preferences-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(preferences).context(SerializeSnafu {
            stage: "serialize-preferences-json",
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-preferences-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.path).context(RenameTempFileSnafu {
            stage: "rename-temporary-preferences-file",
            from: temp_path,
            to: self.path.clone(),
        })?;

        tracing::debug!(path = %self.path.display(), "saved preferences");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PreferencesError {
    #[snafu(display("failed to create preferences directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize preferences on `{stage}`: {source}"))]
    Serialize {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write preferences file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace preferences file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_defaults_to_system() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join(PREFERENCES_FILE_NAME));
        assert_eq!(store.theme(), ThemePreference::System);
    }

    #[test]
    fn theme_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(PREFERENCES_FILE_NAME);

        let store = PreferenceStore::new(path.clone());
        store.set_theme(ThemePreference::Dark).unwrap();
        assert_eq!(store.theme(), ThemePreference::Dark);

        let written = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value, serde_json::json!({"theme": "dark"}));
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = PreferenceStore::new(path);
        assert_eq!(reopened.theme(), ThemePreference::Dark);
    }

    #[test]
    fn unreadable_file_falls_back_to_system() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFERENCES_FILE_NAME);
        std::fs::write(&path, r#"{"theme": "sepia"}"#).unwrap();

        let store = PreferenceStore::new(path);
        assert_eq!(store.theme(), ThemePreference::System);
    }

    #[test]
    fn failed_write_still_updates_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, "file").unwrap();

        let store = PreferenceStore::new(blocker.join(PREFERENCES_FILE_NAME));
        let error = store.set_theme(ThemePreference::Light).unwrap_err();

        assert!(matches!(error, PreferencesError::CreateDir { .. }));
        assert_eq!(store.theme(), ThemePreference::Light);
    }
}
