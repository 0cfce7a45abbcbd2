/*!
 * Persistent user settings
 *
 * The settings live in a JSON object on disk. Keys keep their historical
 * names so existing files load unchanged; keys this program does not know
 * about survive a rewrite.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ScanConfig, DEFAULT_EXCLUDED_FOLDERS, DEFAULT_EXTENSIONS};
use crate::error::{PromptError, Result};
use crate::types::NetworkCredentials;

/// File name used when no location is given
pub const SETTINGS_FILE_NAME: &str = "config.json";

/// User settings as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Last project folder that was scanned
    #[serde(rename = "ultima_carpeta_codigo", default)]
    pub last_code_folder: String,

    /// Last folder a report was saved to
    #[serde(rename = "ultima_carpeta_guardar", default)]
    pub last_save_folder: String,

    /// Last folder a SQLite file was picked from
    #[serde(rename = "ultima_carpeta_sqlite", default)]
    pub last_sqlite_folder: String,

    /// Selected SQLite file
    #[serde(rename = "sqlite_file", default)]
    pub sqlite_file: String,

    /// Saved MySQL credentials
    #[serde(default)]
    pub mysql: NetworkCredentials,

    #[serde(rename = "extensiones_permitidas", default = "default_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(rename = "carpetas_excluidas", default = "default_excluded")]
    pub excluded_folders: Vec<String>,

    /// Whether front-ends greet the user on start
    #[serde(rename = "mostrar_bienvenida", default = "default_true")]
    pub show_welcome: bool,

    /// Keys this version does not know about
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_excluded() -> Vec<String> {
    DEFAULT_EXCLUDED_FOLDERS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_code_folder: String::new(),
            last_save_folder: String::new(),
            last_sqlite_folder: String::new(),
            sqlite_file: String::new(),
            mysql: NetworkCredentials::default(),
            allowed_extensions: default_extensions(),
            excluded_folders: default_excluded(),
            show_welcome: true,
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Default settings location: `<config dir>/dirprompt/config.json`,
    /// or `./config.json` when the platform has no config folder.
    pub fn default_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("dirprompt").join(SETTINGS_FILE_NAME),
            None => PathBuf::from(SETTINGS_FILE_NAME),
        }
    }

    /// Read settings from `path`.
    ///
    /// A missing file or one that is not a JSON object yields the defaults.
    /// Inside an object, a key whose value has the wrong shape falls back to
    /// its default while every other key, known or not, is kept.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("No settings at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(object)) => Self::from_object(object, path),
            Ok(_) => {
                log::warn!(
                    "Ignoring settings file {}: not a JSON object",
                    path.display()
                );
                Self::default()
            }
            Err(e) => {
                log::warn!(
                    "Ignoring malformed settings file {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn from_object(object: Map<String, Value>, path: &Path) -> Self {
        if let Ok(settings) = serde_json::from_value(Value::Object(object.clone())) {
            return settings;
        }

        let mut settings = Self::default();
        for (key, value) in object {
            let mut patch = Map::new();
            patch.insert(key.clone(), value);
            match settings.merged(&Value::Object(patch)) {
                Ok(next) => settings = next,
                Err(e) => log::warn!(
                    "Resetting settings key {} in {}: {}",
                    key,
                    path.display(),
                    e
                ),
            }
        }
        settings
    }

    /// Read settings from `path`, writing the defaults there first if it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Ok(Self::load(path));
        }
        let settings = Self::default();
        settings.save(path)?;
        log::info!("Created default settings at {}", path.display());
        Ok(settings)
    }

    /// Write settings to `path` as indented JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| PromptError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| PromptError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Settings with the keys of `patch` replaced, as a shallow JSON merge
    pub fn merged(&self, patch: &Value) -> Result<Self> {
        let Value::Object(patch) = patch else {
            return Err(PromptError::Settings(
                "settings update must be a JSON object".to_string(),
            ));
        };
        let Value::Object(mut current) = serde_json::to_value(self)? else {
            return Err(PromptError::Settings(
                "settings did not serialize to an object".to_string(),
            ));
        };
        for (key, value) in patch {
            current.insert(key.clone(), value.clone());
        }
        Ok(serde_json::from_value(Value::Object(current))?)
    }

    /// Filters for a scan, normalized
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::new(&self.allowed_extensions, &self.excluded_folders)
    }
}

/// Owned settings with their file location.
///
/// Readers get clones; an update replaces the value as a whole after the file
/// was written, so concurrent scans never see a partial edit.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Settings>,
}

impl SettingsStore {
    /// Open the store at `path`, creating the file with defaults if needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = Settings::load_or_create(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> Settings {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Scan filters derived from the current settings
    pub fn scan_config(&self) -> ScanConfig {
        self.snapshot().scan_config()
    }

    /// Merge `patch` into the settings, save, then publish the new value
    pub fn update(&self, patch: &Value) -> Result<Settings> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let updated = guard.merged(patch)?;
        updated.save(&self.path)?;
        *guard = updated.clone();
        Ok(updated)
    }

    /// Re-read the file, discarding the in-memory value
    pub fn reload(&self) -> Settings {
        let fresh = Settings::load(&self.path);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = fresh.clone();
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let settings = Settings::load_or_create(&path).unwrap();

        assert!(path.exists());
        assert_eq!(settings, Settings::default());
        assert!(settings.show_welcome);
    }

    #[test]
    fn missing_keys_default_and_unknown_keys_survive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"ultima_carpeta_codigo": "/src/app", "tema": "oscuro"}"#,
        )
        .unwrap();

        let settings = Settings::load(&path);
        assert_eq!(settings.last_code_folder, "/src/app");
        assert_eq!(settings.allowed_extensions, default_extensions());
        assert_eq!(settings.extra.get("tema"), Some(&json!("oscuro")));

        settings.save(&path).unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["tema"], json!("oscuro"));
        assert_eq!(raw["mysql"]["server"], json!(""));
        assert_eq!(raw["mostrar_bienvenida"], json!(true));
    }

    #[test]
    fn mistyped_key_resets_only_itself() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"tema": "oscuro", "mostrar_bienvenida": "si", "ultima_carpeta_codigo": "/src/app"}"#,
        )
        .unwrap();

        let store = SettingsStore::open(&path).unwrap();
        let loaded = store.snapshot();
        assert_eq!(loaded.last_code_folder, "/src/app");
        assert!(loaded.show_welcome);
        assert_eq!(loaded.extra.get("tema"), Some(&json!("oscuro")));

        store
            .update(&json!({"ultima_carpeta_guardar": "/out"}))
            .unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["tema"], json!("oscuro"));
        assert_eq!(raw["ultima_carpeta_codigo"], json!("/src/app"));
        assert_eq!(raw["ultima_carpeta_guardar"], json!("/out"));
        assert_eq!(raw["mostrar_bienvenida"], json!(true));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn update_merges_saves_and_changes_scan_config() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("config.json")).unwrap();

        let before = store.scan_config();
        store
            .update(&json!({"extensiones_permitidas": ["rs", "TOML"]}))
            .unwrap();
        let after = store.scan_config();

        assert!(before.is_allowed_file("a.py"));
        assert!(!after.is_allowed_file("a.py"));
        assert_eq!(after.allowed_extensions(), &[".rs", ".toml"]);

        let on_disk = Settings::load(store.path());
        assert_eq!(on_disk.allowed_extensions, vec!["rs", "TOML"]);
    }

    #[test]
    fn update_rejects_non_objects() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("config.json")).unwrap();
        assert!(store.update(&json!(["nope"])).is_err());
    }

    #[test]
    fn reload_picks_up_external_edits() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("config.json")).unwrap();

        let mut edited = Settings::default();
        edited.excluded_folders = vec!["dist".to_string()];
        edited.save(store.path()).unwrap();

        assert!(store.scan_config().is_excluded(".git"));
        store.reload();
        assert!(!store.scan_config().is_excluded(".git"));
        assert!(store.scan_config().is_excluded("dist"));
    }
}
