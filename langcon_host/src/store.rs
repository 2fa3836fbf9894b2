use langcon_protocol::{AppConfig, Language};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no local data directory on this platform")]
    NoDataDir,
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// On-disk shape. Accepts the field names older releases wrote.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct StoredConfig {
    #[serde(alias = "selectedProcesses", alias = "selected_process_list")]
    selected_processes: Option<Vec<String>>,
    #[serde(alias = "useAutoToEn", alias = "use_auto_org_to_en")]
    use_auto_to_en: Option<bool>,
    #[serde(alias = "useMouseMoveEvent")]
    use_mouse_move_event: Option<bool>,
    #[serde(alias = "detectIntervalSecs", alias = "detect_process_language_interval")]
    detect_interval_secs: Option<f32>,
    #[serde(alias = "mouseSensitivity", alias = "detect_mose_movement_sensitivity")]
    mouse_sensitivity: Option<f64>,
    #[serde(alias = "startWithWindows")]
    start_with_windows: Option<bool>,
    language: Option<Language>,
}

impl StoredConfig {
    fn into_config(self) -> AppConfig {
        let defaults = AppConfig::default();
        let mut config = AppConfig {
            selected_processes: self.selected_processes.unwrap_or(defaults.selected_processes),
            use_auto_to_en: self.use_auto_to_en.unwrap_or(defaults.use_auto_to_en),
            use_mouse_move_event: self
                .use_mouse_move_event
                .unwrap_or(defaults.use_mouse_move_event),
            detect_interval_secs: self
                .detect_interval_secs
                .unwrap_or(defaults.detect_interval_secs),
            // Older files stored the distance as a float.
            mouse_sensitivity: self
                .mouse_sensitivity
                .map(|d| d.round().clamp(0.0, u32::MAX as f64) as u32)
                .unwrap_or(defaults.mouse_sensitivity),
            start_with_windows: self.start_with_windows.unwrap_or(defaults.start_with_windows),
            language: self.language.unwrap_or(defaults.language),
        };
        config.normalize();
        config
    }
}

/// Parses a config file body. Unreadable content yields normalized defaults.
pub fn parse_config(raw: &str) -> AppConfig {
    match serde_json::from_str::<StoredConfig>(raw) {
        Ok(stored) => stored.into_config(),
        Err(err) => {
            tracing::warn!(%err, "config parse failed, using defaults");
            let mut config = AppConfig::default();
            config.normalize();
            config
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// `<local data dir>/N0Works/Langcon/config.json`.
    pub fn default_dir() -> Result<PathBuf, StoreError> {
        dirs::data_local_dir()
            .map(|dir| dir.join("N0Works").join("Langcon"))
            .ok_or(StoreError::NoDataDir)
    }

    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: dir.join(CONFIG_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is not an error; a broken one degrades to defaults.
    pub fn load(&self) -> Result<AppConfig, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(parse_config(&raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no config file yet, using defaults");
                let mut config = AppConfig::default();
                config.normalize();
                Ok(config)
            }
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn save(&self, config: &AppConfig) -> Result<(), StoreError> {
        let mut normalized = config.clone();
        normalized.normalize();
        let body = serde_json::to_string_pretty(&normalized)?;
        fs::write(&self.path, body).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), "config saved");
        Ok(())
    }
}
