use std::path::{Path, PathBuf};

use serde::de::Error as SerdeDeError;

use super::{ConfigError, Settings};
use crate::{app_dirs, atomic_write};

/// Default filename used to store the settings.
pub const CONFIG_FILE_NAME: &str = "sentrain.toml";
/// File name of the installed model slot under the models directory.
pub const MODEL_FILE_NAME: &str = "sentiment.model";

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load settings from the app root, returning defaults if the file is missing.
pub fn load_or_default() -> Result<Settings, ConfigError> {
    load_from(&config_path()?)
}

/// Load settings from `path`, returning defaults if it does not exist.
pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source: SerdeDeError::custom(source),
    })?;
    toml::from_str::<Settings>(&text)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
        .map(Settings::normalized)
}

/// Persist settings to the app root.
pub fn save(settings: &Settings) -> Result<(), ConfigError> {
    save_to_path(settings, &config_path()?)
}

/// Write settings to `path` atomically, creating parent directories as needed.
pub fn save_to_path(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(settings).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write::write_atomic(path, data.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Installed model slot: the configured path or the default under `models/`.
pub fn model_slot_path(settings: &Settings) -> Result<PathBuf, ConfigError> {
    match &settings.model_path {
        Some(path) => Ok(path.clone()),
        None => {
            let dir = app_dirs::models_dir().map_err(map_app_dir_error)?;
            Ok(dir.join(MODEL_FILE_NAME))
        }
    }
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => ConfigError::CreateDir { path, source },
    }
}
