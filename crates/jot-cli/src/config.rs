use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use jot_core::config::Config;
use thiserror::Error;

const CONFIG_ENV: &str = "JOT_CONFIG";
const APP_DIR: &str = "jot";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// `$JOT_CONFIG`, else `<config_dir>/jot/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .or_else(|| dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml")))
}

pub fn load_config() -> Result<Config, ConfigError> {
    match config_path() {
        Some(path) => load_from(&path),
        None => Ok(Config::default()),
    }
}

/// A missing file yields defaults.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Store root: explicit flag, then config, then the platform data dir.
pub fn store_root(flag: Option<PathBuf>, config: &Config) -> PathBuf {
    flag.or_else(|| config.store.root.clone())
        .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR)))
        .unwrap_or_else(|| PathBuf::from(".jot"))
}
