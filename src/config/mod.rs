pub mod types;

use crate::error::{ConfigError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".pspmigrator.toml";

/// Get the global config file path (~/.pspmigrator.toml)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Get the local config file path (./.pspmigrator.toml)
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Read and parse a single config file.
pub fn read_config(path: &Path) -> Result<types::Config> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
        path: path.display().to_string(),
        source,
    })?;
    let config = toml::from_str(&content).map_err(|source| ConfigError::ParsingFailed {
        path: path.display().to_string(),
        source,
    })?;
    Ok(config)
}

/// Load configuration.
///
/// An explicit path must exist and parse. Otherwise the local config in
/// `dir` is tried, then the global one; a file that fails to parse is
/// skipped with a warning and defaults are used when nothing is found.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<types::Config> {
    if let Some(path) = explicit {
        log::debug!("Loading config from {}", path.display());
        return read_config(path);
    }

    let candidates = std::iter::once(local_config_path(dir)).chain(global_config_path());
    for path in candidates {
        if !path.exists() {
            continue;
        }
        match read_config(&path) {
            Ok(config) => {
                log::debug!("Loaded config from {}", path.display());
                return Ok(config);
            }
            Err(e) => log::warn!("Ignoring config file: {}", e),
        }
    }

    Ok(types::Config::default())
}
