//! Configuration file loader
//! Reads strict YAML configuration files from disk

use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

use crate::error::TermInfoError;

/// Load and deserialize a YAML file.
///
/// Returns `Ok(None)` when the file does not exist. Any other open failure
/// or a parse error is reported as a configuration error.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, TermInfoError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Configuration file {:?} not found, using defaults", path);
            return Ok(None);
        }
        Err(e) => {
            return Err(TermInfoError::ConfigError(format!(
                "can't open configuration file {:?}: {}",
                path, e
            )))
        }
    };

    info!("Loading configuration from file: {:?}", path);

    // An empty document deserializes as unit, not as a struct with defaults.
    if contents.trim().is_empty() {
        return serde_yaml::from_str("{}").map(Some).map_err(|e| {
            TermInfoError::ConfigError(format!("can't parse configuration file {:?}: {}", path, e))
        });
    }

    serde_yaml::from_str(&contents).map(Some).map_err(|e| {
        TermInfoError::ConfigError(format!(
            "can't parse configuration file {:?}: {}",
            path, e
        ))
    })
}
