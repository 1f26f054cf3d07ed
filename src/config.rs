use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use tracing::level_filters::LevelFilter;

use crate::authorization::AuthorizationConfig;
use crate::error::TermInfoError;

pub mod loader;

pub const DEFAULT_ADDR: &str = "0.0.0.0:1337";
pub const DEFAULT_HOST_KEY_PATH: &str = ".ssh/term_info_ed25519";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub addr: String,
    pub trusted_keys: Vec<PathBuf>,
    pub log_level: Option<String>,
    pub host_key_path: PathBuf,

    /// The running user's own `authorized_keys`, resolved at startup.
    #[serde(skip)]
    pub authorized_keys: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            trusted_keys: Vec::new(),
            log_level: None,
            host_key_path: PathBuf::from(DEFAULT_HOST_KEY_PATH),
            authorized_keys: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional YAML file and apply defaults.
    ///
    /// A missing file is not an error: the defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self, TermInfoError> {
        let mut config = match path {
            Some(path) => loader::load_yaml(path)?.unwrap_or_default(),
            None => Self::default(),
        };

        config.validate()?;
        config.apply_defaults(dirs::home_dir());
        Ok(config)
    }

    /// Reject values that would otherwise be silently misread.
    pub fn validate(&self) -> Result<(), TermInfoError> {
        if let Some(level) = &self.log_level {
            LevelFilter::from_str(level).map_err(|_| {
                TermInfoError::ConfigError(format!(
                    "invalid log_level {:?}: expected one of off, error, warn, info, debug, trace",
                    level
                ))
            })?;
        }
        Ok(())
    }

    /// Fill in values that the file left empty and resolve the user source.
    pub fn apply_defaults(&mut self, home: Option<PathBuf>) {
        if self.addr.is_empty() {
            self.addr = DEFAULT_ADDR.to_string();
        }
        if self.host_key_path.as_os_str().is_empty() {
            self.host_key_path = PathBuf::from(DEFAULT_HOST_KEY_PATH);
        }
        self.authorized_keys = user_authorized_keys(home);
    }

    /// Snapshot of the key sources for the authorization evaluator.
    pub fn authorization(&self) -> AuthorizationConfig {
        AuthorizationConfig::new(self.trusted_keys.clone(), self.authorized_keys.clone())
    }
}

fn user_authorized_keys(home: Option<PathBuf>) -> Option<PathBuf> {
    let Some(home) = home else {
        debug!("user home directory is not configured");
        return None;
    };

    let path = home.join(".ssh").join("authorized_keys");
    if let Err(e) = std::fs::metadata(&path) {
        debug!("user has no authorized keys file at {:?}: {}", path, e);
        return None;
    }

    Some(path)
}
