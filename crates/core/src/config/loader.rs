use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment overrides; nested keys are split on `__`
/// (`VODSYNC_STORAGE__APPLICATION_KEY`).
pub const ENV_PREFIX: &str = "VODSYNC_";

/// `VODSYNC_CONFIG` names the file itself and is not a setting.
const IGNORED_ENV_KEYS: &[&str] = &["config"];

/// The TOML file with `VODSYNC_*` overrides layered on top.
fn layered(path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(IGNORED_ENV_KEYS))
}

/// Load configuration from file with environment variable overrides.
///
/// Unknown keys, in the file or in the environment, are an error.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    layered(path)
        .extract()
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
