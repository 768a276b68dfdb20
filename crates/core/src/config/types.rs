use serde::{Deserialize, Serialize};

use crate::orchestrator::OutputConfig;
use crate::planner::{default_rendition_table, RenditionTemplate};
use crate::storage::StorageConfig;
use crate::transcoder::TranscoderConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    /// Rendition table the planner starts from.
    #[serde(default = "default_rendition_table")]
    pub renditions: Vec<RenditionTemplate>,
    #[serde(default)]
    pub output: OutputConfig,
    /// Required by publishing and listing commands only.
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcoder: TranscoderConfig::default(),
            renditions: default_rendition_table(),
            output: OutputConfig::default(),
            storage: None,
        }
    }
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub transcoder: TranscoderConfig,
    pub renditions: Vec<RenditionTemplate>,
    pub output: OutputConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<SanitizedStorageConfig>,
}

/// Sanitized storage config (application key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub api_url: String,
    pub key_id: String,
    pub application_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_bucket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_bucket_name: Option<String>,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            transcoder: config.transcoder.clone(),
            renditions: config.renditions.clone(),
            output: config.output.clone(),
            storage: config.storage.as_ref().map(|s| SanitizedStorageConfig {
                api_url: s.api_url.clone(),
                key_id: s.key_id.clone(),
                application_key_configured: !s.application_key.is_empty(),
                default_bucket_id: s.default_bucket_id.clone(),
                default_bucket_name: s.default_bucket_name.clone(),
                timeout_secs: s.timeout_secs,
            }),
        }
    }
}
