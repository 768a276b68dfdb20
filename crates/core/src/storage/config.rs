//! Configuration for the object storage client.

use serde::{Deserialize, Serialize};

/// Credentials and defaults for a B2-compatible object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Authorization endpoint base.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Application key id.
    pub key_id: String,

    /// Application key secret.
    pub application_key: String,

    /// Bucket used when a command names none.
    #[serde(default)]
    pub default_bucket_id: Option<String>,

    /// Bucket name used for download URLs when a command names none.
    #[serde(default)]
    pub default_bucket_name: Option<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.backblazeb2.com".to_string()
}

fn default_timeout() -> u64 {
    60
}

impl StorageConfig {
    /// Creates a config with the given endpoint and credentials.
    pub fn new(
        api_url: impl Into<String>,
        key_id: impl Into<String>,
        application_key: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            key_id: key_id.into(),
            application_key: application_key.into(),
            default_bucket_id: None,
            default_bucket_name: None,
            timeout_secs: default_timeout(),
        }
    }

    /// Sets the default bucket.
    pub fn with_default_bucket(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.default_bucket_id = Some(id.into());
        self.default_bucket_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            key_id = "0012ab"
            application_key = "K001secret"
        "#;
        let config: StorageConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.api_url, "https://api.backblazeb2.com");
        assert_eq!(config.timeout_secs, 60);
        assert!(config.default_bucket_id.is_none());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let result: Result<StorageConfig, _> = toml::from_str(r#"key_id = "0012ab""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_builder() {
        let config = StorageConfig::new("http://localhost:1234", "id", "key")
            .with_default_bucket("b-1", "videos");
        assert_eq!(config.default_bucket_id.as_deref(), Some("b-1"));
        assert_eq!(config.default_bucket_name.as_deref(), Some("videos"));
    }
}
