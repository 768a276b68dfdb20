use std::collections::HashSet;

use crate::bitrate::parse_bitrate;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Rendition table is non-empty, names unique, dimensions non-zero,
///   bitrates parseable
/// - Segment duration is not 0
/// - URL templates reference what they resolve
/// - Storage credentials are non-empty when storage is configured
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

    if config.renditions.is_empty() {
        return invalid("renditions cannot be empty".to_string());
    }

    let mut names = HashSet::new();
    for rendition in &config.renditions {
        if rendition.name.trim().is_empty() {
            return invalid("rendition name cannot be empty".to_string());
        }
        if !names.insert(rendition.name.as_str()) {
            return invalid(format!("duplicate rendition name: {}", rendition.name));
        }
        if rendition.width == 0 || rendition.height == 0 {
            return invalid(format!("rendition {} has zero dimensions", rendition.name));
        }
        if parse_bitrate(&rendition.bitrate).is_none() {
            return invalid(format!(
                "rendition {} has unparseable bitrate: {}",
                rendition.name, rendition.bitrate
            ));
        }
    }

    if config.transcoder.segment_duration_secs == 0 {
        return invalid("transcoder.segment_duration_secs cannot be 0".to_string());
    }

    if !config.output.playlist_url_template.contains("{rendition}") {
        return invalid("output.playlist_url_template must contain {rendition}".to_string());
    }
    if !config.output.manifest_url_template.contains("{videoId}") {
        return invalid("output.manifest_url_template must contain {videoId}".to_string());
    }

    if let Some(storage) = &config.storage {
        if storage.key_id.trim().is_empty() {
            return invalid("storage.key_id cannot be empty".to_string());
        }
        if storage.application_key.trim().is_empty() {
            return invalid("storage.application_key cannot be empty".to_string());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::RenditionTemplate;
    use crate::storage::StorageConfig;

    fn assert_invalid(config: &Config) {
        let result = validate_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_table_fails() {
        let mut config = Config::default();
        config.renditions.clear();
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_duplicate_names_fail() {
        let mut config = Config::default();
        config
            .renditions
            .push(RenditionTemplate::new("480p", 640, 480, "700k"));
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_bad_bitrate_fails() {
        let mut config = Config::default();
        config.renditions[0].bitrate = "fast".to_string();
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_zero_segment_duration_fails() {
        let mut config = Config::default();
        config.transcoder.segment_duration_secs = 0;
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_templates() {
        let mut config = Config::default();
        config.output.playlist_url_template = "playlist.m3u8".to_string();
        assert_invalid(&config);

        let mut config = Config::default();
        config.output.manifest_url_template = "{basePath}/master.m3u8".to_string();
        assert_invalid(&config);
    }

    #[test]
    fn test_validate_empty_storage_key_fails() {
        let mut config = Config::default();
        config.storage = Some(StorageConfig::new("https://api.backblazeb2.com", "id", ""));
        assert_invalid(&config);

        config.storage = Some(StorageConfig::new("https://api.backblazeb2.com", "id", "key"));
        assert!(validate_config(&config).is_ok());
    }
}
