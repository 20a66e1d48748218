use super::types::ContentConfig;
use crate::error::Result;
use std::path::Path;

/// Parse a content.yaml file into a ContentConfig.
///
/// A relative `root` is resolved against the directory holding the file.
pub fn parse_config(path: &Path) -> Result<ContentConfig> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config_str(&content)?;
    if config.root.is_relative() {
        if let Some(dir) = path.parent() {
            config.root = dir.join(&config.root);
        }
    }
    Ok(config)
}

/// Parse a content.yaml string into a ContentConfig
pub fn parse_config_str(content: &str) -> Result<ContentConfig> {
    let config: ContentConfig = serde_yaml::from_str(content)?;
    Ok(config)
}
