//! Configuration system
//!
//! Settings are plain serde structs; the [`Config`] trait loads and saves
//! them as TOML or RON depending on the file extension.

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_str_with_format(&contents, path)
    }

    /// Parse configuration text, picking the format from `path`'s extension
    fn from_str_with_format(contents: &str, path: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Render configuration text in the format named by `path`'s extension
    fn to_string_with_format(&self, path: &str) -> Result<String, ConfigError> {
        if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = self.to_string_with_format(path)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values parsed but failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Build settings for a bounding interval hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BihConfig {
    /// Mesh boxes thinner than this along an axis are padded to it
    pub min_mesh_extent: f32,

    /// Texels whose alpha byte exceeds this count as opaque in alpha masks
    pub alpha_cutoff: u8,
}

impl Default for BihConfig {
    fn default() -> Self {
        Self {
            min_mesh_extent: 0.125,
            alpha_cutoff: 0,
        }
    }
}

impl BihConfig {
    /// Set the minimum mesh extent
    pub fn with_min_mesh_extent(mut self, extent: f32) -> Self {
        self.min_mesh_extent = extent;
        self
    }

    /// Set the alpha cutoff used when building masks from images
    pub fn with_alpha_cutoff(mut self, cutoff: u8) -> Self {
        self.alpha_cutoff = cutoff;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_mesh_extent.is_finite() || self.min_mesh_extent < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_mesh_extent must be a finite non-negative number, got {}",
                self.min_mesh_extent
            )));
        }
        Ok(())
    }
}

impl Config for BihConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BihConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_mesh_extent, 0.125);
    }

    #[test]
    fn test_negative_extent_rejected() {
        let config = BihConfig::default().with_min_mesh_extent(-1.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = BihConfig::default().with_alpha_cutoff(127).with_min_mesh_extent(0.25);
        let text = config.to_string_with_format("bih.toml").unwrap();
        let parsed = BihConfig::from_str_with_format(&text, "bih.toml").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = BihConfig::default().with_alpha_cutoff(3);
        let text = config.to_string_with_format("bih.ron").unwrap();
        let parsed = BihConfig::from_str_with_format(&text, "bih.ron").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let parsed = BihConfig::from_str_with_format("alpha_cutoff = 9\n", "bih.toml").unwrap();
        assert_eq!(parsed.alpha_cutoff, 9);
        assert_eq!(parsed.min_mesh_extent, 0.125);
    }

    #[test]
    fn test_unknown_extension() {
        let result = BihConfig::from_str_with_format("", "bih.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
