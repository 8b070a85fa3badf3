//! Configuration for tile assembly.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::vector_tile::DEFAULT_EXTENT;

/// What to do when a requested spec has no stored tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingTilePolicy {
    /// Treat the spec as contributing no bins.
    #[default]
    Empty,
    /// Fail the whole tile request.
    Fail,
}

impl MissingTilePolicy {
    /// Parse a known policy name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "empty" => Some(Self::Empty),
            "fail" | "error" => Some(Self::Fail),
            _ => None,
        }
    }

    /// Parse from string, falling back to `Empty` with a warning.
    pub fn from_str(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            warn!(value = %s, "Unknown missing tile policy, using 'empty'");
            Self::Empty
        })
    }
}

/// Configuration for the tile service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileEngineConfig {
    /// Name of the single vector tile layer.
    pub layer_name: String,

    /// Integer grid size of one tile side.
    pub extent: u32,

    /// Quadtree levels of bins below the tile zoom in the output.
    pub bin_level: u32,

    pub missing_tile_policy: MissingTilePolicy,
}

impl Default for TileEngineConfig {
    fn default() -> Self {
        Self {
            layer_name: "maas".to_string(),
            extent: DEFAULT_EXTENT,
            bin_level: 4,
            missing_tile_policy: MissingTilePolicy::Empty,
        }
    }
}

impl TileEngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("TILE_LAYER_NAME") {
            config.layer_name = val;
        }

        if let Ok(val) = std::env::var("TILE_EXTENT") {
            if let Ok(extent) = val.parse() {
                config.extent = extent;
            }
        }

        if let Ok(val) = std::env::var("TILE_BIN_LEVEL") {
            if let Ok(level) = val.parse() {
                config.bin_level = level;
            }
        }

        if let Ok(val) = std::env::var("MISSING_TILE_POLICY") {
            config.missing_tile_policy = MissingTilePolicy::from_str(&val);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.layer_name.is_empty() {
            return Err("layer_name must not be empty".to_string());
        }

        if self.extent < 16 {
            return Err("extent must be >= 16".to_string());
        }

        // Every output bin must span at least one grid unit.
        if 1u64 << self.bin_level.min(63) > self.extent as u64 {
            return Err(format!(
                "bin_level {} is too fine for extent {}",
                self.bin_level, self.extent
            ));
        }

        if self.bin_level > 8 {
            return Err("bin_level must be <= 8".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TileEngineConfig::default();
        assert_eq!(config.layer_name, "maas");
        assert_eq!(config.extent, 4096);
        assert_eq!(config.bin_level, 4);
        assert_eq!(config.missing_tile_policy, MissingTilePolicy::Empty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TileEngineConfig::default();
        config.layer_name.clear();
        assert!(config.validate().is_err());

        config = TileEngineConfig::default();
        config.extent = 8;
        assert!(config.validate().is_err());

        config = TileEngineConfig::default();
        config.extent = 64;
        config.bin_level = 7;
        assert!(config.validate().is_err());

        config = TileEngineConfig::default();
        config.bin_level = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_tile_policy_from_str() {
        assert_eq!(MissingTilePolicy::from_str("fail"), MissingTilePolicy::Fail);
        assert_eq!(MissingTilePolicy::from_str("FAIL"), MissingTilePolicy::Fail);
        assert_eq!(MissingTilePolicy::from_str("empty"), MissingTilePolicy::Empty);
        assert_eq!(MissingTilePolicy::from_str("other"), MissingTilePolicy::Empty);
    }

    #[test]
    fn test_missing_tile_policy_parse_rejects_typos() {
        assert_eq!(MissingTilePolicy::parse("Error"), Some(MissingTilePolicy::Fail));
        assert_eq!(MissingTilePolicy::parse("empty"), Some(MissingTilePolicy::Empty));
        assert_eq!(MissingTilePolicy::parse("fial"), None);
        assert_eq!(MissingTilePolicy::parse(""), None);
    }
}
