//! World persistence and streaming configuration

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::terrain::generator::TerrainParams;
use crate::voxel::chunk::{SECTION_COUNT, SECTION_VOLUME};

fn default_persist() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("world")
}

fn default_max_loads() -> usize {
    4
}

fn default_section_count() -> usize {
    SECTION_COUNT
}

fn default_section_volume() -> usize {
    SECTION_VOLUME
}

/// Configuration for the chunk provider and persistence layer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Write chunks to disk on release and read them back on request
    #[serde(default = "default_persist")]
    pub persist_chunks: bool,
    /// Directory holding chunk files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Maximum concurrent chunk loads on the worker pool
    #[serde(default = "default_max_loads")]
    pub max_concurrent_loads: usize,
    /// Terrain noise parameters for the default generator
    #[serde(default)]
    pub terrain_params: TerrainParams,
    /// Vertical sections per chunk; must match the compiled geometry
    #[serde(default = "default_section_count")]
    pub section_count: usize,
    /// Cells per section; must match the compiled geometry
    #[serde(default = "default_section_volume")]
    pub section_volume: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            persist_chunks: true,
            data_dir: PathBuf::from("world"),
            max_concurrent_loads: 4,
            terrain_params: TerrainParams::default(),
            section_count: SECTION_COUNT,
            section_volume: SECTION_VOLUME,
        }
    }
}

impl WorldConfig {
    /// Check the config against the compiled chunk geometry.
    ///
    /// The disk format header is sized by these constants, so a config
    /// asking for different geometry cannot be honored.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_loads == 0 {
            return Err(Error::Config(
                "max_concurrent_loads must be at least 1".to_string(),
            ));
        }
        if self.section_count != SECTION_COUNT {
            return Err(Error::Config(format!(
                "section_count must be {} (got {})",
                SECTION_COUNT, self.section_count
            )));
        }
        if self.section_volume != SECTION_VOLUME {
            return Err(Error::Config(format!(
                "section_volume must be {} (got {})",
                SECTION_VOLUME, self.section_volume
            )));
        }
        Ok(())
    }

    /// Save to file (sync)
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from file (sync), rejecting configs that fail validation
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.persist_chunks);
        assert_eq!(config.max_concurrent_loads, 4);
        assert_eq!(config.section_count, SECTION_COUNT);
        assert_eq!(config.section_volume, SECTION_VOLUME);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = WorldConfig {
            max_concurrent_loads: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        let config = WorldConfig {
            section_count: SECTION_COUNT + 1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = WorldConfig {
            section_volume: 1024,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");

        let config = WorldConfig {
            persist_chunks: false,
            data_dir: PathBuf::from("/tmp/chunks"),
            max_concurrent_loads: 8,
            ..Default::default()
        };
        config.save_sync(&path).expect("save failed");

        let loaded = WorldConfig::load_sync(&path).expect("load failed");
        assert!(!loaded.persist_chunks);
        assert_eq!(loaded.data_dir, PathBuf::from("/tmp/chunks"));
        assert_eq!(loaded.max_concurrent_loads, 8);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let loaded: WorldConfig = serde_json::from_str("{}").expect("parse failed");
        assert!(loaded.persist_chunks);
        assert_eq!(loaded.data_dir, PathBuf::from("world"));
        assert_eq!(loaded.max_concurrent_loads, 4);
        assert_eq!(loaded.section_count, SECTION_COUNT);
    }

    #[test]
    fn test_load_rejects_bad_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");
        std::fs::write(&path, r#"{"section_count": 4}"#).unwrap();

        assert!(WorldConfig::load_sync(&path).is_err());
    }
}
