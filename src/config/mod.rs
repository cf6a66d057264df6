//! Core configuration
//!
//! Versioned JSON config persisted in the data directory. Loading an
//! older version runs it through [`Migrate`] and saves the result.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const CONFIG_FILE: &str = "pawfinder.json";

/// Versioned config migration.
pub trait Migrate {
    fn current_version(&self) -> u32;
    fn target_version() -> u32;
    fn migrate(&mut self) -> Result<()>;
}

/// Which vector index backend to open at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum VectorBackend {
    /// Embedded brute-force store, for development and tests
    Memory,

    /// Weaviate-flavored HTTP index
    Http { url: String },
}

/// Vector index settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(flatten)]
    pub backend: VectorBackend,

    /// Index class holding the report documents
    pub class_name: String,

    /// Objects per batch upsert request
    pub batch_size: usize,

    /// Concurrent in-flight batch requests
    pub workers: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Memory,
            class_name: "ReportImage".to_string(),
            batch_size: 100,
            workers: 4,
        }
    }
}

/// Embedding model settings the core needs to know about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Vector length the deployed encoder produces
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { dimension: 512 }
    }
}

/// Main core configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Config schema version
    pub version: u32,

    /// Data directory path
    pub data_dir: PathBuf,

    /// SQLite database file name inside the data directory
    pub database_file: String,

    /// Logging level
    pub log_level: String,

    pub index: IndexConfig,

    pub embedding: EmbeddingConfig,

    /// Reports per page during a full reindex
    pub reindex_page_size: u64,
}

impl CoreConfig {
    /// Load configuration from a data directory, creating a default
    /// one if none exists.
    pub fn load_or_create(data_dir: &PathBuf) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE);

        if config_path.exists() {
            info!("Loading config from {:?}", config_path);
            let json = fs::read_to_string(&config_path)?;
            let mut config: CoreConfig = serde_json::from_str(&json)?;

            if config.version < Self::target_version() {
                info!(
                    "Migrating config from v{} to v{}",
                    config.version,
                    Self::target_version()
                );
                config.migrate()?;
                config.save()?;
            }

            Ok(config)
        } else {
            warn!("No config found, creating default at {:?}", config_path);
            let config = Self::default_with_dir(data_dir.clone());
            config.save()?;
            Ok(config)
        }
    }

    /// Create default configuration with a specific data directory.
    pub fn default_with_dir(data_dir: PathBuf) -> Self {
        Self {
            version: Self::target_version(),
            data_dir,
            database_file: "pawfinder.db".to_string(),
            log_level: "info".to_string(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            reindex_page_size: 100,
        }
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;

        let config_path = self.data_dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, json)?;
        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Absolute path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

impl Migrate for CoreConfig {
    fn current_version(&self) -> u32 {
        self.version
    }

    fn target_version() -> u32 {
        1
    }

    fn migrate(&mut self) -> Result<()> {
        match self.version {
            0 => {
                self.version = 1;
                Ok(())
            }
            1 => Ok(()),
            v => Err(anyhow!("Unknown config version: {}", v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let config = CoreConfig::default_with_dir(PathBuf::from("/tmp/pawfinder"));
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_http_backend_serialization() {
        let mut config = CoreConfig::default_with_dir(PathBuf::from("/tmp/pawfinder"));
        config.index.backend = VectorBackend::Http {
            url: "http://localhost:8080".to_string(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"backend\":\"http\""));
        let parsed: CoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.index.backend, config.index.backend);
    }

    #[test]
    fn test_migrate_from_v0() {
        let mut config = CoreConfig::default_with_dir(PathBuf::from("/tmp/pawfinder"));
        config.version = 0;
        config.migrate().unwrap();
        assert_eq!(config.version, CoreConfig::target_version());

        config.version = 99;
        assert!(config.migrate().is_err());
    }
}
