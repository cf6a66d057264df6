//! Pawfinder Core
//!
//! The matching engine for lost & found animal reports: a relational
//! system of record (reports, images, candidate-match edges) kept in
//! sync with a vector similarity index, plus the propose/resolve match
//! workflow on top.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod services;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::config::{CoreConfig, VectorBackend};
use crate::infrastructure::database::repository::{MatchRepository, ReportRepository};
use crate::infrastructure::database::Database;
use crate::infrastructure::vector::{
    schema, HttpVectorIndex, MemoryVectorIndex, SchemaStatus, VectorIndex,
};
use crate::services::{
    ImageEncoder, ImagePreprocessor, IndexSynchronizer, MatchingService,
};

/// The composition root: owns every backing-store handle and the wired
/// service graph. Opened at startup, shut down at exit; nothing in the
/// crate reaches for a global connection.
pub struct Core {
    config: CoreConfig,

    db: Arc<Database>,

    /// Vector index handle, shared with the synchronizer and service
    pub index: Arc<dyn VectorIndex>,

    /// Index synchronizer, exposed for maintenance tooling
    pub indexer: Arc<IndexSynchronizer>,

    /// The matching service, the outward face of the core
    pub matching: Arc<MatchingService>,
}

impl Core {
    /// Open every store and wire the services.
    ///
    /// The encoder and preprocessor are external collaborators chosen
    /// by the embedding deployment; the core only agrees on the vector
    /// dimension through the config.
    pub async fn open(
        config: CoreConfig,
        encoder: Arc<dyn ImageEncoder>,
        preprocessor: Arc<dyn ImagePreprocessor>,
    ) -> Result<Self> {
        info!("Opening pawfinder core at {:?}", config.data_dir);

        if encoder.dimension() != config.embedding.dimension {
            return Err(anyhow!(
                "encoder produces {}-dimensional vectors but config expects {}",
                encoder.dimension(),
                config.embedding.dimension
            ));
        }

        // 1. Open the system of record and run migrations
        let db = Arc::new(Database::open_or_create(&config.database_path()).await?);
        db.migrate().await?;

        // 2. Open the vector index backend
        let index: Arc<dyn VectorIndex> = match &config.index.backend {
            VectorBackend::Memory => Arc::new(MemoryVectorIndex::new()),
            VectorBackend::Http { url } => Arc::new(HttpVectorIndex::with_batching(
                url,
                config.index.batch_size,
                config.index.workers,
            )),
        };

        // 3. Ensure the index class exists and is compatible
        let class = schema::report_class(&config.index.class_name, config.embedding.dimension);
        match index.ensure_schema(&class).await? {
            SchemaStatus::Created => info!(class = %class.class_name, "Created index class"),
            SchemaStatus::Exists => info!(class = %class.class_name, "Index class exists"),
            SchemaStatus::Incompatible { details } => {
                return Err(anyhow!(
                    "index class {} is incompatible and needs operator migration: {details}",
                    class.class_name
                ));
            }
        }

        // 4. Wire repositories, synchronizer and the matching service
        let reports = Arc::new(ReportRepository::new(db.clone()));
        let matches = Arc::new(MatchRepository::new(db.clone()));

        let indexer = Arc::new(IndexSynchronizer::new(
            reports.clone(),
            index.clone(),
            encoder.clone(),
            preprocessor.clone(),
            config.index.class_name.clone(),
        ));

        let matching = Arc::new(MatchingService::new(
            reports,
            matches,
            indexer.clone(),
            index.clone(),
            encoder,
            preprocessor,
            config.index.class_name.clone(),
        ));

        info!("Pawfinder core ready");

        Ok(Self {
            config,
            db,
            index,
            indexer,
            matching,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Close the backing stores.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down pawfinder core");

        drop(self.matching);
        drop(self.indexer);
        drop(self.index);

        let db = Arc::try_unwrap(self.db)
            .map_err(|_| anyhow!("database handle still shared at shutdown"))?;
        db.close().await?;

        info!("Pawfinder core shutdown complete");
        Ok(())
    }
}

/// Install a tracing subscriber honoring `RUST_LOG`, for binaries and
/// integration tests.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
