//! Vector index client
//!
//! The index stores one document per report image: an embedding vector
//! plus denormalized report attributes for filtering. Two backends
//! implement the same trait, a Weaviate-flavored HTTP client for
//! deployments and an embedded in-memory store for development and
//! tests.

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

pub mod filter;
pub mod http;
pub mod memory;
pub mod schema;

pub use filter::{FilterNode, FilterValue, Operator, Predicate};
pub use http::HttpVectorIndex;
pub use memory::MemoryVectorIndex;
pub use schema::{ClassSchema, PropertySpec, PropertyType};

/// Vector index failures.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("index returned an error: {0}")]
    Backend(String),

    #[error("malformed index response: {0}")]
    InvalidResponse(String),

    #[error("class {0} does not exist")]
    MissingClass(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Outcome of an idempotent schema creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Class did not exist and was created
    Created,

    /// A compatible class already exists
    Exists,

    /// A class exists but does not match the wanted definition.
    ///
    /// Never resolved automatically; an operator has to migrate the
    /// class. Destroying and recreating it here would silently drop
    /// every stored document.
    Incompatible { details: String },
}

/// One document to upsert: deterministic id, vector, property map.
#[derive(Debug, Clone)]
pub struct DocumentUpsert {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub properties: Map<String, Value>,
}

/// A single document that could not be upserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub id: Uuid,
    pub reason: String,
}

/// Itemized result of a batch upsert.
///
/// A failing item never aborts its siblings; it is recorded here and
/// the batch keeps going.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub successful: usize,
    pub failed: usize,
    pub failed_items: Vec<FailedItem>,
}

impl BatchOutcome {
    pub fn merge(&mut self, other: BatchOutcome) {
        self.successful += other.successful;
        self.failed += other.failed;
        self.failed_items.extend(other.failed_items);
    }
}

/// A filtered, optionally vector-ranked query.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    /// Embedding to rank against; without it the query is attribute-only
    /// and result order is unspecified
    pub vector: Option<Vec<f32>>,

    /// Attribute predicate tree
    pub filter: Option<FilterNode>,

    /// Maximum number of hits
    pub limit: usize,

    /// Properties to return per hit; empty means all
    pub return_properties: Vec<String>,
}

/// One query hit.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: Uuid,

    /// Similarity in `[0, 1]`, present only for vector queries
    pub score: Option<f32>,

    pub properties: Map<String, Value>,
}

/// Client surface of the vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotently create the class, comparing against any live one.
    async fn ensure_schema(&self, schema: &ClassSchema) -> IndexResult<SchemaStatus>;

    /// Fetch the live class definition, `None` if the class is absent.
    async fn get_schema(&self, class_name: &str) -> IndexResult<Option<ClassSchema>>;

    /// Upsert documents, collecting per-item failures instead of
    /// aborting the batch.
    async fn upsert_batch(
        &self,
        class_name: &str,
        documents: Vec<DocumentUpsert>,
    ) -> IndexResult<BatchOutcome>;

    /// Delete every document whose integer property is in `values`.
    /// Returns the number of documents removed.
    async fn delete_where_in(
        &self,
        class_name: &str,
        property: &str,
        values: &[i64],
    ) -> IndexResult<u64>;

    /// Run a filtered (and optionally vector-ranked) query.
    async fn query(&self, class_name: &str, request: QueryRequest) -> IndexResult<Vec<QueryHit>>;

    /// Remove every document of the class, keeping the class definition.
    /// Maintenance operation backing index reset tooling.
    async fn delete_all_documents(&self, class_name: &str) -> IndexResult<u64>;
}

/// Similarity score for a raw index distance: `clamp(1 - distance, 0, 1)`
/// rounded to 4 decimal places.
pub(crate) fn similarity_score(distance: f64) -> f32 {
    let score = (1.0 - distance).clamp(0.0, 1.0);
    ((score * 10_000.0).round() / 10_000.0) as f32
}
