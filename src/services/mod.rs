//! Service layer: embedding seams, index synchronization, matching
//! orchestration

pub mod embedding;
pub mod indexer;
pub mod matching;

pub use embedding::{
    EmbeddingError, EncodableImage, ImageEncoder, ImagePreprocessor, PassthroughPreprocessor,
};
pub use indexer::{IndexOutcome, IndexSynchronizer, IndexerError};
pub use matching::{
    MatchingService, SearchHit, ServiceError, ServiceResult, SubmitOutcome, MAX_SEARCH_RESULTS,
};
