//! Matching service
//!
//! Orchestrates the system of record and the index synchronizer:
//! report lifecycle (submit, verify, resolve, delete), the candidate
//! match workflow, and similarity search. Relational writes are
//! authoritative; index writes are best-effort, with drift repaired by
//! the reindex job.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{
    CandidateMatch, MatchPair, NewImage, NewReport, Page, PageRequest, Report, ReportDocument,
    ReportFilter, ReportType, SearchCriteria, SortOrder,
};
use crate::infrastructure::database::repository::{
    MatchRepository, ReportRepository, StoreError,
};
use crate::infrastructure::vector::{filter, IndexError, QueryRequest, VectorIndex};
use crate::services::embedding::{
    EmbeddingError, EncodableImage, ImageEncoder, ImagePreprocessor,
};
use crate::services::indexer::{IndexOutcome, IndexSynchronizer, IndexerError};

/// Maximum hits a similarity search may request.
pub const MAX_SEARCH_RESULTS: usize = 100;

/// Service-level failures, as returned to the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

impl ServiceError {
    /// Whether this failure means a referenced id did not resolve.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::NotFound { .. }))
    }
}

impl From<IndexerError> for ServiceError {
    fn from(error: IndexerError) -> Self {
        match error {
            IndexerError::Store(e) => ServiceError::Store(e),
            IndexerError::Index(e) => ServiceError::Index(e),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result of a submission: the authoritative stored report plus the
/// best-effort indexing outcome as metadata.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub report: Report,
    pub index: IndexOutcome,
}

/// One ranked similarity hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document_id: uuid::Uuid,

    /// Similarity in `[0, 1]`, descending over the result list
    pub score: Option<f32>,

    pub document: ReportDocument,
}

pub struct MatchingService {
    reports: Arc<ReportRepository>,
    matches: Arc<MatchRepository>,
    indexer: Arc<IndexSynchronizer>,
    index: Arc<dyn VectorIndex>,
    encoder: Arc<dyn ImageEncoder>,
    preprocessor: Arc<dyn ImagePreprocessor>,
    class_name: String,
}

impl MatchingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reports: Arc<ReportRepository>,
        matches: Arc<MatchRepository>,
        indexer: Arc<IndexSynchronizer>,
        index: Arc<dyn VectorIndex>,
        encoder: Arc<dyn ImageEncoder>,
        preprocessor: Arc<dyn ImagePreprocessor>,
        class_name: String,
    ) -> Self {
        Self {
            reports,
            matches,
            indexer,
            index,
            encoder,
            preprocessor,
            class_name,
        }
    }

    /// Store a new report and project it into the index.
    ///
    /// The relational insert must succeed for the call to succeed; the
    /// index write is best-effort and its outcome is returned as
    /// metadata. On index failure the report stays stored and the next
    /// reindex picks it up.
    pub async fn submit(
        &self,
        draft: NewReport,
        images: Vec<NewImage>,
    ) -> ServiceResult<SubmitOutcome> {
        if draft.reporter_id.trim().is_empty() {
            return Err(ServiceError::Validation(
                "reporter id must not be empty".to_string(),
            ));
        }
        if images.is_empty() {
            return Err(ServiceError::Validation(
                "a report needs at least one image".to_string(),
            ));
        }

        let image_count = images.len();
        let report = self.reports.add(draft, images).await?;
        info!(report_id = report.id, "Stored new report");

        let index = match self.indexer.index_reports(std::slice::from_ref(&report)).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    report_id = report.id,
                    %error,
                    "Indexing failed after submit; report will be picked up by the next reindex"
                );
                IndexOutcome {
                    successful: 0,
                    failed: image_count,
                    failed_report_ids: vec![report.id],
                }
            }
        };

        Ok(SubmitOutcome { report, index })
    }

    pub async fn get(&self, id: i32) -> ServiceResult<Report> {
        Ok(self.reports.get(id).await?)
    }

    pub async fn list(
        &self,
        filter: ReportFilter,
        page: u64,
        page_size: u64,
        order: SortOrder,
    ) -> ServiceResult<Page<Report>> {
        let request = page_request(page, page_size)?;
        Ok(self.reports.list(filter, request, order).await?)
    }

    pub async fn list_by_reporter(
        &self,
        reporter_id: &str,
        page: u64,
        page_size: u64,
    ) -> ServiceResult<Page<Report>> {
        let request = page_request(page, page_size)?;
        Ok(self.reports.list_by_reporter(reporter_id, request).await?)
    }

    /// Moderator approval; no index side effect.
    pub async fn verify(&self, id: i32) -> ServiceResult<()> {
        self.reports.set_verified(id, true).await?;
        info!(report_id = id, "Report verified");
        Ok(())
    }

    /// Propose a pairing between two unresolved reports.
    pub async fn propose_match(
        &self,
        report_id: i32,
        candidate_id: i32,
    ) -> ServiceResult<CandidateMatch> {
        if report_id == candidate_id {
            return Err(ServiceError::Validation(
                "a report cannot be matched with itself".to_string(),
            ));
        }

        for id in [report_id, candidate_id] {
            let report = self.reports.get(id).await?;
            if report.resolved {
                return Err(ServiceError::Validation(format!(
                    "report {id} is already resolved"
                )));
            }
        }

        Ok(self.matches.add(report_id, candidate_id).await?)
    }

    /// List proposed pairings, hydrated with both endpoint reports.
    ///
    /// With a report id given, returns every edge touching it on either
    /// side.
    pub async fn list_matches(
        &self,
        report_id: Option<i32>,
        page: u64,
        page_size: u64,
    ) -> ServiceResult<Page<MatchPair>> {
        let request = page_request(page, page_size)?;
        let edges = self.matches.list(report_id, request).await?;

        let mut pairs = Vec::with_capacity(edges.items.len());
        for edge in &edges.items {
            let report = self.reports.get(edge.report_id).await?;
            let candidate = self.reports.get(edge.candidate_id).await?;
            pairs.push(MatchPair {
                edge: edge.clone(),
                report,
                candidate,
            });
        }

        Ok(Page {
            items: pairs,
            total: edges.total,
            page: edges.page,
            page_size: edges.page_size,
        })
    }

    /// Withdraw one proposed pairing.
    pub async fn delete_match(&self, id: i32) -> ServiceResult<()> {
        Ok(self.matches.delete(id).await?)
    }

    /// Close a confirmed pairing.
    ///
    /// Both reports are marked resolved and every edge touching either
    /// of them is removed; those relational steps are authoritative.
    /// The index documents are then removed best-effort — a failure
    /// there is logged as drift and never undoes the resolution.
    pub async fn resolve(&self, report_id: i32, candidate_id: i32) -> ServiceResult<()> {
        self.reports.set_resolved(report_id, true).await?;
        self.matches.delete_touching(report_id).await?;
        self.reports.set_resolved(candidate_id, true).await?;
        self.matches.delete_touching(candidate_id).await?;

        for id in [report_id, candidate_id] {
            if let Err(error) = self.indexer.remove_report_documents(&[id]).await {
                warn!(
                    report_id = id,
                    %error,
                    "Index cleanup failed after resolve; documents remain until the next reindex"
                );
            }
        }

        info!(report_id, candidate_id, "Resolved matched reports");
        Ok(())
    }

    /// Delete a report outright.
    ///
    /// Images go with it via the store cascade; edges and index
    /// documents are cleaned up here.
    pub async fn delete(&self, id: i32) -> ServiceResult<()> {
        self.reports.delete(id).await?;
        self.matches.delete_touching(id).await?;

        if let Err(error) = self.indexer.remove_report_documents(&[id]).await {
            warn!(
                report_id = id,
                %error,
                "Index cleanup failed after delete; documents remain until the next reindex"
            );
        }

        info!(report_id = id, "Deleted report");
        Ok(())
    }

    /// Similarity search for counterpart reports.
    ///
    /// The query image is preprocessed and encoded, and the criteria
    /// are forced to the opposite report type: a found-animal search
    /// only ever returns lost candidates and vice versa. Resolved
    /// reports are excluded by the filter builder unconditionally.
    pub async fn search(
        &self,
        query_image: EncodableImage,
        searcher_type: ReportType,
        mut criteria: SearchCriteria,
        top_k: usize,
    ) -> ServiceResult<Vec<SearchHit>> {
        if top_k < 1 || top_k > MAX_SEARCH_RESULTS {
            return Err(ServiceError::Validation(format!(
                "top_k must be between 1 and {MAX_SEARCH_RESULTS}, got {top_k}"
            )));
        }

        let prepared = self.preprocessor.preprocess(query_image).await?;
        let vector = self.encoder.encode(&prepared).await?;

        criteria.report_type = Some(searcher_type.opposite());
        let filter = filter::search_filter(&criteria);

        let hits = self
            .index
            .query(
                &self.class_name,
                QueryRequest {
                    vector: Some(vector),
                    filter: Some(filter),
                    limit: top_k,
                    return_properties: vec![],
                },
            )
            .await?;

        hits.into_iter()
            .map(|hit| {
                let document =
                    ReportDocument::from_properties(hit.properties).map_err(|e| {
                        IndexError::InvalidResponse(format!("undecodable hit {}: {e}", hit.id))
                    })?;
                Ok(SearchHit {
                    document_id: hit.id,
                    score: hit.score,
                    document,
                })
            })
            .collect()
    }

    /// Full rebuild of the index from the system of record.
    pub async fn reindex_all(&self, page_size: u64) -> ServiceResult<IndexOutcome> {
        Ok(self.indexer.reindex_all(page_size).await?)
    }

    /// Clear the index; pair with [`reindex_all`](Self::reindex_all).
    pub async fn reset_index(&self) -> ServiceResult<u64> {
        Ok(self.indexer.reset_index().await?)
    }
}

fn page_request(page: u64, page_size: u64) -> ServiceResult<PageRequest> {
    PageRequest::new(page, page_size)
        .map_err(|error| ServiceError::Validation(error.to_string()))
}
