//! Index synchronizer
//!
//! Projects reports into the vector index and removes them again. The
//! index is a derived view of the relational store; everything here is
//! built to be safely re-runnable, with `reindex_all` as the repair
//! path when the two stores drift apart.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{PageRequest, Report, ReportDocument, ReportFilter, SortOrder};
use crate::infrastructure::database::repository::{ReportRepository, StoreError};
use crate::infrastructure::vector::{DocumentUpsert, IndexError, VectorIndex};
use crate::services::embedding::{EncodableImage, ImageEncoder, ImagePreprocessor};

/// Failures that stop a synchronizer call outright.
///
/// Per-report problems never surface here; they land in the
/// [`IndexOutcome`] instead.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type IndexerResult<T> = Result<T, IndexerError>;

/// Aggregate result of an indexing pass.
///
/// `successful` and `failed` count documents (one per image);
/// `failed_report_ids` lists the distinct reports affected. A report
/// whose embedding fails counts all of its images as failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOutcome {
    pub successful: usize,
    pub failed: usize,
    pub failed_report_ids: Vec<i32>,
}

impl IndexOutcome {
    pub fn merge(&mut self, other: IndexOutcome) {
        self.successful += other.successful;
        self.failed += other.failed;
        for id in other.failed_report_ids {
            if !self.failed_report_ids.contains(&id) {
                self.failed_report_ids.push(id);
            }
        }
    }

    fn record_failure(&mut self, report_id: i32, images: usize) {
        self.failed += images;
        if !self.failed_report_ids.contains(&report_id) {
            self.failed_report_ids.push(report_id);
        }
    }
}

pub struct IndexSynchronizer {
    reports: Arc<ReportRepository>,
    index: Arc<dyn VectorIndex>,
    encoder: Arc<dyn ImageEncoder>,
    preprocessor: Arc<dyn ImagePreprocessor>,
    class_name: String,
}

impl IndexSynchronizer {
    pub fn new(
        reports: Arc<ReportRepository>,
        index: Arc<dyn VectorIndex>,
        encoder: Arc<dyn ImageEncoder>,
        preprocessor: Arc<dyn ImagePreprocessor>,
        class_name: String,
    ) -> Self {
        Self {
            reports,
            index,
            encoder,
            preprocessor,
            class_name,
        }
    }

    /// Project the given reports into the index.
    ///
    /// Each report's images are preprocessed and batch-encoded, then
    /// every image becomes one document under its deterministic id. A
    /// report that fails to embed is recorded and skipped; its siblings
    /// still go through. Re-running over already-indexed reports
    /// upserts in place and produces no duplicates.
    pub async fn index_reports(&self, reports: &[Report]) -> IndexerResult<IndexOutcome> {
        let mut outcome = IndexOutcome::default();
        let mut documents = Vec::new();
        let mut document_owner: HashMap<Uuid, i32> = HashMap::new();

        for report in reports {
            if report.images.is_empty() {
                continue;
            }
            match self.embed_report(report).await {
                Ok(vectors) => {
                    for (image, vector) in report.images.iter().zip(vectors) {
                        let document = ReportDocument::project(report, image);
                        let id = document.id();
                        document_owner.insert(id, report.id);
                        documents.push(DocumentUpsert {
                            id,
                            vector,
                            properties: document.into_properties(),
                        });
                    }
                }
                Err(error) => {
                    warn!(report_id = report.id, %error, "Failed to embed report images");
                    outcome.record_failure(report.id, report.images.len());
                }
            }
        }

        if documents.is_empty() {
            return Ok(outcome);
        }

        let batch = self
            .index
            .upsert_batch(&self.class_name, documents)
            .await?;

        outcome.successful += batch.successful;
        outcome.failed += batch.failed;
        for item in batch.failed_items {
            if let Some(report_id) = document_owner.get(&item.id) {
                if !outcome.failed_report_ids.contains(report_id) {
                    outcome.failed_report_ids.push(*report_id);
                }
                warn!(
                    report_id,
                    document_id = %item.id,
                    reason = %item.reason,
                    "Index rejected document"
                );
            }
        }

        debug!(
            successful = outcome.successful,
            failed = outcome.failed,
            "Indexed report documents"
        );
        Ok(outcome)
    }

    /// Delete every document belonging to the given reports.
    pub async fn remove_report_documents(&self, report_ids: &[i32]) -> IndexerResult<u64> {
        if report_ids.is_empty() {
            return Ok(0);
        }
        let values: Vec<i64> = report_ids.iter().map(|id| *id as i64).collect();
        let removed = self
            .index
            .delete_where_in(
                &self.class_name,
                crate::domain::document::props::REPORT_ID,
                &values,
            )
            .await?;
        debug!(reports = report_ids.len(), removed, "Removed report documents");
        Ok(removed)
    }

    /// Rebuild the index from the system of record.
    ///
    /// Pages through every unresolved report and feeds each page through
    /// [`index_reports`](Self::index_reports). Idempotent; run it to
    /// repair drift after best-effort writes failed.
    pub async fn reindex_all(&self, page_size: u64) -> IndexerResult<IndexOutcome> {
        let mut outcome = IndexOutcome::default();
        let filter = ReportFilter::unresolved();

        let page_size = page_size.clamp(1, crate::domain::report::MAX_PAGE_SIZE);
        let mut request = PageRequest::first(page_size).expect("clamped page size is valid");
        let first = self.reports.list(filter, request, SortOrder::Asc).await?;
        let page_count = first.page_count();
        info!(
            total = first.total,
            pages = page_count,
            "Starting full reindex of unresolved reports"
        );

        outcome.merge(self.index_reports(&first.items).await?);

        for _ in 1..page_count {
            request = request.next();
            let page = self.reports.list(filter, request, SortOrder::Asc).await?;
            outcome.merge(self.index_reports(&page.items).await?);
        }

        info!(
            successful = outcome.successful,
            failed = outcome.failed,
            "Full reindex finished"
        );
        Ok(outcome)
    }

    /// Drop every stored document, keeping the class definition.
    ///
    /// Maintenance path; follow with [`reindex_all`](Self::reindex_all)
    /// to rebuild from the system of record.
    pub async fn reset_index(&self) -> IndexerResult<u64> {
        let removed = self.index.delete_all_documents(&self.class_name).await?;
        info!(removed, "Cleared the report index");
        Ok(removed)
    }

    async fn embed_report(
        &self,
        report: &Report,
    ) -> Result<Vec<Vec<f32>>, crate::services::embedding::EmbeddingError> {
        let mut prepared = Vec::with_capacity(report.images.len());
        for image in &report.images {
            let encodable = EncodableImage {
                payload: image.payload.clone(),
                content_type: image.content_type.clone(),
            };
            prepared.push(self.preprocessor.preprocess(encodable).await?);
        }
        self.encoder.encode_batch(&prepared).await
    }
}
