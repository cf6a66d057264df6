//! Report and candidate-match repositories
//!
//! All relational access goes through these two types. Multi-statement
//! writes run inside a single transaction and either commit fully or
//! roll back fully; nothing here leaves a half-applied change visible
//! to other readers.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbErr, EntityTrait, LoaderTrait, ModelTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;

use super::entities::{self, candidate_match, report, report_image};
use super::Database;
use crate::domain::{
    AnimalProfile, CandidateMatch, ContactDetails, NewImage, NewReport, Page, PageRequest, Report,
    ReportFilter, ReportImage, SortOrder,
};

/// Relational store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    #[error("corrupt {column} value in row {id}: {value:?}")]
    Corrupt {
        column: &'static str,
        id: i32,
        value: String,
    },

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// System-of-record access for reports and their images.
pub struct ReportRepository {
    db: Arc<Database>,
}

impl ReportRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a report and all its images as one unit of work.
    ///
    /// Returns the stored report with assigned ids. Rolls back fully on
    /// any failure.
    pub async fn add(&self, draft: NewReport, images: Vec<NewImage>) -> StoreResult<Report> {
        let txn = self.db.conn().begin().await?;
        let now = Utc::now();

        let report_model = report::ActiveModel {
            reporter_id: Set(draft.reporter_id.clone()),
            report_type: Set(draft.report_type.to_string()),
            resolved: Set(false),
            verified: Set(false),
            name: Set(draft.profile.name.clone()),
            breed: Set(draft.profile.breed.clone()),
            color: Set(draft.profile.color.clone()),
            size: Set(draft.profile.size.clone()),
            sex: Set(draft.profile.sex.map(|s| s.to_string())),
            age_group: Set(draft.profile.age_group.map(|a| a.to_string())),
            chip_number: Set(draft.profile.chip_number.clone()),
            location: Set(draft.profile.location.clone()),
            extra_details: Set(draft.profile.extra_details.clone()),
            contact_name: Set(draft.contact.name.clone()),
            contact_phone: Set(draft.contact.phone.clone()),
            contact_email: Set(draft.contact.email.clone()),
            contact_address: Set(draft.contact.address.clone()),
            event_date: Set(draft.event_date),
            created_at: Set(now),
            updated_at: Set(None),
            ..Default::default()
        };
        let report_record = report_model.insert(&txn).await?;

        let mut image_records = Vec::with_capacity(images.len());
        for image in images {
            let image_model = report_image::ActiveModel {
                report_id: Set(report_record.id),
                payload: Set(image.payload),
                content_type: Set(image.content_type),
                created_at: Set(now),
                ..Default::default()
            };
            image_records.push(image_model.insert(&txn).await?);
        }

        txn.commit().await?;

        debug!(
            report_id = report_record.id,
            images = image_records.len(),
            "Stored new report"
        );

        report_to_domain(report_record, image_records)
    }

    /// Fetch one report with its images.
    pub async fn get(&self, id: i32) -> StoreResult<Report> {
        let conn = self.db.conn();
        let record = entities::Report::find_by_id(id)
            .one(conn)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "report",
                id,
            })?;

        let images = record.find_related(entities::ReportImage).all(conn).await?;
        report_to_domain(record, images)
    }

    /// Fetch several reports by id, skipping ids that do not exist.
    pub async fn get_many(&self, ids: &[i32]) -> StoreResult<Vec<Report>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.db.conn();
        let records = entities::Report::find()
            .filter(report::Column::Id.is_in(ids.iter().copied()))
            .all(conn)
            .await?;
        let images = records.load_many(entities::ReportImage, conn).await?;

        records
            .into_iter()
            .zip(images)
            .map(|(record, images)| report_to_domain(record, images))
            .collect()
    }

    /// List reports matching `filter`, ordered by id.
    ///
    /// The returned total reflects the filter before pagination.
    pub async fn list(
        &self,
        filter: ReportFilter,
        page: PageRequest,
        order: SortOrder,
    ) -> StoreResult<Page<Report>> {
        let condition = filter_condition(&filter);
        self.list_where(condition, page, order).await
    }

    /// List one reporter's reports, oldest first.
    pub async fn list_by_reporter(
        &self,
        reporter_id: &str,
        page: PageRequest,
    ) -> StoreResult<Page<Report>> {
        let condition = Condition::all().add(report::Column::ReporterId.eq(reporter_id));
        self.list_where(condition, page, SortOrder::Asc).await
    }

    async fn list_where(
        &self,
        condition: Condition,
        page: PageRequest,
        order: SortOrder,
    ) -> StoreResult<Page<Report>> {
        let conn = self.db.conn();
        let query = entities::Report::find().filter(condition);

        let total = query.clone().count(conn).await?;
        let records = query
            .order_by(report::Column::Id, sort_to_order(order))
            .offset(page.offset())
            .limit(page.page_size())
            .all(conn)
            .await?;
        let images = records.load_many(entities::ReportImage, conn).await?;

        let items = records
            .into_iter()
            .zip(images)
            .map(|(record, images)| report_to_domain(record, images))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            page: page.page(),
            page_size: page.page_size(),
        })
    }

    /// Flip the resolved flag on one report.
    pub async fn set_resolved(&self, id: i32, resolved: bool) -> StoreResult<()> {
        self.update_flag(id, |active| active.resolved = Set(resolved))
            .await
    }

    /// Flip the verified flag on one report.
    pub async fn set_verified(&self, id: i32, verified: bool) -> StoreResult<()> {
        self.update_flag(id, |active| active.verified = Set(verified))
            .await
    }

    async fn update_flag(
        &self,
        id: i32,
        apply: impl FnOnce(&mut report::ActiveModel),
    ) -> StoreResult<()> {
        let conn = self.db.conn();
        let record = entities::Report::find_by_id(id)
            .one(conn)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "report",
                id,
            })?;

        let mut active: report::ActiveModel = record.into();
        apply(&mut active);
        active.updated_at = Set(Some(Utc::now()));
        active.update(conn).await?;
        Ok(())
    }

    /// Delete a report; its images go with it via the cascade.
    ///
    /// Candidate-match edges are NOT touched here; callers clean those
    /// up through [`MatchRepository::delete_touching`].
    pub async fn delete(&self, id: i32) -> StoreResult<()> {
        let result = entities::Report::delete_by_id(id)
            .exec(self.db.conn())
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound {
                entity: "report",
                id,
            });
        }
        debug!(report_id = id, "Deleted report");
        Ok(())
    }
}

/// Access to candidate-match edges.
///
/// Edges are stored directed but queried undirected: every lookup and
/// cleanup here matches a report on either endpoint column.
pub struct MatchRepository {
    db: Arc<Database>,
}

impl MatchRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store one proposed pairing after checking both endpoints exist.
    pub async fn add(&self, report_id: i32, candidate_id: i32) -> StoreResult<CandidateMatch> {
        let txn = self.db.conn().begin().await?;

        for id in [report_id, candidate_id] {
            let exists = entities::Report::find_by_id(id).one(&txn).await?.is_some();
            if !exists {
                txn.rollback().await?;
                return Err(StoreError::NotFound {
                    entity: "report",
                    id,
                });
            }
        }

        let edge_model = candidate_match::ActiveModel {
            report_id: Set(report_id),
            candidate_id: Set(candidate_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let record = edge_model.insert(&txn).await?;

        txn.commit().await?;

        debug!(report_id, candidate_id, "Stored candidate match");
        Ok(edge_to_domain(record))
    }

    /// List edges, optionally only those touching one report.
    pub async fn list(
        &self,
        report_id: Option<i32>,
        page: PageRequest,
    ) -> StoreResult<Page<CandidateMatch>> {
        let conn = self.db.conn();
        let mut query = entities::CandidateMatch::find();
        if let Some(id) = report_id {
            query = query.filter(touching_condition(id));
        }

        let total = query.clone().count(conn).await?;
        let records = query
            .order_by(candidate_match::Column::Id, Order::Asc)
            .offset(page.offset())
            .limit(page.page_size())
            .all(conn)
            .await?;

        Ok(Page {
            items: records.into_iter().map(edge_to_domain).collect(),
            total,
            page: page.page(),
            page_size: page.page_size(),
        })
    }

    /// Delete one edge by id.
    pub async fn delete(&self, id: i32) -> StoreResult<()> {
        let result = entities::CandidateMatch::delete_by_id(id)
            .exec(self.db.conn())
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound {
                entity: "candidate match",
                id,
            });
        }
        Ok(())
    }

    /// Delete every edge with the given report on either side.
    ///
    /// Returns the number of edges removed; deleting zero is a normal
    /// outcome, so overlapping cleanups stay idempotent.
    pub async fn delete_touching(&self, report_id: i32) -> StoreResult<u64> {
        let result = entities::CandidateMatch::delete_many()
            .filter(touching_condition(report_id))
            .exec(self.db.conn())
            .await?;
        if result.rows_affected > 0 {
            debug!(
                report_id,
                removed = result.rows_affected,
                "Removed candidate matches touching report"
            );
        }
        Ok(result.rows_affected)
    }
}

fn filter_condition(filter: &ReportFilter) -> Condition {
    let mut condition = Condition::all();
    if let Some(report_type) = filter.report_type {
        condition = condition.add(report::Column::ReportType.eq(report_type.to_string()));
    }
    if let Some(resolved) = filter.resolved {
        condition = condition.add(report::Column::Resolved.eq(resolved));
    }
    if let Some(verified) = filter.verified {
        condition = condition.add(report::Column::Verified.eq(verified));
    }
    condition
}

fn touching_condition(report_id: i32) -> Condition {
    Condition::any()
        .add(candidate_match::Column::ReportId.eq(report_id))
        .add(candidate_match::Column::CandidateId.eq(report_id))
}

fn sort_to_order(order: SortOrder) -> Order {
    match order {
        SortOrder::Asc => Order::Asc,
        SortOrder::Desc => Order::Desc,
    }
}

fn report_to_domain(
    record: report::Model,
    images: Vec<report_image::Model>,
) -> StoreResult<Report> {
    let report_type = parse_stored(&record.report_type, "report_type", record.id)?;
    let sex = record
        .sex
        .as_deref()
        .map(|v| parse_stored(v, "sex", record.id))
        .transpose()?;
    let age_group = record
        .age_group
        .as_deref()
        .map(|v| parse_stored(v, "age_group", record.id))
        .transpose()?;

    Ok(Report {
        id: record.id,
        reporter_id: record.reporter_id,
        report_type,
        resolved: record.resolved,
        verified: record.verified,
        profile: AnimalProfile {
            name: record.name,
            breed: record.breed,
            color: record.color,
            size: record.size,
            sex,
            age_group,
            chip_number: record.chip_number,
            location: record.location,
            extra_details: record.extra_details,
        },
        contact: ContactDetails {
            name: record.contact_name,
            phone: record.contact_phone,
            email: record.contact_email,
            address: record.contact_address,
        },
        event_date: record.event_date,
        images: images.into_iter().map(image_to_domain).collect(),
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

fn image_to_domain(record: report_image::Model) -> ReportImage {
    ReportImage {
        id: record.id,
        report_id: record.report_id,
        payload: record.payload,
        content_type: record.content_type,
    }
}

fn edge_to_domain(record: candidate_match::Model) -> CandidateMatch {
    CandidateMatch {
        id: record.id,
        report_id: record.report_id,
        candidate_id: record.candidate_id,
        created_at: record.created_at,
    }
}

fn parse_stored<T: FromStr>(value: &str, column: &'static str, id: i32) -> StoreResult<T> {
    value.parse().map_err(|_| StoreError::Corrupt {
        column,
        id,
        value: value.to_string(),
    })
}
