//! Candidate match entity
//!
//! One row per proposed pairing. The row is directed (report -> candidate)
//! but every query over it must treat the edge as undirected; see
//! `repository::MatchRepository`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "candidate_matches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub report_id: i32,
    pub candidate_id: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::report::Entity",
        from = "Column::ReportId",
        to = "super::report::Column::Id"
    )]
    Report,
    #[sea_orm(
        belongs_to = "super::report::Entity",
        from = "Column::CandidateId",
        to = "super::report::Column::Id"
    )]
    Candidate,
}

impl ActiveModelBehavior for ActiveModel {}
