//! Candidate match edges
//!
//! A candidate match is a proposed pairing of two reports (typically one
//! lost, one found) awaiting human confirmation. It is stored as a single
//! row but treated as undirected everywhere: listing and cleanup both
//! consider an edge to touch a report whether it sits on the `report_id`
//! or the `candidate_id` side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::report::Report;

/// A stored candidate match edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMatch {
    /// Store-assigned identifier
    pub id: i32,

    /// Report the proposal was made from
    pub report_id: i32,

    /// Report proposed as its counterpart
    pub candidate_id: i32,

    pub created_at: DateTime<Utc>,
}

/// A candidate match hydrated with both endpoint reports for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchPair {
    pub edge: CandidateMatch,
    pub report: Report,
    pub candidate: Report,
}
