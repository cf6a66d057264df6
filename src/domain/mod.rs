//! Domain types shared across the store, index and service layers

pub mod candidate_match;
pub mod document;
pub mod report;

pub use candidate_match::{CandidateMatch, MatchPair};
pub use document::{document_id, ReportDocument};
pub use report::{
    AgeGroup, AnimalProfile, ContactDetails, NewImage, NewReport, Page, PageRequest, Report,
    ReportFilter, ReportImage, ReportType, SearchCriteria, Sex, SortOrder,
};
