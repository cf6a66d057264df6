//! Sea-ORM entity definitions
//!
//! These map our domain models to database tables.

pub mod candidate_match;
pub mod report;
pub mod report_image;

// Re-export all entities
pub use candidate_match::Entity as CandidateMatch;
pub use report::Entity as Report;
pub use report_image::Entity as ReportImage;
