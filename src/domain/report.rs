//! Report domain model
//!
//! A report is a single lost-or-found animal posting together with its
//! photos. The relational store owns these records; everything the vector
//! index holds is a projection derived from them (see `document`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Hard cap on `page_size` for every paginated listing.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Which side of the lost/found exchange a report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReportType {
    Lost,
    Found,
}

impl ReportType {
    /// The side a similarity search for this report runs against.
    ///
    /// A found animal is only ever matched with lost reports and vice
    /// versa.
    pub fn opposite(self) -> Self {
        match self {
            ReportType::Lost => ReportType::Found,
            ReportType::Found => ReportType::Lost,
        }
    }
}

/// Animal sex as reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Sex {
    Male,
    Female,
}

/// Coarse age bracket used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AgeGroup {
    Puppy,
    Adult,
    Senior,
}

/// Descriptive attributes of the animal itself.
///
/// All fields are optional free text except the enumerated ones; whatever
/// is present is copied verbatim into the index projection so it can be
/// used as a search filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimalProfile {
    /// Animal's name, if known
    pub name: Option<String>,

    /// Breed description
    pub breed: Option<String>,

    /// Dominant color(s)
    pub color: Option<String>,

    /// Free-form size description (e.g. "small", "30cm")
    pub size: Option<String>,

    /// Sex, if determinable
    pub sex: Option<Sex>,

    /// Age bracket, if determinable
    pub age_group: Option<AgeGroup>,

    /// Microchip number (15 digits when present)
    pub chip_number: Option<String>,

    /// Where the animal was lost or found
    pub location: Option<String>,

    /// Anything else the reporter wants to add
    pub extra_details: Option<String>,
}

/// How to reach the person who filed the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// A photo attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportImage {
    /// Store-assigned identifier
    pub id: i32,

    /// Owning report
    pub report_id: i32,

    /// Base64-encoded image bytes
    pub payload: String,

    /// MIME type of the decoded payload
    pub content_type: String,
}

/// A stored report with its images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Store-assigned identifier
    pub id: i32,

    /// Identifier of the submitting user
    pub reporter_id: String,

    /// Lost or found
    pub report_type: ReportType,

    /// True once the report has been matched and closed
    pub resolved: bool,

    /// True once a moderator has approved the report for listing
    pub verified: bool,

    /// Animal description
    pub profile: AnimalProfile,

    /// Reporter contact details
    pub contact: ContactDetails,

    /// Day the animal was lost or found
    pub event_date: Option<NaiveDate>,

    /// Attached photos
    pub images: Vec<ReportImage>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A new report as submitted, before the store assigns ids.
///
/// Reports always start unresolved and unverified; those flags are not
/// part of the submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub reporter_id: String,
    pub report_type: ReportType,
    pub profile: AnimalProfile,
    pub contact: ContactDetails,
    pub event_date: Option<NaiveDate>,
}

/// A new photo as submitted alongside a [`NewReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewImage {
    /// Base64-encoded image bytes
    pub payload: String,

    /// MIME type of the decoded payload
    pub content_type: String,
}

/// Attribute filter for report listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub report_type: Option<ReportType>,
    pub resolved: Option<bool>,
    pub verified: Option<bool>,
}

impl ReportFilter {
    /// Filter selecting every unresolved report, used by the reindex job.
    pub fn unresolved() -> Self {
        Self {
            resolved: Some(false),
            ..Self::default()
        }
    }
}

/// Sort direction for paginated listings, always keyed by id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// A validated pagination request.
///
/// `page` is 1-based. Construction enforces `page >= 1` and
/// `1 <= page_size <= MAX_PAGE_SIZE` so the store layer never sees an
/// unbounded query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Result<Self, InvalidPageRequest> {
        if page < 1 {
            return Err(InvalidPageRequest::Page(page));
        }
        if page_size < 1 || page_size > MAX_PAGE_SIZE {
            return Err(InvalidPageRequest::PageSize(page_size));
        }
        Ok(Self { page, page_size })
    }

    /// First page with the given size.
    pub fn first(page_size: u64) -> Result<Self, InvalidPageRequest> {
        Self::new(1, page_size)
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Row offset of the first item on this page.
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }

    /// The request for the page after this one.
    pub fn next(&self) -> Self {
        Self {
            page: self.page + 1,
            page_size: self.page_size,
        }
    }
}

/// Rejected pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPageRequest {
    #[error("page must be >= 1, got {0}")]
    Page(u64),

    #[error("page size must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
    PageSize(u64),
}

/// One page of a listing, with the pre-pagination total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Items on this page, in the requested order
    pub items: Vec<T>,

    /// Total matching items across all pages
    pub total: u64,

    /// 1-based page number this slice came from
    pub page: u64,

    /// Requested page size (the last page may hold fewer items)
    pub page_size: u64,
}

impl<T> Page<T> {
    /// Number of pages needed to cover `total` at this page size.
    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(self.page_size)
    }

    /// Whether a page after this one exists.
    pub fn has_next(&self) -> bool {
        self.page < self.page_count()
    }
}

/// Structured attribute criteria accompanying a similarity search.
///
/// Every present field becomes an equality predicate on the corresponding
/// index property; absent fields are simply not filtered on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub report_type: Option<ReportType>,
    pub name: Option<String>,
    pub breed: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub sex: Option<Sex>,
    pub age_group: Option<AgeGroup>,
    pub chip_number: Option<String>,
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_type_opposite() {
        assert_eq!(ReportType::Lost.opposite(), ReportType::Found);
        assert_eq!(ReportType::Found.opposite(), ReportType::Lost);
    }

    #[test]
    fn test_report_type_string_forms() {
        assert_eq!(ReportType::Lost.to_string(), "lost");
        assert_eq!("found".parse::<ReportType>(), Ok(ReportType::Found));
        assert!("stolen".parse::<ReportType>().is_err());
    }

    #[test]
    fn test_page_request_bounds() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, MAX_PAGE_SIZE + 1).is_err());

        let req = PageRequest::new(3, 25).unwrap();
        assert_eq!(req.offset(), 50);
        assert_eq!(req.next().page(), 4);
    }

    #[test]
    fn test_page_count() {
        let page = Page::<i32> {
            items: vec![],
            total: 101,
            page: 1,
            page_size: 25,
        };
        assert_eq!(page.page_count(), 5);
        assert!(page.has_next());

        let last = Page::<i32> {
            items: vec![],
            total: 101,
            page: 5,
            page_size: 25,
        };
        assert!(!last.has_next());
    }
}
