//! Index document projection
//!
//! Each report image is projected into exactly one index document: the
//! image embedding plus a denormalized copy of the parent report's
//! filterable attributes. The property set below is a versioned contract
//! between the projection, the index class schema and the filter
//! builder; adding a filterable report field means touching all three.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::report::{AgeGroup, Report, ReportImage, ReportType, Sex};

/// Index property names.
///
/// Single source of truth for the document key set; the class schema and
/// every filter predicate refer to these.
pub mod props {
    pub const REPORT_ID: &str = "reportId";
    pub const IMAGE_ID: &str = "imageId";
    pub const TYPE: &str = "type";
    pub const RESOLVED: &str = "resolved";
    pub const VERIFIED: &str = "verified";
    pub const NAME: &str = "name";
    pub const BREED: &str = "breed";
    pub const COLOR: &str = "color";
    pub const SIZE: &str = "size";
    pub const SEX: &str = "sex";
    pub const AGE_GROUP: &str = "ageGroup";
    pub const CHIP_NUMBER: &str = "chipNumber";
    pub const LOCATION: &str = "location";
    pub const EXTRA_DETAILS: &str = "extraDetails";
    pub const EVENT_DATE: &str = "eventDate";
    pub const IMAGE_PAYLOAD: &str = "imagePayload";
    pub const IMAGE_CONTENT_TYPE: &str = "imageContentType";
}

/// Namespace for name-based document ids.
///
/// Fixed for the lifetime of the deployment. Changing it would orphan
/// every existing document on the next reindex.
pub const DOCUMENT_NAMESPACE: Uuid = Uuid::from_bytes([
    0x8f, 0x2b, 0x5a, 0xee, 0x43, 0xf1, 0x4b, 0x0f, 0x9a, 0x70, 0x5c, 0x1e, 0x7f, 0x9f, 0x2d, 0x6b,
]);

/// Deterministic document id for a (report, image) pair.
///
/// A v5 UUID over the pair, so re-deriving it for the same image always
/// yields the same id across processes and restarts. Upserting under
/// this id makes re-indexing a no-op instead of a duplicate.
pub fn document_id(report_id: i32, image_id: i32) -> Uuid {
    Uuid::new_v5(
        &DOCUMENT_NAMESPACE,
        format!("{report_id}/{image_id}").as_bytes(),
    )
}

/// One report image as it is stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub report_id: i32,
    pub image_id: i32,

    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub resolved: bool,
    pub verified: bool,

    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub age_group: Option<AgeGroup>,
    #[serde(default)]
    pub chip_number: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub extra_details: Option<String>,

    /// Day of the loss/find as `YYYY-MM-DD`
    #[serde(default)]
    pub event_date: Option<String>,

    /// Base64 image bytes, kept so hits can be displayed without a
    /// second store round trip
    pub image_payload: String,
    pub image_content_type: String,
}

impl ReportDocument {
    /// Project one image of a report into its index document.
    pub fn project(report: &Report, image: &ReportImage) -> Self {
        Self {
            report_id: report.id,
            image_id: image.id,
            report_type: report.report_type,
            resolved: report.resolved,
            verified: report.verified,
            name: report.profile.name.clone(),
            breed: report.profile.breed.clone(),
            color: report.profile.color.clone(),
            size: report.profile.size.clone(),
            sex: report.profile.sex,
            age_group: report.profile.age_group,
            chip_number: report.profile.chip_number.clone(),
            location: report.profile.location.clone(),
            extra_details: report.profile.extra_details.clone(),
            event_date: report.event_date.map(|d| d.to_string()),
            image_payload: image.payload.clone(),
            image_content_type: image.content_type.clone(),
        }
    }

    /// The deterministic id this document is stored under.
    pub fn id(&self) -> Uuid {
        document_id(self.report_id, self.image_id)
    }

    /// Flatten into the index property map.
    ///
    /// Absent optional attributes are stored as explicit nulls so every
    /// document carries the full key set.
    pub fn into_properties(self) -> Map<String, Value> {
        fn opt(value: Option<String>) -> Value {
            value.map(Value::String).unwrap_or(Value::Null)
        }

        let mut map = Map::new();
        map.insert(props::REPORT_ID.to_owned(), Value::from(self.report_id));
        map.insert(props::IMAGE_ID.to_owned(), Value::from(self.image_id));
        map.insert(
            props::TYPE.to_owned(),
            Value::String(self.report_type.to_string()),
        );
        map.insert(props::RESOLVED.to_owned(), Value::Bool(self.resolved));
        map.insert(props::VERIFIED.to_owned(), Value::Bool(self.verified));
        map.insert(props::NAME.to_owned(), opt(self.name));
        map.insert(props::BREED.to_owned(), opt(self.breed));
        map.insert(props::COLOR.to_owned(), opt(self.color));
        map.insert(props::SIZE.to_owned(), opt(self.size));
        map.insert(
            props::SEX.to_owned(),
            opt(self.sex.map(|s| s.to_string())),
        );
        map.insert(
            props::AGE_GROUP.to_owned(),
            opt(self.age_group.map(|a| a.to_string())),
        );
        map.insert(props::CHIP_NUMBER.to_owned(), opt(self.chip_number));
        map.insert(props::LOCATION.to_owned(), opt(self.location));
        map.insert(props::EXTRA_DETAILS.to_owned(), opt(self.extra_details));
        map.insert(props::EVENT_DATE.to_owned(), opt(self.event_date));
        map.insert(
            props::IMAGE_PAYLOAD.to_owned(),
            Value::String(self.image_payload),
        );
        map.insert(
            props::IMAGE_CONTENT_TYPE.to_owned(),
            Value::String(self.image_content_type),
        );
        map
    }

    /// Rebuild a document from index-returned properties.
    pub fn from_properties(properties: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(properties))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::{AnimalProfile, ContactDetails};
    use chrono::{NaiveDate, Utc};

    fn sample_report() -> Report {
        Report {
            id: 42,
            reporter_id: "reporter-1".to_string(),
            report_type: ReportType::Lost,
            resolved: false,
            verified: true,
            profile: AnimalProfile {
                name: Some("Rex".to_string()),
                breed: Some("Labrador".to_string()),
                sex: Some(Sex::Male),
                age_group: Some(AgeGroup::Adult),
                ..AnimalProfile::default()
            },
            contact: ContactDetails::default(),
            event_date: NaiveDate::from_ymd_opt(2024, 6, 25),
            images: vec![],
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn sample_image() -> ReportImage {
        ReportImage {
            id: 7,
            report_id: 42,
            payload: "aGVsbG8=".to_string(),
            content_type: "image/webp".to_string(),
        }
    }

    #[test]
    fn test_document_id_is_stable() {
        let a = document_id(42, 7);
        let b = document_id(42, 7);
        assert_eq!(a, b);
        assert_ne!(a, document_id(42, 8));
        assert_ne!(a, document_id(7, 42));
    }

    #[test]
    fn test_projection_property_set_is_complete() {
        let doc = ReportDocument::project(&sample_report(), &sample_image());
        let map = doc.into_properties();

        let expected = [
            props::REPORT_ID,
            props::IMAGE_ID,
            props::TYPE,
            props::RESOLVED,
            props::VERIFIED,
            props::NAME,
            props::BREED,
            props::COLOR,
            props::SIZE,
            props::SEX,
            props::AGE_GROUP,
            props::CHIP_NUMBER,
            props::LOCATION,
            props::EXTRA_DETAILS,
            props::EVENT_DATE,
            props::IMAGE_PAYLOAD,
            props::IMAGE_CONTENT_TYPE,
        ];
        assert_eq!(map.len(), expected.len());
        for name in expected {
            assert!(map.contains_key(name), "missing property {name}");
        }
    }

    #[test]
    fn test_projection_values() {
        let doc = ReportDocument::project(&sample_report(), &sample_image());
        let map = doc.into_properties();

        assert_eq!(map[props::REPORT_ID], Value::from(42));
        assert_eq!(map[props::IMAGE_ID], Value::from(7));
        assert_eq!(map[props::TYPE], Value::from("lost"));
        assert_eq!(map[props::RESOLVED], Value::from(false));
        assert_eq!(map[props::VERIFIED], Value::from(true));
        assert_eq!(map[props::SEX], Value::from("male"));
        assert_eq!(map[props::AGE_GROUP], Value::from("adult"));
        assert_eq!(map[props::EVENT_DATE], Value::from("2024-06-25"));
        assert_eq!(map[props::COLOR], Value::Null);
    }

    #[test]
    fn test_properties_round_trip() {
        let doc = ReportDocument::project(&sample_report(), &sample_image());
        let restored = ReportDocument::from_properties(doc.clone().into_properties()).unwrap();
        assert_eq!(restored, doc);
    }
}
