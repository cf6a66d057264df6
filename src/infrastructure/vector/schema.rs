//! Index class schema
//!
//! The class definition the index is expected to carry, plus the
//! compatibility check `ensure_schema` runs against whatever is live.
//! Compatibility is judged property-by-property on name and data type;
//! a mismatch is surfaced, never repaired by dropping the class.

use serde::{Deserialize, Serialize};

use crate::domain::document::props;

/// Index-side data types, named as the index names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Text,
    Int,
    Number,
    Boolean,
    Date,
    Blob,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Text => "text",
            PropertyType::Int => "int",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::Date => "date",
            PropertyType::Blob => "blob",
        }
    }
}

/// One property of the class definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    pub data_type: PropertyType,
}

impl PropertySpec {
    pub fn new(name: &str, data_type: PropertyType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
        }
    }
}

/// A class definition: name, property set, vector dimensionality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSchema {
    pub class_name: String,
    pub properties: Vec<PropertySpec>,

    /// Embedding length every stored vector must have
    pub dimension: usize,
}

impl ClassSchema {
    /// Check a live class against this wanted definition.
    ///
    /// Every wanted property must exist in the live class with the same
    /// data type. Extra live properties are tolerated; they belong to a
    /// newer projection version and filtering simply ignores them.
    pub fn incompatibilities(&self, live: &ClassSchema) -> Vec<String> {
        let mut problems = Vec::new();

        if live.class_name != self.class_name {
            problems.push(format!(
                "class name mismatch: wanted {}, live {}",
                self.class_name, live.class_name
            ));
        }

        for wanted in &self.properties {
            match live.properties.iter().find(|p| p.name == wanted.name) {
                None => problems.push(format!("missing property {}", wanted.name)),
                Some(found) if found.data_type != wanted.data_type => problems.push(format!(
                    "property {} has type {}, wanted {}",
                    wanted.name,
                    found.data_type.as_str(),
                    wanted.data_type.as_str()
                )),
                Some(_) => {}
            }
        }

        problems
    }
}

/// The report-image class definition.
///
/// Mirrors the projection in `domain::document`; the two change
/// together.
pub fn report_class(class_name: &str, dimension: usize) -> ClassSchema {
    use PropertyType::*;

    ClassSchema {
        class_name: class_name.to_string(),
        properties: vec![
            PropertySpec::new(props::REPORT_ID, Int),
            PropertySpec::new(props::IMAGE_ID, Int),
            PropertySpec::new(props::TYPE, Text),
            PropertySpec::new(props::RESOLVED, Boolean),
            PropertySpec::new(props::VERIFIED, Boolean),
            PropertySpec::new(props::NAME, Text),
            PropertySpec::new(props::BREED, Text),
            PropertySpec::new(props::COLOR, Text),
            PropertySpec::new(props::SIZE, Text),
            PropertySpec::new(props::SEX, Text),
            PropertySpec::new(props::AGE_GROUP, Text),
            PropertySpec::new(props::CHIP_NUMBER, Text),
            PropertySpec::new(props::LOCATION, Text),
            PropertySpec::new(props::EXTRA_DETAILS, Text),
            PropertySpec::new(props::EVENT_DATE, Text),
            PropertySpec::new(props::IMAGE_PAYLOAD, Blob),
            PropertySpec::new(props::IMAGE_CONTENT_TYPE, Text),
        ],
        dimension,
    }
}
