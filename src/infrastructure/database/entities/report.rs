//! Report entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub reporter_id: String,
    pub report_type: String, // "lost" or "found"
    pub resolved: bool,
    pub verified: bool,

    // Animal attributes, all optional free text except the enums
    pub name: Option<String>,
    pub breed: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub sex: Option<String>,       // "male" or "female"
    pub age_group: Option<String>, // "puppy", "adult" or "senior"
    pub chip_number: Option<String>,
    pub location: Option<String>,
    pub extra_details: Option<String>,

    // Reporter contact details
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub contact_address: Option<String>,

    pub event_date: Option<Date>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::report_image::Entity")]
    ReportImage,
}

impl Related<super::report_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReportImage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
