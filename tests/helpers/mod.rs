//! Shared test fixtures: a temp-dir backed core with the embedded
//! index backend and a scripted encoder.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use pawfinder_core::config::CoreConfig;
use pawfinder_core::domain::{
    AnimalProfile, ContactDetails, NewImage, NewReport, ReportType,
};
use pawfinder_core::infrastructure::vector::QueryRequest;
use pawfinder_core::services::{
    EmbeddingError, EncodableImage, ImageEncoder, PassthroughPreprocessor,
};
use pawfinder_core::Core;

pub const DIMENSION: usize = 4;

/// Encoder scripted through the image payload itself: a payload of
/// comma-separated floats becomes that vector, and the payload "FAIL"
/// simulates a model failure for partial-failure tests.
pub struct ScriptedEncoder;

#[async_trait]
impl ImageEncoder for ScriptedEncoder {
    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn encode(&self, image: &EncodableImage) -> Result<Vec<f32>, EmbeddingError> {
        if image.payload == "FAIL" {
            return Err(EmbeddingError::Model("scripted failure".to_string()));
        }

        let mut vector: Vec<f32> = image
            .payload
            .split(',')
            .map(|part| {
                part.trim()
                    .parse()
                    .map_err(|_| EmbeddingError::InvalidImage(image.payload.clone()))
            })
            .collect::<Result<_, _>>()?;
        vector.resize(DIMENSION, 0.0);
        Ok(vector)
    }
}

pub struct TestContext {
    pub core: Core,
    // Held for the lifetime of the test; the database lives inside.
    _data_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        let data_dir = TempDir::new().expect("temp dir");
        let mut config = CoreConfig::default_with_dir(data_dir.path().to_path_buf());
        config.embedding.dimension = DIMENSION;

        let core = Core::open(
            config,
            Arc::new(ScriptedEncoder),
            Arc::new(PassthroughPreprocessor),
        )
        .await
        .expect("core open");

        Self {
            core,
            _data_dir: data_dir,
        }
    }

    /// Every document currently stored in the index.
    pub async fn document_count(&self) -> usize {
        self.core
            .index
            .query(
                &self.core.config().index.class_name,
                QueryRequest {
                    vector: None,
                    filter: None,
                    limit: 1000,
                    return_properties: vec!["reportId".to_string()],
                },
            )
            .await
            .expect("index query")
            .len()
    }
}

pub fn new_report(reporter_id: &str, report_type: ReportType) -> NewReport {
    NewReport {
        reporter_id: reporter_id.to_string(),
        report_type,
        profile: AnimalProfile::default(),
        contact: ContactDetails::default(),
        event_date: None,
    }
}

pub fn labrador(reporter_id: &str, report_type: ReportType) -> NewReport {
    let mut draft = new_report(reporter_id, report_type);
    draft.profile.breed = Some("Labrador".to_string());
    draft
}

pub fn image(vector: &str) -> NewImage {
    NewImage {
        payload: vector.to_string(),
        content_type: "text/plain".to_string(),
    }
}

/// An [`EncodableImage`] query in the same scripted form.
pub fn query_image(vector: &str) -> EncodableImage {
    EncodableImage {
        payload: vector.to_string(),
        content_type: "text/plain".to_string(),
    }
}
