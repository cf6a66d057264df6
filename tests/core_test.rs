//! Composition root tests: startup wiring, config persistence and
//! clean shutdown.

mod helpers;

use std::sync::Arc;

use tempfile::TempDir;

use pawfinder_core::config::CoreConfig;
use pawfinder_core::services::PassthroughPreprocessor;
use pawfinder_core::Core;

use helpers::{ScriptedEncoder, TestContext, DIMENSION};

#[tokio::test]
async fn test_open_and_shutdown() {
    let ctx = TestContext::new().await;
    ctx.core.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_config_is_persisted_and_reloaded() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().to_path_buf();

    let mut config = CoreConfig::default_with_dir(data_dir.clone());
    config.embedding.dimension = DIMENSION;
    config.save().unwrap();

    let reloaded = CoreConfig::load_or_create(&data_dir).unwrap();
    assert_eq!(reloaded, config);
}

#[tokio::test]
async fn test_reopen_preserves_data() {
    let dir = TempDir::new().unwrap();
    let mut config = CoreConfig::default_with_dir(dir.path().to_path_buf());
    config.embedding.dimension = DIMENSION;

    let report_id = {
        let core = Core::open(
            config.clone(),
            Arc::new(ScriptedEncoder),
            Arc::new(PassthroughPreprocessor),
        )
        .await
        .unwrap();

        let stored = core
            .matching
            .submit(
                helpers::new_report("alice", pawfinder_core::domain::ReportType::Lost),
                vec![helpers::image("1,0,0,0")],
            )
            .await
            .unwrap()
            .report;
        core.shutdown().await.unwrap();
        stored.id
    };

    let core = Core::open(
        config,
        Arc::new(ScriptedEncoder),
        Arc::new(PassthroughPreprocessor),
    )
    .await
    .unwrap();
    let fetched = core.matching.get(report_id).await.unwrap();
    assert_eq!(fetched.reporter_id, "alice");
    core.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dimension_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = CoreConfig::default_with_dir(dir.path().to_path_buf());
    // Default config expects 512; the scripted encoder produces 4.
    assert_ne!(config.embedding.dimension, DIMENSION);

    let result = Core::open(
        config,
        Arc::new(ScriptedEncoder),
        Arc::new(PassthroughPreprocessor),
    )
    .await;
    assert!(result.is_err());
}
