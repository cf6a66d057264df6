//! Relational store tests: transactional insert, pagination, flag
//! updates and the undirected candidate-match model.

mod helpers;

use std::collections::HashSet;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use pawfinder_core::domain::{
    NewImage, PageRequest, ReportFilter, ReportType, SortOrder,
};
use pawfinder_core::infrastructure::database::repository::{
    MatchRepository, ReportRepository, StoreError,
};
use pawfinder_core::infrastructure::database::Database;

use helpers::{image, new_report};

async fn open_repos() -> (Arc<Database>, ReportRepository, MatchRepository, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(
        Database::open_or_create(&dir.path().join("test.db"))
            .await
            .unwrap(),
    );
    db.migrate().await.unwrap();
    (
        db.clone(),
        ReportRepository::new(db.clone()),
        MatchRepository::new(db),
        dir,
    )
}

#[tokio::test]
async fn test_add_and_get_round_trip() {
    let (_db, reports, _matches, _dir) = open_repos().await;

    let mut draft = new_report("alice", ReportType::Lost);
    draft.profile.breed = Some("Beagle".to_string());
    draft.profile.chip_number = Some("123456789012345".to_string());
    draft.contact.email = Some("alice@example.com".to_string());

    let stored = reports
        .add(draft.clone(), vec![image("1,0,0,0"), image("0,1,0,0")])
        .await
        .unwrap();
    assert!(!stored.resolved);
    assert!(!stored.verified);
    assert_eq!(stored.images.len(), 2);

    let fetched = reports.get(stored.id).await.unwrap();
    assert_eq!(fetched.reporter_id, draft.reporter_id);
    assert_eq!(fetched.report_type, draft.report_type);
    assert_eq!(fetched.profile, draft.profile);
    assert_eq!(fetched.contact, draft.contact);
    assert_eq!(fetched.images.len(), 2);
    assert_eq!(fetched.images[0].payload, "1,0,0,0");
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let (_db, reports, _matches, _dir) = open_repos().await;
    let result = reports.get(999).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_pagination_is_complete_and_ordered() {
    let (_db, reports, _matches, _dir) = open_repos().await;

    let total = 23u64;
    for i in 0..total {
        reports
            .add(
                new_report(&format!("reporter-{i}"), ReportType::Lost),
                vec![image("1,0,0,0")],
            )
            .await
            .unwrap();
    }

    for order in [SortOrder::Asc, SortOrder::Desc] {
        let page_size = 5;
        let mut request = PageRequest::first(page_size).unwrap();
        let mut seen = HashSet::new();
        let mut ids_in_order = Vec::new();

        loop {
            let page = reports
                .list(ReportFilter::default(), request, order)
                .await
                .unwrap();
            assert_eq!(page.total, total);
            for report in &page.items {
                assert!(seen.insert(report.id), "duplicate id {}", report.id);
                ids_in_order.push(report.id);
            }
            if !page.has_next() {
                break;
            }
            request = request.next();
        }

        assert_eq!(seen.len() as u64, total);
        let mut sorted = ids_in_order.clone();
        match order {
            SortOrder::Asc => sorted.sort(),
            SortOrder::Desc => sorted.sort_by(|a, b| b.cmp(a)),
        }
        assert_eq!(ids_in_order, sorted);
    }
}

#[tokio::test]
async fn test_list_filters_and_total_reflect_filter() {
    let (_db, reports, _matches, _dir) = open_repos().await;

    let mut stored = Vec::new();
    for report_type in [ReportType::Lost, ReportType::Lost, ReportType::Found] {
        stored.push(
            reports
                .add(new_report("r", report_type), vec![image("1,0,0,0")])
                .await
                .unwrap(),
        );
    }
    reports.set_resolved(stored[0].id, true).await.unwrap();

    let filter = ReportFilter {
        report_type: Some(ReportType::Lost),
        ..ReportFilter::default()
    };
    let page = reports
        .list(filter, PageRequest::first(10).unwrap(), SortOrder::Asc)
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    let unresolved = reports
        .list(
            ReportFilter::unresolved(),
            PageRequest::first(10).unwrap(),
            SortOrder::Asc,
        )
        .await
        .unwrap();
    assert_eq!(unresolved.total, 2);
    assert!(unresolved.items.iter().all(|r| !r.resolved));
}

#[tokio::test]
async fn test_list_by_reporter() {
    let (_db, reports, _matches, _dir) = open_repos().await;

    for reporter in ["alice", "bob", "alice"] {
        reports
            .add(new_report(reporter, ReportType::Found), vec![image("1,0,0,0")])
            .await
            .unwrap();
    }

    let page = reports
        .list_by_reporter("alice", PageRequest::first(10).unwrap())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|r| r.reporter_id == "alice"));
}

#[tokio::test]
async fn test_set_resolved_missing_is_not_found() {
    let (_db, reports, _matches, _dir) = open_repos().await;
    assert!(matches!(
        reports.set_resolved(42, true).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_delete_cascades_images() {
    let (db, reports, _matches, _dir) = open_repos().await;

    let stored = reports
        .add(
            new_report("alice", ReportType::Lost),
            vec![image("1,0,0,0"), image("0,1,0,0")],
        )
        .await
        .unwrap();

    reports.delete(stored.id).await.unwrap();
    assert!(matches!(
        reports.get(stored.id).await,
        Err(StoreError::NotFound { .. })
    ));

    use sea_orm::EntityTrait;
    let orphans =
        pawfinder_core::infrastructure::database::entities::ReportImage::find()
            .all(db.conn())
            .await
            .unwrap();
    assert!(orphans.is_empty());
}

#[tokio::test]
async fn test_candidate_match_requires_both_endpoints() {
    let (_db, reports, matches, _dir) = open_repos().await;

    let a = reports
        .add(new_report("alice", ReportType::Lost), vec![image("1,0,0,0")])
        .await
        .unwrap();

    assert!(matches!(
        matches.add(a.id, 999).await,
        Err(StoreError::NotFound { .. })
    ));
    assert!(matches!(
        matches.add(999, a.id).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_candidate_match_listing_is_symmetric() {
    let (_db, reports, matches, _dir) = open_repos().await;

    let a = reports
        .add(new_report("alice", ReportType::Lost), vec![image("1,0,0,0")])
        .await
        .unwrap();
    let b = reports
        .add(new_report("bob", ReportType::Found), vec![image("0,1,0,0")])
        .await
        .unwrap();

    let edge = matches.add(a.id, b.id).await.unwrap();

    // The proposal is visible from both endpoints.
    for id in [a.id, b.id] {
        let page = matches
            .list(Some(id), PageRequest::first(10).unwrap())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, edge.id);
    }

    let unrelated = matches
        .list(Some(999), PageRequest::first(10).unwrap())
        .await
        .unwrap();
    assert_eq!(unrelated.total, 0);
}

#[tokio::test]
async fn test_delete_touching_is_symmetric_and_idempotent() {
    let (_db, reports, matches, _dir) = open_repos().await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(
            reports
                .add(new_report("r", ReportType::Lost), vec![image("1,0,0,0")])
                .await
                .unwrap()
                .id,
        );
    }

    // Edges from and to the middle report, plus one unrelated edge.
    matches.add(ids[0], ids[1]).await.unwrap();
    matches.add(ids[1], ids[2]).await.unwrap();
    matches.add(ids[0], ids[2]).await.unwrap();

    let removed = matches.delete_touching(ids[1]).await.unwrap();
    assert_eq!(removed, 2);

    let remaining = matches.list(None, PageRequest::first(10).unwrap()).await.unwrap();
    assert_eq!(remaining.total, 1);
    assert_eq!(remaining.items[0].report_id, ids[0]);
    assert_eq!(remaining.items[0].candidate_id, ids[2]);

    // Deleting again removes nothing and is not an error.
    assert_eq!(matches.delete_touching(ids[1]).await.unwrap(), 0);
}
