//! SQLite store tests against an in-memory database.

#![cfg(feature = "sqlite")]

use chrono::{Duration, Utc};
use sitewatch::{
    traits::backend::FetchedPage, Backend, BatchProcessor, ContentSnapshot, FallbackPolicy, PassWriter,
    SnapshotStore, SqliteStore, StatusDetermination, StatusStore, StoreError, Target, TargetPass,
    TargetRegistry, TargetStatus, TestScenario, UrlRecord, UrlRole,
};

async fn store() -> SqliteStore {
    SqliteStore::in_memory().await.unwrap()
}

fn determination(target: &Target, status: TargetStatus, confidence: f32) -> StatusDetermination {
    StatusDetermination {
        id: Default::default(),
        target_id: target.id,
        status,
        confidence,
        explanation: format!("{} for testing", status),
        signals: Vec::new(),
        determined_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_targets_and_urls_round_trip() {
    let store = store().await;
    let acme = Target::new("Acme");
    let globex = Target::new("Globex");
    store.register_target(&acme).await.unwrap();
    store.register_target(&globex).await.unwrap();

    store
        .register_url(&UrlRecord::new(acme.id, "https://acme.test/", UrlRole::Homepage))
        .await
        .unwrap();
    store
        .register_url(&UrlRecord::new(acme.id, "https://acme.test/old", UrlRole::Other).inactive())
        .await
        .unwrap();
    store
        .register_url(&UrlRecord::new(acme.id, "https://acme.test/careers", UrlRole::Careers))
        .await
        .unwrap();

    let targets = store.list_targets(None).await.unwrap();
    assert_eq!(
        targets.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        vec!["Acme", "Globex"]
    );
    assert_eq!(store.list_targets(Some(1)).await.unwrap().len(), 1);

    let urls = store.active_urls(acme.id).await.unwrap();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0].url, "https://acme.test/");
    assert_eq!(urls[1].role, UrlRole::Careers);

    let loaded = store.get_target(acme.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, TargetStatus::Unknown);
}

#[tokio::test]
async fn test_register_url_requires_target() {
    let store = store().await;
    let orphan = Target::new("Orphan");
    let err = store
        .register_url(&UrlRecord::new(orphan.id, "https://orphan.test/", UrlRole::Homepage))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::TargetNotFound { .. }));
}

#[tokio::test]
async fn test_latest_non_empty_snapshot() {
    let store = store().await;
    let target = Target::new("Acme");
    store.register_target(&target).await.unwrap();
    let record = UrlRecord::new(target.id, "https://acme.test/", UrlRole::Homepage);
    store.register_url(&record).await.unwrap();

    let now = Utc::now();
    let older = FetchedPage::new(&record.url, "Older text")
        .with_fetched_at(now - Duration::days(10))
        .into_snapshot(record.id, Backend::Fast);
    let newer = FetchedPage::new(&record.url, "Newer text")
        .with_markup("<p>Newer text</p>")
        .with_fetched_at(now - Duration::days(2))
        .into_snapshot(record.id, Backend::Heavy);
    let blank = FetchedPage::new(&record.url, "  ")
        .with_fetched_at(now - Duration::hours(1))
        .into_snapshot(record.id, Backend::Fast);
    let error_page = FetchedPage::new(&record.url, "Server error")
        .with_status(500)
        .with_fetched_at(now - Duration::hours(2))
        .into_snapshot(record.id, Backend::Fast);

    for snapshot in [&older, &newer, &blank, &error_page] {
        store.insert_snapshot(snapshot).await.unwrap();
    }

    let found = store
        .latest_non_empty_snapshot(record.id, &FallbackPolicy::default(), now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, newer.id);
    assert_eq!(found.content, "Newer text");
    assert_eq!(found.markup.as_deref(), Some("<p>Newer text</p>"));
    assert_eq!(found.backend, Backend::Heavy);
    assert_eq!(found.metadata.http_status, Some(200));

    // Failed responses count when not restricted to successes
    let any = store
        .latest_non_empty_snapshot(record.id, &FallbackPolicy::unbounded(), now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(any.id, error_page.id);

    // Nothing recent enough
    let recent_only = FallbackPolicy::default().with_max_age_days(Some(1));
    assert!(store
        .latest_non_empty_snapshot(record.id, &recent_only, now)
        .await
        .unwrap()
        .is_none());

    assert_eq!(store.snapshots_for_url(record.id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_determination_history_is_append_only() {
    let store = store().await;
    let target = Target::new("Acme");
    store.register_target(&target).await.unwrap();

    let first = determination(&target, TargetStatus::Operational, 0.7);
    let mut second = determination(&target, TargetStatus::LikelyClosed, 0.9);
    second.determined_at = first.determined_at + Duration::seconds(5);

    store.append_determination(&first).await.unwrap();
    store.append_determination(&second).await.unwrap();

    let history = store.determinations_for_target(target.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, TargetStatus::Operational);
    assert_eq!(history[1].status, TargetStatus::LikelyClosed);

    let latest = store.latest_determination(target.id).await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);
    assert_eq!(latest.determined_at, second.determined_at);

    let current = store.get_target(target.id).await.unwrap().unwrap();
    assert_eq!(current.status, TargetStatus::LikelyClosed);
    assert_eq!(current.confidence, 0.9);
    assert_eq!(current.last_processed_at, Some(second.determined_at));
}

#[tokio::test]
async fn test_commit_pass_rolls_back_on_missing_target() {
    let store = store().await;
    let known = Target::new("Known");
    store.register_target(&known).await.unwrap();
    let record = UrlRecord::new(known.id, "https://known.test/", UrlRole::Homepage);
    store.register_url(&record).await.unwrap();

    let ghost = Target::new("Ghost");
    let pass = TargetPass {
        snapshots: vec![ContentSnapshot::from_failure(
            record.id,
            &record.url,
            Backend::Fast,
            "connection refused",
            Utc::now(),
        )],
        determination: Some(determination(&ghost, TargetStatus::Operational, 0.5)),
    };

    let err = store.commit_pass(&pass).await.unwrap_err();
    assert!(matches!(err, StoreError::TargetNotFound { .. }));
    assert!(store.snapshots_for_url(record.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_batch_over_sqlite_records_history() {
    let url = "https://acme.test/";
    let scenario = TestScenario::new()
        .with_target("Acme", &[(url, UrlRole::Homepage)])
        .with_fast_page(FetchedPage::new(url, "We are hiring! Join our team."));
    let store = store().await;
    scenario.seed(&store).await.unwrap();
    let processor = BatchProcessor::new(store, scenario.scraper());

    processor.process_batch(scenario.targets()).await.unwrap();
    processor.process_batch(scenario.targets()).await.unwrap();

    let target = scenario.target("Acme").unwrap();
    let history = processor
        .store()
        .determinations_for_target(target.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|d| d.status == TargetStatus::Operational));

    let url_id = scenario.urls_for("Acme")[0].id;
    assert_eq!(processor.store().snapshots_for_url(url_id).await.unwrap().len(), 2);
}
