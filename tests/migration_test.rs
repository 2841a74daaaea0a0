#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use binders_repository::migration::{
    DataMigration, MigrationAbort, MigrationError, MigrationReport, MigrationRunner, Migrator,
    RewriteImageUrls, SourceQuery, TransformedDocument, DEFAULT_COVER, LEGACY_PLACEHOLDER_COVER,
};
use binders_repository::store::{
    BulkOperation, DocumentStore, Hit, IndexDefinition, MemoryStore, Query, Refresh, RetryPolicy,
    ScrollSettings,
};
use serde_json::{json, Value};
use std::future::ready;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn seeded_store(count: usize) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .create_index("legacy-v1", &IndexDefinition::default())
        .await
        .unwrap();
    let operations: Vec<BulkOperation> = (0..count)
        .map(|n| BulkOperation::Index {
            id: Some(format!("doc-{n}")),
            document: json!({ "title": format!("Document {n}"), "n": n }),
        })
        .collect();
    store
        .bulk("legacy-v1", &operations, Refresh::WaitFor)
        .await
        .unwrap();
    store
        .create_index("current-v1", &IndexDefinition::default())
        .await
        .unwrap();
    store
}

fn migrator(store: &Arc<MemoryStore>, page_size: usize) -> Migrator {
    Migrator::new(
        store.clone(),
        ScrollSettings {
            page_size,
            keep_alive: Duration::from_secs(60),
        },
        RetryPolicy::no_retry(),
    )
}

fn upgrade(hit: Hit) -> Result<Option<TransformedDocument>, MigrationError> {
    let mut data = hit.source;
    data["schemaVersion"] = json!(2);
    Ok(Some(TransformedDocument::with_id(hit.id, data)))
}

#[tokio::test]
async fn test_overwrite_migration_is_idempotent() {
    let store = seeded_store(7).await;
    let migrator = migrator(&store, 3);
    let source = SourceQuery::all("legacy-v1");

    let first = migrator
        .migrate(&source, |hit| ready(upgrade(hit)), "current-v1", true)
        .await
        .expect("First run should succeed");
    assert_eq!(first.read, 7);
    assert_eq!(first.written, 7);
    assert_eq!(first.pages, 3);
    assert!(first.is_complete());

    let second = migrator
        .migrate(&source, |hit| ready(upgrade(hit)), "current-v1", true)
        .await
        .unwrap();
    assert_eq!(second.written, 7);

    assert_eq!(store.count("current-v1", &Query::MatchAll).await.unwrap(), 7);
    let doc = store.get("current-v1", "doc-4").await.unwrap();
    assert_eq!(doc.source["schemaVersion"], 2);
    assert_eq!(doc.source["n"], 4);
}

#[tokio::test]
async fn test_create_only_migration_reports_duplicates() {
    let store = seeded_store(4).await;
    let migrator = migrator(&store, 2);
    let source = SourceQuery::all("legacy-v1");

    migrator
        .migrate(&source, |hit| ready(upgrade(hit)), "current-v1", false)
        .await
        .unwrap();
    let rerun = migrator
        .migrate(&source, |hit| ready(upgrade(hit)), "current-v1", false)
        .await
        .unwrap();

    assert_eq!(rerun.written, 0);
    assert_eq!(rerun.duplicates, 4);
    assert!(rerun.failures.is_empty());
    assert_eq!(store.count("current-v1", &Query::MatchAll).await.unwrap(), 4);
}

#[tokio::test]
async fn test_transform_can_skip_records() {
    let store = seeded_store(6).await;
    let migrator = migrator(&store, 4);

    let report = migrator
        .migrate(
            &SourceQuery::all("legacy-v1"),
            |hit| {
                let keep = hit.source["n"].as_u64().unwrap_or(0) % 2 == 0;
                ready(if keep { upgrade(hit) } else { Ok(None) })
            },
            "current-v1",
            true,
        )
        .await
        .unwrap();

    assert_eq!(report.read, 6);
    assert_eq!(report.written, 3);
    assert_eq!(report.skipped, 3);
}

#[tokio::test]
async fn test_transform_error_stops_migration() {
    let store = seeded_store(3).await;
    let migrator = migrator(&store, 10);

    let result = migrator
        .migrate(
            &SourceQuery::all("legacy-v1"),
            |hit| {
                ready(if hit.id == "doc-1" {
                    Err(MigrationError::Transform {
                        id: hit.id,
                        message: "unsupported layout".to_string(),
                    })
                } else {
                    upgrade(hit)
                })
            },
            "current-v1",
            true,
        )
        .await;

    assert!(matches!(result, Err(MigrationError::Transform { ref id, .. }) if id == "doc-1"));
}

#[tokio::test]
async fn test_abort_stops_after_current_page() {
    let store = seeded_store(10).await;
    let abort = MigrationAbort::new();
    let migrator = migrator(&store, 3).with_abort(&abort);

    let report = migrator
        .migrate(
            &SourceQuery::all("legacy-v1"),
            |hit| {
                abort.abort();
                ready(upgrade(hit))
            },
            "current-v1",
            true,
        )
        .await
        .unwrap();

    assert!(report.aborted);
    assert_eq!(report.pages, 1);
    assert_eq!(report.written, 3);
    assert!(!report.is_complete());
}

#[tokio::test]
async fn test_expired_cursor_fails_migration() {
    let store = seeded_store(5).await;
    let migrator = Migrator::new(
        store.clone(),
        ScrollSettings {
            page_size: 2,
            keep_alive: Duration::from_millis(10),
        },
        RetryPolicy::no_retry(),
    );

    let result = migrator
        .migrate(
            &SourceQuery::all("legacy-v1"),
            |hit| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                upgrade(hit)
            },
            "current-v1",
            true,
        )
        .await;

    assert!(matches!(result, Err(MigrationError::CursorExpired(_))));
}

struct CountingMigration {
    runs: AtomicUsize,
}

#[async_trait::async_trait]
impl DataMigration for CountingMigration {
    fn name(&self) -> &str {
        "2024-01-add-schema-version"
    }

    fn description(&self) -> &str {
        "Stamp schema version 2 on legacy documents"
    }

    async fn run(&self, migrator: &Migrator) -> Result<MigrationReport, MigrationError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        migrator
            .migrate(
                &SourceQuery::all("legacy-v1"),
                |hit| ready(upgrade(hit)),
                "current-v1",
                true,
            )
            .await
    }
}

#[tokio::test]
async fn test_runner_skips_applied_migrations() {
    let store = seeded_store(2).await;
    let counting = Arc::new(CountingMigration {
        runs: AtomicUsize::new(0),
    });
    let runner = MigrationRunner::new(migrator(&store, 5)).register(counting.clone());

    let first = runner.run_pending().await.unwrap();
    assert_eq!(first.applied, vec!["2024-01-add-schema-version".to_string()]);
    let second = runner.run_pending().await.unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(second.skipped, vec!["2024-01-add-schema-version".to_string()]);
    assert_eq!(counting.runs.load(Ordering::SeqCst), 1);

    let ledger = runner.applied().await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].written, 2);
}

#[tokio::test]
async fn test_rewrite_image_urls_through_runner() {
    let store = Arc::new(MemoryStore::new());
    store
        .create_index("binders-v1", &IndexDefinition::default())
        .await
        .unwrap();
    store.update_alias("binders", "binders-v1").await.unwrap();
    let operations = [
        BulkOperation::Index {
            id: Some("b1".to_string()),
            document: json!({
                "thumbnail": { "medium": LEGACY_PLACEHOLDER_COVER },
                "modules": { "images": { "chunked": [{ "key": "i1", "chunks": [
                    ["http://old-cdn.example.com/img-1/original"]
                ]}]}}
            }),
        },
        BulkOperation::Index {
            id: Some("b2".to_string()),
            document: json!({ "thumbnail": { "medium": "https://new-cdn.example.com/img-2" } }),
        },
    ];
    store.bulk("binders", &operations, Refresh::WaitFor).await.unwrap();

    let rewrite = RewriteImageUrls::new(
        vec!["binders".to_string()],
        "^http://old-cdn\\.example\\.com/",
        "https://new-cdn.example.com/",
    )
    .unwrap();
    let summary = MigrationRunner::new(migrator(&store, 10))
        .register(Arc::new(rewrite))
        .run_pending()
        .await
        .unwrap();
    assert_eq!(summary.applied.len(), 1);

    let b1 = store.get("binders", "b1").await.unwrap().source;
    assert_eq!(b1["thumbnail"]["medium"], Value::from(DEFAULT_COVER));
    assert_eq!(
        b1["modules"]["images"]["chunked"][0]["chunks"][0][0],
        "https://new-cdn.example.com/img-1/original"
    );
    let b2 = store.get("binders", "b2").await.unwrap().source;
    assert_eq!(b2["thumbnail"]["medium"], "https://new-cdn.example.com/img-2");
}
