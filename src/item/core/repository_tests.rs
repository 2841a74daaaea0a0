use super::*;
use crate::item::entities::{Binder, Language};
use crate::store::{IndexDefinition, MemoryStore, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

async fn repository() -> IndexedRepository<Binder> {
    let store = MemoryStore::new();
    store
        .create_index("binders-v1", &IndexDefinition::default())
        .await
        .unwrap();
    store.update_alias("binders", "binders-v1").await.unwrap();
    let settings = RepositorySettings {
        retry: RetryPolicy::no_retry(),
        scroll: ScrollSettings {
            page_size: 2,
            ..ScrollSettings::default()
        },
    };
    IndexedRepository::new(
        Arc::new(store),
        IndexNames::new("binders", "binders-v1"),
        settings,
    )
}

fn binder(account: &str) -> Binder {
    Binder::new(account, Language::new("en", "Title"))
}

#[tokio::test]
async fn test_save_assigns_id_and_strips_it_from_source() {
    let repo = repository().await;
    let saved = repo.save(binder("acc-1")).await.unwrap();
    let id = saved.id.clone().unwrap();

    let hit = repo.store().get("binders", &id).await.unwrap();
    assert!(hit.source.get("id").is_none());

    let loaded = repo.get(&id).await.unwrap();
    assert_eq!(loaded, saved);
}

#[tokio::test]
async fn test_update_requires_existing_item() {
    let repo = repository().await;
    let mut ghost = binder("acc-1");
    ghost.id = Some("ghost".to_string());
    assert!(matches!(
        repo.update(ghost).await,
        Err(RepositoryError::NotFound(_))
    ));
    assert!(matches!(
        repo.update(binder("acc-1")).await,
        Err(RepositoryError::InvalidItem(_))
    ));
}

#[tokio::test]
async fn test_patch_and_delete() {
    let repo = repository().await;
    let id = repo.save(binder("acc-1")).await.unwrap().id.unwrap();
    repo.patch(&id, serde_json::json!({ "authorIds": ["u-1"] }))
        .await
        .unwrap();
    assert_eq!(repo.get(&id).await.unwrap().author_ids, vec!["u-1"]);

    repo.delete(&id).await.unwrap();
    assert!(!repo.exists(&id).await.unwrap());
    assert!(matches!(
        repo.delete(&id).await,
        Err(RepositoryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_create_only_bulk_ignores_existing() {
    let repo = repository().await;
    let existing = repo.save(binder("acc-1")).await.unwrap();
    let mut fresh = binder("acc-2");
    fresh.id = Some("fresh".to_string());

    let report = repo
        .bulk(&[existing.clone(), fresh], &[], BulkOptions::create_only())
        .await
        .unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(repo.count(&ItemFilter::new()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_bulk_reports_partial_failure() {
    let repo = repository().await;
    let id = repo.save(binder("acc-1")).await.unwrap().id.unwrap();
    let result = repo
        .bulk_operations(
            &[
                BulkOperation::Delete { id },
                BulkOperation::Delete {
                    id: "missing".to_string(),
                },
            ],
            BulkOptions::default(),
        )
        .await;
    match result {
        Err(RepositoryError::PartialBulkFailure {
            succeeded,
            failures,
        }) => {
            assert_eq!(succeeded, 1);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].id, "missing");
        }
        other => panic!("expected partial failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_scan_visits_every_page() {
    let repo = repository().await;
    for _ in 0..5 {
        repo.save(binder("acc-1")).await.unwrap();
    }
    repo.save(binder("acc-2")).await.unwrap();

    let pages = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handled = repo
        .scan(&ItemFilter::new().with_account("acc-1"), |items| {
            let pages = Arc::clone(&pages);
            let seen = Arc::clone(&seen);
            async move {
                pages.fetch_add(1, Ordering::SeqCst);
                seen.lock().await.extend(items);
                Ok(ScanControl::Continue)
            }
        })
        .await
        .unwrap();
    assert_eq!(handled, 5);
    assert_eq!(pages.load(Ordering::SeqCst), 3);
    assert!(seen.lock().await.iter().all(|b| b.account_id == "acc-1"));
}

#[tokio::test]
async fn test_scan_stops_early() {
    let repo = repository().await;
    for _ in 0..6 {
        repo.save(binder("acc-1")).await.unwrap();
    }
    let handled = repo
        .scan(&ItemFilter::new(), |_items| async { Ok(ScanControl::Stop) })
        .await
        .unwrap();
    assert_eq!(handled, 2);
}

#[tokio::test]
async fn test_duplicate_record_copies_source() {
    let repo = repository().await;
    let original = repo.save(binder("acc-1")).await.unwrap();
    let original_id = original.id.clone().unwrap();
    let copy_id = repo.duplicate_record(&original_id).await.unwrap();
    assert_ne!(copy_id, original_id);

    let copy = repo.get(&copy_id).await.unwrap();
    assert_eq!(copy.account_id, original.account_id);
    assert_eq!(copy.languages, original.languages);
}

#[tokio::test]
async fn test_missing_index_surfaces_store_error() {
    let repo: IndexedRepository<Binder> = IndexedRepository::new(
        Arc::new(MemoryStore::new()),
        IndexNames::new("binders", "binders-v1"),
        RepositorySettings::default(),
    );
    let result = repo.find(&ItemFilter::new(), &SearchOptions::default()).await;
    assert!(matches!(
        result,
        Err(RepositoryError::Store(StoreError::IndexNotFound(_)))
    ));
}
