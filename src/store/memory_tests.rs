use super::*;
use serde_json::json;
use tempfile::TempDir;

async fn store_with_docs(count: usize) -> MemoryStore {
    let store = MemoryStore::new();
    store
        .create_index("items-v1", &IndexDefinition::default())
        .await
        .unwrap();
    store.update_alias("items", "items-v1").await.unwrap();
    let operations: Vec<BulkOperation> = (0..count)
        .map(|i| BulkOperation::Index {
            id: Some(format!("doc-{i:04}")),
            document: json!({ "n": i, "accountId": "acc-1" }),
        })
        .collect();
    store
        .bulk("items", &operations, Refresh::WaitFor)
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_get_through_alias() {
    let store = store_with_docs(3).await;
    let hit = store.get("items", "doc-0001").await.unwrap();
    assert_eq!(hit.index, "items-v1");
    assert_eq!(hit.source["n"], 1);

    let missing = store.get("items", "nope").await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_unknown_index_is_an_error() {
    let store = MemoryStore::new();
    let result = store.search("ghost", &SearchRequest::match_all()).await;
    assert!(matches!(result, Err(StoreError::IndexNotFound(_))));
}

#[tokio::test]
async fn test_create_reports_duplicates_per_item() {
    let store = store_with_docs(2).await;
    let response = store
        .bulk(
            "items",
            &[
                BulkOperation::Create {
                    id: "doc-0000".to_string(),
                    document: json!({ "n": 99 }),
                },
                BulkOperation::Create {
                    id: "doc-new".to_string(),
                    document: json!({ "n": 100 }),
                },
            ],
            Refresh::None,
        )
        .await
        .unwrap();
    let statuses: Vec<_> = response.items.iter().map(|i| i.status.clone()).collect();
    assert_eq!(
        statuses,
        vec![BulkItemStatus::AlreadyExists, BulkItemStatus::Ok]
    );
    // The existing document is untouched
    let hit = store.get("items", "doc-0000").await.unwrap();
    assert_eq!(hit.source["n"], 0);
}

#[tokio::test]
async fn test_partial_update_merges_fields() {
    let store = store_with_docs(1).await;
    store
        .bulk(
            "items",
            &[
                BulkOperation::Update {
                    id: "doc-0000".to_string(),
                    partial: json!({ "hasPublications": true }),
                },
                BulkOperation::Update {
                    id: "missing".to_string(),
                    partial: json!({ "hasPublications": true }),
                },
            ],
            Refresh::WaitFor,
        )
        .await
        .unwrap();
    let hit = store.get("items", "doc-0000").await.unwrap();
    assert_eq!(hit.source["hasPublications"], true);
    assert_eq!(hit.source["accountId"], "acc-1");
}

#[tokio::test]
async fn test_scroll_pages_in_order() {
    let store = store_with_docs(250).await;
    let settings = ScrollSettings {
        page_size: 100,
        keep_alive: Duration::from_secs(60),
    };
    let first = store
        .open_scroll("items", &SearchRequest::match_all(), &settings)
        .await
        .unwrap();
    assert_eq!(first.total, 250);
    assert_eq!(first.hits.len(), 100);
    assert_eq!(first.hits[0].id, "doc-0000");

    let second = store
        .next_scroll(&first.scroll_id, settings.keep_alive)
        .await
        .unwrap();
    assert_eq!(second.hits.len(), 100);
    assert_eq!(second.hits[0].id, "doc-0100");

    let third = store
        .next_scroll(&first.scroll_id, settings.keep_alive)
        .await
        .unwrap();
    assert_eq!(third.hits.len(), 50);

    let done = store
        .next_scroll(&first.scroll_id, settings.keep_alive)
        .await
        .unwrap();
    assert!(done.hits.is_empty());
}

#[tokio::test]
async fn test_idle_cursor_expires() {
    let store = store_with_docs(20).await;
    let settings = ScrollSettings {
        page_size: 5,
        keep_alive: Duration::from_millis(10),
    };
    let first = store
        .open_scroll("items", &SearchRequest::match_all(), &settings)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    let result = store
        .next_scroll(&first.scroll_id, settings.keep_alive)
        .await;
    assert!(matches!(result, Err(StoreError::CursorExpired(_))));
}

#[tokio::test]
async fn test_cleared_cursor_is_gone() {
    let store = store_with_docs(20).await;
    let first = store
        .open_scroll(
            "items",
            &SearchRequest::match_all(),
            &ScrollSettings {
                page_size: 5,
                keep_alive: Duration::from_secs(60),
            },
        )
        .await
        .unwrap();
    store.clear_scroll(&first.scroll_id).await.unwrap();
    let result = store
        .next_scroll(&first.scroll_id, Duration::from_secs(60))
        .await;
    assert!(matches!(result, Err(StoreError::CursorExpired(_))));
}

#[tokio::test]
async fn test_search_sort_and_size() {
    let store = store_with_docs(10).await;
    let hits = store
        .search(
            "items",
            &SearchRequest::match_all().sorted_by("n", false).with_size(3),
        )
        .await
        .unwrap();
    let ns: Vec<_> = hits.iter().map(|h| h.source["n"].clone()).collect();
    assert_eq!(ns, vec![json!(9), json!(8), json!(7)]);
}

#[tokio::test]
async fn test_alias_swap_is_single_step() {
    let store = store_with_docs(5).await;
    store
        .create_index("items-v2", &IndexDefinition::default())
        .await
        .unwrap();
    store.update_alias("items", "items-v2").await.unwrap();
    assert_eq!(
        store.resolve_alias("items").await.unwrap(),
        vec!["items-v2".to_string()]
    );
    assert_eq!(store.count("items", &Query::MatchAll).await.unwrap(), 0);
    assert_eq!(store.count("items-v1", &Query::MatchAll).await.unwrap(), 5);
}

#[tokio::test]
async fn test_reindex_task_copies_documents() {
    let store = store_with_docs(12).await;
    store
        .create_index("items-v2", &IndexDefinition::default())
        .await
        .unwrap();
    let task_id = store.start_reindex("items-v1", "items-v2").await.unwrap();
    let status = store.task_status(&task_id).await.unwrap();
    assert!(status.completed);
    assert_eq!(status.created, 12);
    assert_eq!(store.count("items-v2", &Query::MatchAll).await.unwrap(), 12);
}

#[tokio::test]
async fn test_snapshot_round_trip_through_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state").join("store.json");
    let store = store_with_docs(4).await;
    store.save(&path).await.unwrap();

    let loaded = MemoryStore::load(&path).await.unwrap();
    assert_eq!(loaded.snapshot().await, store.snapshot().await);
    assert_eq!(loaded.count("items", &Query::MatchAll).await.unwrap(), 4);
}

#[tokio::test]
async fn test_load_missing_snapshot_starts_empty() {
    let temp = TempDir::new().unwrap();
    let store = MemoryStore::load(&temp.path().join("absent.json"))
        .await
        .unwrap();
    assert!(store.snapshot().await.indices.is_empty());
}
