#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use binders_repository::item::lifecycle::purge_expired;
use binders_repository::item::repositories::PublicationFilter;
use binders_repository::item::SearchOptions;
use binders_repository::{RepositoryError, TreeOperations};
use common::{create_binder, create_collection, doc_ref, setup, ACCOUNT};
use std::time::Duration;

#[tokio::test]
async fn test_purge_removes_expired_items_and_their_traces() {
    let fx = setup().await;
    let tree = TreeOperations::new(&fx.repos, 16);
    let doomed = create_binder(&fx.repos).await;
    let survivor = create_binder(&fx.repos).await;
    let doomed_id = doomed.id.clone().unwrap();
    let parent = create_collection(&fx.repos, "Parent", vec![doc_ref(&doomed), doc_ref(&survivor)]).await;
    let parent_id = parent.id.clone().unwrap();
    tree.publish(&doomed_id, "en", None).await.unwrap();
    tree.unpublish(&doomed_id, &[]).await.unwrap();
    tree.soft_delete_item(&doomed_id, Some("user-1")).await.unwrap();

    let report = purge_expired(&fx.repos, Duration::ZERO)
        .await
        .expect("Purge should succeed");

    assert_eq!(report.binders, 1);
    assert_eq!(report.collections, 0);
    assert_eq!(report.publications, 1);
    assert_eq!(report.parents_cleaned, 1);
    assert!(matches!(
        fx.repos.binders.get_binder(&doomed_id).await,
        Err(RepositoryError::NotFound(_))
    ));
    let publications = fx
        .repos
        .publications
        .find_publications(&PublicationFilter::for_binders([doomed_id.as_str()]), &SearchOptions::default())
        .await
        .unwrap();
    assert!(publications.is_empty());
    let parent = fx.repos.collections.get_collection(&parent_id).await.unwrap();
    assert_eq!(parent.elements, vec![doc_ref(&survivor)]);
    assert!(parent.deleted_elements.is_empty());
    assert_eq!(fx.repos.binders.count_binders(ACCOUNT).await.unwrap(), 1);
}

#[tokio::test]
async fn test_purge_keeps_items_within_retention() {
    let fx = setup().await;
    let tree = TreeOperations::new(&fx.repos, 16);
    let binder = create_binder(&fx.repos).await;
    let collection = create_collection(&fx.repos, "Recent", vec![]).await;
    tree.soft_delete_item(binder.id.as_deref().unwrap(), None).await.unwrap();
    tree.soft_delete_item(collection.id.as_deref().unwrap(), None).await.unwrap();

    let report = purge_expired(&fx.repos, Duration::from_secs(24 * 3600))
        .await
        .unwrap();

    assert_eq!(report.binders, 0);
    assert_eq!(report.collections, 0);
    let kept = fx
        .repos
        .binders
        .get_binder(binder.id.as_deref().unwrap())
        .await
        .unwrap();
    assert!(kept.deletion_time.is_some());
}
