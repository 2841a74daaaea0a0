use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::assets::AssetService;
use super::url_map::{TranslationSource, UrlMap};
use crate::item::entities::{Binder, ChunkVisual, Collection, Thumbnail};
use crate::item::repositories::{BinderRepository, CollectionRepository, Repositories};
use crate::item::RepositoryError;

/// Duplicates binders and collections together with their assets.
///
/// The store record is copied first; everything after that is undone by
/// hard-deleting the copy when a later step fails.
#[derive(Clone)]
pub struct Duplicator {
    binders: BinderRepository,
    collections: CollectionRepository,
    assets: Arc<dyn AssetService>,
}

#[derive(Debug, Default)]
struct RewriteStats {
    rewritten: usize,
    unchanged: usize,
}

impl RewriteStats {
    fn track(&mut self, source: TranslationSource) {
        if source == TranslationSource::Unchanged {
            self.unchanged = self.unchanged.saturating_add(1);
        } else {
            self.rewritten = self.rewritten.saturating_add(1);
        }
    }
}

fn rewrite_thumbnail(thumbnail: &mut Thumbnail, map: &UrlMap, stats: &mut RewriteStats) {
    if let Some(medium) = thumbnail.medium.as_mut() {
        let translated = map.translate(medium, None);
        stats.track(translated.source);
        *medium = translated.url;
    }
}

impl Duplicator {
    #[must_use]
    pub fn new(repos: &Repositories, assets: Arc<dyn AssetService>) -> Self {
        Self {
            binders: repos.binders.clone(),
            collections: repos.collections.clone(),
            assets,
        }
    }

    async fn duplicate_assets(&self, source_id: &str, clone_id: &str) -> Result<UrlMap, RepositoryError> {
        let assets = self
            .assets
            .duplicate_assets(source_id, clone_id)
            .await
            .map_err(|e| RepositoryError::AssetService(e.to_string()))?;
        debug!(source_id, clone_id, assets = assets.len(), "Assets duplicated");
        Ok(UrlMap::build(&assets))
    }

    /// Copy a binder, its assets and every reference to them.
    pub async fn duplicate_binder(&self, binder: &Binder) -> Result<Binder, RepositoryError> {
        let Some(source_id) = binder.id.as_deref() else {
            return Err(RepositoryError::invalid("Cannot duplicate binder without id"));
        };
        let clone_id = self.binders.repository().duplicate_record(source_id).await?;
        let finished = self.finish_binder(source_id, &clone_id).await;
        self.compensate("binder", source_id, &clone_id, finished, || {
            self.binders.hard_delete_binder(&clone_id)
        })
        .await
    }

    /// Rewrite the stored copy, not the caller's binder, which may be stale.
    async fn finish_binder(&self, source_id: &str, clone_id: &str) -> Result<Binder, RepositoryError> {
        let map = self.duplicate_assets(source_id, clone_id).await?;
        let mut clone = self.binders.get_binder(clone_id).await?;
        clone.created = Some(Utc::now());
        clone.ancestor_ids.clear();

        let mut stats = RewriteStats::default();
        for visual in clone.modules.visuals_mut() {
            match visual {
                ChunkVisual::Visual(visual) => {
                    let translated = map.translate(&visual.url, visual.id.as_deref());
                    stats.track(translated.source);
                    visual.url = translated.url;
                    if translated.id.is_some() {
                        visual.id = translated.id;
                    }
                }
                ChunkVisual::Url(url) => {
                    let translated = map.translate(url, None);
                    stats.track(translated.source);
                    *url = translated.url;
                }
            }
        }
        rewrite_thumbnail(&mut clone.thumbnail, &map, &mut stats);
        if stats.unchanged > 0 {
            warn!(
                clone_id,
                unchanged = stats.unchanged,
                "Some asset references could not be translated"
            );
        }

        let clone = self.binders.update_binder(clone).await?;
        info!(source_id, clone_id, rewritten = stats.rewritten, "Binder duplicated");
        Ok(clone)
    }

    /// Copy a collection without its elements.
    ///
    /// The copy starts empty, so its publication flag is cleared.
    pub async fn duplicate_collection_without_elements(
        &self,
        collection: &Collection,
    ) -> Result<Collection, RepositoryError> {
        let Some(source_id) = collection.id.as_deref() else {
            return Err(RepositoryError::invalid("Cannot duplicate collection without id"));
        };
        let clone_id = self
            .collections
            .repository()
            .duplicate_record(source_id)
            .await?;
        let finished = self.finish_collection(source_id, &clone_id).await;
        self.compensate("collection", source_id, &clone_id, finished, || {
            self.collections.hard_delete_collection(&clone_id)
        })
        .await
    }

    async fn finish_collection(&self, source_id: &str, clone_id: &str) -> Result<Collection, RepositoryError> {
        let map = self.duplicate_assets(source_id, clone_id).await?;
        let mut clone = self.collections.get_collection(clone_id).await?;
        clone.elements.clear();
        clone.deleted_elements.clear();
        clone.has_publications = false;
        clone.is_root_collection = false;
        clone.ancestor_ids.clear();
        clone.created = Some(Utc::now());

        let mut stats = RewriteStats::default();
        rewrite_thumbnail(&mut clone.thumbnail, &map, &mut stats);
        let clone = self.collections.update_collection(clone).await?;
        info!(source_id, clone_id, "Collection duplicated");
        Ok(clone)
    }

    async fn compensate<T, F, Fut>(
        &self,
        kind: &str,
        source_id: &str,
        clone_id: &str,
        finished: Result<T, RepositoryError>,
        delete_clone: F,
    ) -> Result<T, RepositoryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), RepositoryError>>,
    {
        let err = match finished {
            Ok(done) => return Ok(done),
            Err(err) => err,
        };
        error!(kind, source_id, clone_id, error = %err, "Duplication failed; removing the copy");
        if let Err(cleanup) = delete_clone().await {
            error!(
                kind,
                clone_id,
                error = %cleanup,
                "Failed to remove partial duplicate"
            );
        }
        Err(err)
    }
}
