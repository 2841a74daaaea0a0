//! Typed repository adapters and the bundle that wires them to one store.

mod any;
mod binder;
mod collection;
mod publication;

pub use any::AnyItem;
pub use binder::BinderRepository;
pub use collection::CollectionRepository;
pub use publication::{PublicationFilter, PublicationRepository};

use std::sync::Arc;
use tracing::info;

use crate::config::{ConfigError, IndexNames, IndicesConfig, RepositoryConfig};
use crate::item::core::error::RepositoryError;
use crate::item::core::repository::{IndexedRepository, RepositorySettings};
use crate::item::ItemKind;
use crate::oplog::OperationLogger;
use crate::store::{DocumentStore, IndexDefinition, Query, SearchRequest, StoreError};

/// The three repositories sharing one store.
#[derive(Clone)]
pub struct Repositories {
    pub binders: BinderRepository,
    pub collections: CollectionRepository,
    pub publications: PublicationRepository,
}

impl Repositories {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        indices: &IndicesConfig,
        settings: &RepositorySettings,
        oplog: &OperationLogger,
    ) -> Self {
        Self {
            binders: BinderRepository::new(
                IndexedRepository::new(
                    Arc::clone(&store),
                    indices.binders.clone(),
                    settings.clone(),
                )
                .with_operation_log(oplog.clone()),
            ),
            collections: CollectionRepository::new(
                IndexedRepository::new(
                    Arc::clone(&store),
                    indices.collections.clone(),
                    settings.clone(),
                )
                .with_operation_log(oplog.clone()),
            ),
            publications: PublicationRepository::new(
                IndexedRepository::new(store, indices.publications.clone(), settings.clone())
                    .with_operation_log(oplog.clone()),
            ),
        }
    }

    pub fn from_config(
        store: Arc<dyn DocumentStore>,
        config: &RepositoryConfig,
        oplog: &OperationLogger,
    ) -> Result<Self, ConfigError> {
        let settings = RepositorySettings {
            retry: config.retry.policy()?,
            scroll: config.scroll.settings()?,
        };
        Ok(Self::new(store, &config.indices, &settings, oplog))
    }

    /// Create missing physical indices and point unset aliases at them.
    pub async fn bootstrap(store: &dyn DocumentStore, indices: &IndicesConfig) -> Result<(), StoreError> {
        for names in [&indices.binders, &indices.collections, &indices.publications] {
            bootstrap_index(store, names).await?;
        }
        Ok(())
    }

    fn store(&self) -> &Arc<dyn DocumentStore> {
        self.binders.repository().store()
    }

    /// Kind of the items stored in physical index `index`.
    pub async fn kind_of_index(&self, index: &str) -> Result<ItemKind, RepositoryError> {
        let candidates = [
            (self.binders.repository().names(), ItemKind::Document),
            (self.collections.repository().names(), ItemKind::Collection),
            (self.publications.repository().names(), ItemKind::Publication),
        ];
        for (names, kind) in candidates {
            if names.alias == index {
                return Ok(kind);
            }
            let targets = self.store().resolve_alias(&names.alias).await?;
            if targets.iter().any(|target| target == index) {
                return Ok(kind);
            }
        }
        Ok(ItemKind::Unknown(index.to_string()))
    }

    /// Look up a binder or collection by id without knowing its kind.
    pub async fn find_item(&self, id: &str) -> Result<AnyItem, RepositoryError> {
        let targets = format!(
            "{},{}",
            self.binders.repository().alias(),
            self.collections.repository().alias()
        );
        let request = SearchRequest::new(Query::ids([id])).with_size(1);
        let store = self.store().as_ref();
        let targets = targets.as_str();
        let request = &request;
        let hits = self
            .binders
            .repository()
            .settings()
            .retry
            .run("find_item", move || store.search(targets, request))
            .await?;
        let Some(hit) = hits.into_iter().next() else {
            return Err(RepositoryError::not_found(id));
        };
        let kind = self.kind_of_index(&hit.index).await?;
        AnyItem::from_hit(&kind, hit)
    }
}

async fn bootstrap_index(store: &dyn DocumentStore, names: &IndexNames) -> Result<(), StoreError> {
    if !store.index_exists(&names.index).await? {
        store
            .create_index(&names.index, &IndexDefinition::default())
            .await?;
    }
    if store.resolve_alias(&names.alias).await?.is_empty() {
        store.update_alias(&names.alias, &names.index).await?;
        info!(alias = %names.alias, index = %names.index, "Alias bootstrapped");
    }
    Ok(())
}
