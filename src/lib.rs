//! Consistency and migration layer of the binder repository.
//!
//! Binders, collections and publications live in a search-indexed document
//! store. This crate keeps the derived state of that store consistent (the
//! `hasPublications` flag and stored ancestor ids of the collection tree),
//! migrates and reindexes its contents, and duplicates items together with
//! the assets they reference.
#![allow(unknown_lints, renamed_and_removed_lints)]
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        clippy::arithmetic_side_effects,
        clippy::indexing_slicing
    )
)]

pub mod config;
pub mod duplication;
pub mod item;
pub mod logging;
pub mod migration;
pub mod oplog;
pub mod publication_flags;
pub mod store;
pub mod tree;

// Re-export commonly used types
pub use config::{load_config_from, load_repository_config, ConfigError, RepositoryConfig};
pub use duplication::{AssetService, DuplicatedAsset, Duplicator, UrlMap};
pub use item::{
    Binder, Collection, CollectionElement, ElementKind, ItemFilter, ItemKind, Publication,
    Repositories, RepositoryError,
};
pub use migration::{
    CountVerification, DataMigration, MigrationAbort, MigrationError, MigrationReport,
    MigrationRunner, Migrator, ReindexPlan, RewriteImageUrls, SourceQuery,
};
pub use oplog::{JsonlOperationLog, OperationLog, OperationLogger};
pub use publication_flags::{ConvergenceReport, HasPublicationsResolver};
pub use store::{DocumentStore, MemoryStore, StoreError};
pub use tree::TreeOperations;
