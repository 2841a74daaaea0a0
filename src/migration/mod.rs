//! Migration engine.
//!
//! [`Migrator::migrate`] streams a source query through a transform into a
//! target index. [`Migrator::reindex_with_cutover`] moves an alias to a new
//! physical index once its contents are verified. [`MigrationRunner`] applies
//! named [`DataMigration`]s once and records them.

mod migrator;
mod reindex;
mod rewrite_urls;
mod runner;
mod types;

pub use migrator::{MigrationAbort, Migrator, SourceQuery};
pub use reindex::{CountVerification, ReindexOutcome, ReindexPlan};
pub use rewrite_urls::{RewriteImageUrls, DEFAULT_COVER, LEGACY_PLACEHOLDER_COVER};
pub use runner::{AppliedMigration, DataMigration, MigrationRunner, RunSummary, MIGRATIONS_INDEX};
pub use types::{MigrationError, MigrationReport, TransformedDocument};
