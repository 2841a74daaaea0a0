//! Named one-off data migrations and the ledger of those already applied.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::migrator::Migrator;
use super::types::{MigrationError, MigrationReport};
use crate::item::RepositoryError;
use crate::store::{BulkOperation, BulkReport, Refresh, SearchRequest, StoreError};

/// Index recording which data migrations have been applied.
pub const MIGRATIONS_INDEX: &str = "schema-migrations";

/// A one-off data migration.
///
/// Names must be unique and stable: the runner skips every migration whose
/// name is already in the ledger.
#[async_trait]
pub trait DataMigration: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn run(&self, migrator: &Migrator) -> Result<MigrationReport, MigrationError>;
}

/// Ledger entry for an applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigration {
    pub name: String,
    pub description: String,
    pub applied_at: DateTime<Utc>,
    pub read: usize,
    pub written: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    /// Set when a migration was aborted; later migrations were not started.
    pub aborted: Option<String>,
}

/// Applies registered migrations in registration order.
pub struct MigrationRunner {
    migrator: Migrator,
    migrations: Vec<Arc<dyn DataMigration>>,
    ledger_index: String,
}

impl MigrationRunner {
    #[must_use]
    pub fn new(migrator: Migrator) -> Self {
        Self {
            migrator,
            migrations: Vec::new(),
            ledger_index: MIGRATIONS_INDEX.to_string(),
        }
    }

    #[must_use]
    pub fn with_ledger_index(mut self, index: impl Into<String>) -> Self {
        self.ledger_index = index.into();
        self
    }

    #[must_use]
    pub fn register(mut self, migration: Arc<dyn DataMigration>) -> Self {
        self.migrations.push(migration);
        self
    }

    /// Every ledger entry, oldest first.
    pub async fn applied(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        let store = self.migrator.store().as_ref();
        let index = self.ledger_index.as_str();
        let request = SearchRequest::match_all().sorted_by("appliedAt", true);
        let request = &request;
        match self
            .migrator
            .retry()
            .run("search", move || store.search(index, request))
            .await
        {
            Ok(hits) => hits
                .into_iter()
                .map(|hit| serde_json::from_value(hit.source).map_err(MigrationError::from))
                .collect(),
            Err(StoreError::IndexNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_applied(&self, name: &str) -> Result<bool, MigrationError> {
        let store = self.migrator.store().as_ref();
        let index = self.ledger_index.as_str();
        match self
            .migrator
            .retry()
            .run("get", move || store.get(index, name))
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. } | StoreError::IndexNotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn record(
        &self,
        migration: &dyn DataMigration,
        report: &MigrationReport,
    ) -> Result<(), MigrationError> {
        let entry = AppliedMigration {
            name: migration.name().to_string(),
            description: migration.description().to_string(),
            applied_at: Utc::now(),
            read: report.read,
            written: report.written,
        };
        let operations = [BulkOperation::Index {
            id: Some(entry.name.clone()),
            document: serde_json::to_value(&entry)?,
        }];
        let store = self.migrator.store().as_ref();
        let index = self.ledger_index.as_str();
        let ops = operations.as_slice();
        let response = self
            .migrator
            .retry()
            .run("bulk", move || store.bulk(index, ops, Refresh::WaitFor))
            .await?;
        let ledger = BulkReport::from_response(&response, false);
        if ledger.is_clean() {
            Ok(())
        } else {
            Err(RepositoryError::PartialBulkFailure {
                succeeded: ledger.succeeded,
                failures: ledger.failures,
            }
            .into())
        }
    }

    /// Run every registered migration missing from the ledger.
    ///
    /// Stops at the first failing migration. Applied migrations are not rolled
    /// back; the failing one is not recorded and runs again next time.
    pub async fn run_pending(&self) -> Result<RunSummary, MigrationError> {
        let mut summary = RunSummary::default();
        for migration in &self.migrations {
            let name = migration.name();
            if self.is_applied(name).await? {
                info!(migration = name, "Already applied, skipping");
                summary.skipped.push(name.to_string());
                continue;
            }

            info!(migration = name, description = migration.description(), "Applying data migration");
            let report = match migration.run(&self.migrator).await {
                Ok(report) => report,
                Err(e) => {
                    error!(migration = name, error = %e, "Data migration failed");
                    return Err(e);
                }
            };
            if report.aborted {
                warn!(migration = name, "Data migration aborted; not recorded");
                summary.aborted = Some(name.to_string());
                break;
            }
            self.record(migration.as_ref(), &report).await?;
            info!(
                migration = name,
                read = report.read,
                written = report.written,
                "Data migration applied"
            );
            summary.applied.push(name.to_string());
        }
        Ok(summary)
    }
}
