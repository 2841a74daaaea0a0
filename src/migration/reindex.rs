//! Reindexing into a new physical index with an alias cutover.
//!
//! The alias only moves once the new index holds exactly as many documents
//! as the old one did before the copy started. Every wait is bounded; when a
//! budget runs out the alias stays where it was.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use super::migrator::Migrator;
use super::types::MigrationError;
use crate::store::{IndexDefinition, Query, TaskStatus};

/// How often and how long to poll while waiting on a reindex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountVerification {
    pub max_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for CountVerification {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            poll_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReindexPlan {
    pub alias: String,
    pub old_index: String,
    pub new_index: String,
    pub definition: IndexDefinition,
}

impl ReindexPlan {
    #[must_use]
    pub fn new(
        alias: impl Into<String>,
        old_index: impl Into<String>,
        new_index: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            old_index: old_index.into(),
            new_index: new_index.into(),
            definition: IndexDefinition::default(),
        }
    }

    #[must_use]
    pub fn with_definition(mut self, definition: IndexDefinition) -> Self {
        self.definition = definition;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexOutcome {
    pub task_id: String,
    pub documents: usize,
    pub alias: String,
    pub previous_index: String,
    pub new_index: String,
}

impl Migrator {
    /// Plan a reindex of whatever `alias` currently points to.
    pub async fn plan_reindex(
        &self,
        alias: &str,
        new_index: &str,
        definition: IndexDefinition,
    ) -> Result<ReindexPlan, MigrationError> {
        let store = self.store().as_ref();
        let targets = self
            .retry()
            .run("resolve_alias", move || store.resolve_alias(alias))
            .await?;
        let old_index = match targets.as_slice() {
            [only] => only.clone(),
            [] => {
                return Err(MigrationError::InvalidPlan(format!(
                    "alias {alias} does not point to any index"
                )))
            }
            _ => {
                return Err(MigrationError::InvalidPlan(format!(
                    "alias {alias} points to {} indices",
                    targets.len()
                )))
            }
        };
        Ok(ReindexPlan::new(alias, old_index, new_index).with_definition(definition))
    }

    /// Copy `plan.old_index` into `plan.new_index` and repoint the alias.
    ///
    /// On a count mismatch or an exhausted wait the alias and the old index
    /// are left untouched; the new index is kept for inspection.
    pub async fn reindex_with_cutover(
        &self,
        plan: &ReindexPlan,
        verification: &CountVerification,
    ) -> Result<ReindexOutcome, MigrationError> {
        if plan.old_index == plan.new_index {
            return Err(MigrationError::InvalidPlan(format!(
                "source and destination are both {}",
                plan.old_index
            )));
        }
        let store = self.store().as_ref();
        let retry = self.retry();
        let old_index = plan.old_index.as_str();
        let new_index = plan.new_index.as_str();
        let everything = &Query::MatchAll;

        let expected = retry
            .run("count", move || store.count(old_index, everything))
            .await?;
        info!(
            alias = %plan.alias,
            from = old_index,
            to = new_index,
            documents = expected,
            "Starting reindex"
        );

        let exists = retry
            .run("index_exists", move || store.index_exists(new_index))
            .await?;
        if !exists {
            let definition = &plan.definition;
            retry
                .run("create_index", move || store.create_index(new_index, definition))
                .await?;
        }

        let task_id = retry
            .run("start_reindex", move || store.start_reindex(old_index, new_index))
            .await?;
        let status = self.wait_for_task(&task_id, verification).await?;
        if !status.failures.is_empty() {
            error!(task_id = %task_id, failures = status.failures.len(), "Reindex task reported failures");
            return Err(MigrationError::ReindexTaskFailed {
                task_id,
                failures: status.failures,
            });
        }

        let actual = self.verify_count(new_index, expected, verification).await?;
        if actual != expected {
            error!(
                alias = %plan.alias,
                new_index,
                expected,
                actual,
                "Reindex count mismatch; alias left on the old index"
            );
            return Err(MigrationError::ReindexCountMismatch { expected, actual });
        }

        let alias = plan.alias.as_str();
        retry
            .run("update_alias", move || store.update_alias(alias, new_index))
            .await?;
        info!(alias, from = old_index, to = new_index, documents = actual, "Alias cut over");
        Ok(ReindexOutcome {
            task_id,
            documents: actual,
            alias: plan.alias.clone(),
            previous_index: plan.old_index.clone(),
            new_index: plan.new_index.clone(),
        })
    }

    async fn wait_for_task(
        &self,
        task_id: &str,
        verification: &CountVerification,
    ) -> Result<TaskStatus, MigrationError> {
        let store = self.store().as_ref();
        for attempt in 1..=verification.max_attempts {
            let status = self
                .retry()
                .run("task_status", move || store.task_status(task_id))
                .await?;
            if status.completed {
                return Ok(status);
            }
            info!(
                task_id,
                created = status.created,
                total = status.total,
                attempt,
                "Waiting for reindex task"
            );
            if attempt < verification.max_attempts {
                tokio::time::sleep(verification.poll_interval).await;
            }
        }
        Err(MigrationError::ReindexTaskIncomplete {
            task_id: task_id.to_string(),
            attempts: verification.max_attempts,
        })
    }

    /// Poll the document count of `index` until it reaches `expected` or the
    /// attempts run out. Returns the last count seen.
    async fn verify_count(
        &self,
        index: &str,
        expected: usize,
        verification: &CountVerification,
    ) -> Result<usize, MigrationError> {
        let store = self.store().as_ref();
        let everything = &Query::MatchAll;
        let mut actual: usize = 0;
        for attempt in 1..=verification.max_attempts {
            actual = self
                .retry()
                .run("count", move || store.count(index, everything))
                .await?;
            if actual == expected {
                return Ok(actual);
            }
            warn!(index, expected, actual, attempt, "Reindexed count does not match yet");
            if attempt < verification.max_attempts {
                tokio::time::sleep(verification.poll_interval).await;
            }
        }
        Ok(actual)
    }
}
