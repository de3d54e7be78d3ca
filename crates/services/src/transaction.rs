//! # Optimistic transactions
//!
//! Read the document, compute the changed fields, commit only if the version
//! is still the one that was read, otherwise start over. This is what keeps
//! concurrent counter and array updates from losing writes.

use std::sync::Arc;
use std::time::Duration;

use domains::{CommitOutcome, ContentError, DocumentStore, Precondition, Record, Result, Write};

/// Cap on the sleep between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct TransactionRunner {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
    backoff_base: Duration,
}

impl TransactionRunner {
    pub fn new(store: Arc<dyn DocumentStore>, max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Runs `mutate` against the current record until a commit sticks.
    ///
    /// `mutate` returns the fields to overwrite, or `None` to finish without
    /// writing. It may run several times and must not have side effects.
    /// Returns whether anything was written.
    pub async fn run<F>(&self, collection: &str, id: &str, mut mutate: F) -> Result<bool>
    where
        F: FnMut(&Record) -> Result<Option<Record>> + Send,
    {
        for attempt in 1..=self.max_attempts {
            let snapshot = self
                .store
                .get(collection, id)
                .await?
                .ok_or_else(|| ContentError::not_found(collection, id))?;

            let Some(fields) = mutate(&snapshot.record)? else {
                return Ok(false);
            };

            let outcome = self
                .store
                .commit(
                    collection,
                    id,
                    Precondition::Version(snapshot.version),
                    Write::Merge(fields),
                )
                .await?;

            match outcome {
                CommitOutcome::Committed { .. } => return Ok(true),
                CommitOutcome::Rejected => {
                    tracing::warn!(collection, id, attempt, "transaction lost a race, retrying");
                    let pause = self.backoff(attempt);
                    if attempt < self.max_attempts && !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
            }
        }

        Err(ContentError::TransactionConflict {
            collection: collection.to_string(),
            id: id.to_string(),
            attempts: self.max_attempts,
        })
    }
}
