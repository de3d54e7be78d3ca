//! # Core Traits (Ports)
//!
//! The narrow capabilities the content core consumes. Storage backends,
//! clocks, id sources and session providers plug in here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::record::Record;

/// A stored record together with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub record: Record,
    /// Changes on every committed write to the document. Never reused,
    /// even after the document is deleted and recreated.
    pub version: u64,
}

/// Condition checked atomically with a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional write.
    None,
    /// The document must currently exist.
    Exists,
    /// The document must exist at exactly this version.
    Version(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Replace the whole document, creating it if absent.
    Set(Record),
    /// Overwrite the listed fields, keeping the rest. Creates the document if absent.
    Merge(Record),
    /// Remove the document. Removing an absent document succeeds.
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// `None` after a delete.
    Committed { version: Option<u64> },
    /// The precondition did not hold; nothing was written.
    Rejected,
}

/// Transactional document store contract.
///
/// A commit is atomic with its precondition check; there is no other locking.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>>;

    async fn commit(
        &self,
        collection: &str,
        id: &str,
        precondition: Precondition,
        write: Write,
    ) -> Result<CommitOutcome>;
}

/// Source of "now" for timestamps and story expiration.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Issues identifiers for new entities.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// The signed-in user, if any.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait SessionProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}
