//! # In-memory document store
//!
//! Sharded map of `(collection, id)` to versioned records. Each commit holds
//! the shard lock for the duration of its precondition check and write, which
//! is what makes optimistic transactions on top of it safe.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{CommitOutcome, DocumentStore, Precondition, Record, Result, Snapshot, Write};

type Key = (String, String);

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: DashMap<Key, Snapshot>,
    /// Global version source; versions are never reused.
    sequence: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of documents in one collection.
    pub fn count(&self, collection: &str) -> usize {
        self.documents
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .count()
    }
}

fn holds(precondition: Precondition, current: Option<u64>) -> bool {
    match (precondition, current) {
        (Precondition::None, _) => true,
        (Precondition::Exists, existing) => existing.is_some(),
        (Precondition::Version(expected), Some(version)) => expected == version,
        (Precondition::Version(_), None) => false,
    }
}

fn merged(mut base: Record, fields: Record) -> Record {
    base.extend(fields);
    base
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>> {
        let key = (collection.to_string(), id.to_string());
        Ok(self.documents.get(&key).map(|entry| entry.value().clone()))
    }

    async fn commit(
        &self,
        collection: &str,
        id: &str,
        precondition: Precondition,
        write: Write,
    ) -> Result<CommitOutcome> {
        let key = (collection.to_string(), id.to_string());
        match self.documents.entry(key) {
            Entry::Occupied(mut occupied) => {
                if !holds(precondition, Some(occupied.get().version)) {
                    return Ok(CommitOutcome::Rejected);
                }
                let record = match write {
                    Write::Delete => {
                        occupied.remove();
                        tracing::debug!(collection, id, "document removed");
                        return Ok(CommitOutcome::Committed { version: None });
                    }
                    Write::Set(record) => record,
                    Write::Merge(fields) => merged(occupied.get().record.clone(), fields),
                };
                let version = self.next_version();
                occupied.insert(Snapshot { record, version });
                tracing::debug!(collection, id, version, "document written");
                Ok(CommitOutcome::Committed {
                    version: Some(version),
                })
            }
            Entry::Vacant(vacant) => {
                if !holds(precondition, None) {
                    return Ok(CommitOutcome::Rejected);
                }
                let record = match write {
                    Write::Delete => return Ok(CommitOutcome::Committed { version: None }),
                    Write::Set(record) | Write::Merge(record) => record,
                };
                let version = self.next_version();
                vacant.insert(Snapshot { record, version });
                tracing::debug!(collection, id, version, "document created");
                Ok(CommitOutcome::Committed {
                    version: Some(version),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::RecordValue;

    fn record(pairs: &[(&str, i64)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), RecordValue::Integer(*v)))
            .collect()
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = InMemoryDocumentStore::new();
        let outcome = store
            .commit("posts", "p1", Precondition::None, Write::Set(record(&[("likes", 0)])))
            .await
            .unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed { version: Some(_) }));

        let snapshot = store.get("posts", "p1").await.unwrap().unwrap();
        assert_eq!(snapshot.record, record(&[("likes", 0)]));
        assert!(store.get("comments", "p1").await.unwrap().is_none());
        assert_eq!(store.count("posts"), 1);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let store = InMemoryDocumentStore::new();
        store
            .commit("posts", "p1", Precondition::None, Write::Set(record(&[("likes", 0)])))
            .await
            .unwrap();
        let first = store.get("posts", "p1").await.unwrap().unwrap();

        let write = Write::Merge(record(&[("likes", 1)]));
        let ok = store
            .commit("posts", "p1", Precondition::Version(first.version), write.clone())
            .await
            .unwrap();
        assert_ne!(ok, CommitOutcome::Rejected);

        let stale = store
            .commit("posts", "p1", Precondition::Version(first.version), write)
            .await
            .unwrap();
        assert_eq!(stale, CommitOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_merge_keeps_other_fields() {
        let store = InMemoryDocumentStore::new();
        store
            .commit("posts", "p1", Precondition::None, Write::Set(record(&[("likes", 2), ("shares", 5)])))
            .await
            .unwrap();
        store
            .commit("posts", "p1", Precondition::Exists, Write::Merge(record(&[("likes", 3)])))
            .await
            .unwrap();
        let snapshot = store.get("posts", "p1").await.unwrap().unwrap();
        assert_eq!(snapshot.record, record(&[("likes", 3), ("shares", 5)]));
    }

    #[tokio::test]
    async fn test_exists_precondition_and_idempotent_delete() {
        let store = InMemoryDocumentStore::new();
        let missing = store
            .commit("posts", "p1", Precondition::Exists, Write::Merge(record(&[("likes", 1)])))
            .await
            .unwrap();
        assert_eq!(missing, CommitOutcome::Rejected);

        for _ in 0..2 {
            let outcome = tokio_test::assert_ok!(
                store
                    .commit("posts", "p1", Precondition::None, Write::Delete)
                    .await
            );
            assert_eq!(outcome, CommitOutcome::Committed { version: None });
        }
    }

    #[tokio::test]
    async fn test_recreated_document_gets_fresh_version() {
        let store = InMemoryDocumentStore::new();
        let set = || Write::Set(record(&[("likes", 0)]));
        store.commit("posts", "p1", Precondition::None, set()).await.unwrap();
        let old = store.get("posts", "p1").await.unwrap().unwrap().version;
        store.commit("posts", "p1", Precondition::None, Write::Delete).await.unwrap();
        store.commit("posts", "p1", Precondition::None, set()).await.unwrap();

        let stale = store
            .commit("posts", "p1", Precondition::Version(old), set())
            .await
            .unwrap();
        assert_eq!(stale, CommitOutcome::Rejected);
    }
}
