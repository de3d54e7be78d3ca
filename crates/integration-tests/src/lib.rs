//! Shared fixtures for the integration suite: a store that fights back,
//! a clock the test controls, predictable ids and fake content.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use domains::{
    Clock, CommitOutcome, Comment, Document, DocumentStore, IdGenerator, Media, MediaType, Post,
    Precondition, Result, Snapshot, Write,
};
use fake::faker::lorem::en::{Sentence, Word, Words};
use fake::Fake;
use services::{ContentRepository, ContentService, RepositoryOptions};
use storage_adapters::InMemoryDocumentStore;

/// Wraps a store, yields to the scheduler on every read so transactions
/// interleave, and rejects the first `conflicts` versioned commits outright.
pub struct ContendedStore {
    inner: Arc<dyn DocumentStore>,
    conflicts: AtomicU32,
    rejected: AtomicU32,
}

impl ContendedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts: AtomicU32::new(conflicts),
            rejected: AtomicU32::new(0),
        }
    }

    /// Versioned commits rejected so far, injected or genuine.
    pub fn rejected(&self) -> u32 {
        self.rejected.load(Ordering::SeqCst)
    }

    fn take_conflict(&self) -> bool {
        self.conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for ContendedStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>> {
        let snapshot = self.inner.get(collection, id).await?;
        tokio::task::yield_now().await;
        Ok(snapshot)
    }

    async fn commit(
        &self,
        collection: &str,
        id: &str,
        precondition: Precondition,
        write: Write,
    ) -> Result<CommitOutcome> {
        let versioned = matches!(precondition, Precondition::Version(_));
        let outcome = if versioned && self.take_conflict() {
            CommitOutcome::Rejected
        } else {
            self.inner.commit(collection, id, precondition, write).await?
        };
        if versioned && outcome == CommitOutcome::Rejected {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }
        Ok(outcome)
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += domains::to_delta(by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(epoch())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `prefix-1`, `prefix-2`, ...
pub struct SequentialIds {
    prefix: &'static str,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        format!("{}-{}", self.prefix, self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Fixed reference instant for deterministic tests.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 13, 9, 30, 0)
        .single()
        .unwrap_or_default()
}

/// Zero-backoff options so contention tests stay fast.
pub fn fast_options(max_attempts: u32) -> RepositoryOptions {
    RepositoryOptions {
        max_attempts,
        backoff_base: Duration::ZERO,
        ..RepositoryOptions::default()
    }
}

pub fn memory_store() -> Arc<dyn DocumentStore> {
    Arc::new(InMemoryDocumentStore::new())
}

pub fn posts_repo(store: Arc<dyn DocumentStore>) -> ContentRepository<Post> {
    ContentRepository::posts(store, fast_options(64))
}

/// Service over a fresh in-memory store with a manual clock.
pub fn service_with_clock(clock: Arc<ManualClock>) -> ContentService {
    ContentService::new(
        memory_store(),
        fast_options(5),
        clock,
        Arc::new(SequentialIds::new("id")),
    )
}

pub fn fake_caption() -> String {
    Sentence(3..8).fake()
}

pub fn fake_tags() -> Vec<String> {
    Words(1..5).fake()
}

pub fn fake_media(id: &str) -> Media {
    let kind = match (0..3).fake::<u8>() {
        0 => MediaType::Image,
        1 => MediaType::Video,
        _ => MediaType::Sound,
    };
    let title: Option<String> = if (0..2).fake::<u8>() == 1 {
        Some(Word().fake())
    } else {
        None
    };
    // Quarter seconds survive the trip through an f64 of seconds exactly.
    Media::new(
        id,
        kind,
        Some(Duration::from_millis((2..360).fake::<u64>() * 250)),
        title,
        Some("u1".to_string()),
        Some(format!("https://cdn.example/{id}")),
    )
}

/// A comment with `depth` levels of single replies under it.
pub fn fake_thread(id: &str, post_id: &str, depth: usize) -> Comment {
    let mut root = Comment::new(id, "u1", post_id, fake_caption(), epoch());
    if depth > 0 {
        root.add_reply(fake_thread(&format!("{id}.r"), post_id, depth - 1));
    }
    root
}

/// A standard post with fake caption, tags, media and a comment thread.
pub fn fake_post(id: &str) -> Post {
    let mut post = Post::standard(id, "u1", fake_caption(), epoch());
    for tag in fake_tags() {
        post.base.add_tag(&tag);
    }
    post.base.add_media(fake_media(&format!("{id}-m1")));
    post.base.add_media(Media::image(format!("{id}-m2"), None));
    post.base.add_comment(fake_thread(&format!("{id}-c1"), id, 2));
    post
}

/// Behaviour every `DocumentStore` backend must share. Panics on the first
/// violation.
pub async fn check_store_contract(store: Arc<dyn DocumentStore>) {
    let post = fake_post("contract-1").to_record();

    // Absent documents
    assert!(store.get("posts", "contract-1").await.unwrap().is_none());
    let rejected = store
        .commit("posts", "contract-1", Precondition::Exists, Write::Merge(post.clone()))
        .await
        .unwrap();
    assert_eq!(rejected, CommitOutcome::Rejected);

    // Create, then the same id in another collection stays independent
    store
        .commit("posts", "contract-1", Precondition::None, Write::Set(post.clone()))
        .await
        .unwrap();
    let first = store.get("posts", "contract-1").await.unwrap().unwrap();
    assert_eq!(first.record, post);
    assert!(store.get("stories", "contract-1").await.unwrap().is_none());

    // Versioned merge succeeds once, then the old version is stale
    let mut fields = domains::Record::new();
    fields.insert("likes".into(), domains::RecordValue::Integer(7));
    let merged = store
        .commit("posts", "contract-1", Precondition::Version(first.version), Write::Merge(fields.clone()))
        .await
        .unwrap();
    let CommitOutcome::Committed { version: Some(second) } = merged else {
        panic!("versioned merge was not committed: {merged:?}");
    };
    assert_ne!(second, first.version);
    let stale = store
        .commit("posts", "contract-1", Precondition::Version(first.version), Write::Merge(fields))
        .await
        .unwrap();
    assert_eq!(stale, CommitOutcome::Rejected);

    let current = store.get("posts", "contract-1").await.unwrap().unwrap();
    assert_eq!(current.record.get("likes"), Some(&domains::RecordValue::Integer(7)));
    assert_eq!(current.record.get("postID"), post.get("postID"));

    // Deletes are idempotent and versions are never reused
    for _ in 0..2 {
        let deleted = store
            .commit("posts", "contract-1", Precondition::None, Write::Delete)
            .await
            .unwrap();
        assert_eq!(deleted, CommitOutcome::Committed { version: None });
    }
    store
        .commit("posts", "contract-1", Precondition::None, Write::Set(post))
        .await
        .unwrap();
    let recreated = store.get("posts", "contract-1").await.unwrap().unwrap();
    assert!(recreated.version != first.version && recreated.version != second);
}
