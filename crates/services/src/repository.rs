//! # Content Repository
//!
//! One repository per collection. Plain CRUD is last-writer-wins; counter,
//! array and guarded status changes go through the optimistic
//! [`TransactionRunner`] so concurrent callers never lose an update.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use domains::{
    Comment, CommentStatus, CommitOutcome, ContentError, Document, DocumentStore, Media,
    MediaIndexPolicy, MediaType, Post, PostKind, Precondition, Record, Result, Visibility, Write,
    COMMENT_COLLECTION, DELETED_PLACEHOLDER, DISCUSSION_POSTS_COLLECTION, MEDIA_COLLECTION,
    POSTS_COLLECTION, STORIES_COLLECTION,
};

use crate::transaction::TransactionRunner;

/// Tuning shared by every repository built from the same store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryOptions {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub media_index_policy: MediaIndexPolicy,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_millis(10),
            media_index_policy: MediaIndexPolicy::Ignore,
        }
    }
}

/// Entities that carry a like counter.
pub trait Likeable {
    fn like(&mut self);
    /// Must be a no-op at zero.
    fn unlike(&mut self);
}

impl Likeable for Post {
    fn like(&mut self) {
        self.base.like();
    }

    fn unlike(&mut self) {
        self.base.unlike();
    }
}

impl Likeable for Comment {
    fn like(&mut self) {
        Comment::like(self);
    }

    fn unlike(&mut self) {
        Comment::unlike(self);
    }
}

/// Fields of `after` that differ from `before`. Keys only present in
/// `before` are left alone.
fn changed_fields(before: &Record, after: Record) -> Record {
    after
        .into_iter()
        .filter(|(key, value)| before.get(key) != Some(value))
        .collect()
}

fn index_miss(policy: MediaIndexPolicy, index: usize, len: usize) -> Result<bool> {
    match policy {
        MediaIndexPolicy::Ignore => {
            tracing::debug!(index, len, "media index out of range, ignored");
            Ok(false)
        }
        MediaIndexPolicy::Reject => Err(ContentError::IndexOutOfRange { index, len }),
    }
}

pub struct ContentRepository<T: Document> {
    store: Arc<dyn DocumentStore>,
    collection: &'static str,
    tx: TransactionRunner,
    media_index_policy: MediaIndexPolicy,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Document> Clone for ContentRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collection: self.collection,
            tx: self.tx.clone(),
            media_index_policy: self.media_index_policy,
            _entity: PhantomData,
        }
    }
}

impl<T: Document> ContentRepository<T> {
    pub fn new(store: Arc<dyn DocumentStore>, collection: &'static str, options: RepositoryOptions) -> Self {
        Self {
            tx: TransactionRunner::new(store.clone(), options.max_attempts, options.backoff_base),
            store,
            collection,
            media_index_policy: options.media_index_policy,
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    fn decode(&self, record: &Record) -> Result<T> {
        let entity = T::from_record(record)?;
        if entity.collection() != self.collection {
            return Err(ContentError::invalid(
                T::ENTITY,
                format!("record belongs in {}, not {}", entity.collection(), self.collection),
            ));
        }
        Ok(entity)
    }

    fn ensure_collection(&self, entity: &T) -> Result<()> {
        let found = entity.collection();
        if found == self.collection {
            Ok(())
        } else {
            Err(ContentError::WrongCollection {
                expected: self.collection,
                found,
            })
        }
    }

    /// Writes the entity under its id, replacing any existing record.
    pub async fn create(&self, entity: &T) -> Result<()> {
        self.ensure_collection(entity)?;
        self.store
            .commit(
                self.collection,
                entity.id(),
                Precondition::None,
                Write::Set(entity.to_record()),
            )
            .await?;
        tracing::debug!(collection = self.collection, id = entity.id(), "created");
        Ok(())
    }

    pub async fn read(&self, id: &str) -> Result<T> {
        let snapshot = self
            .store
            .get(self.collection, id)
            .await?
            .ok_or_else(|| ContentError::not_found(self.collection, id))?;
        self.decode(&snapshot.record)
    }

    /// Replaces an existing record. Fails with `DocumentNotFound` when absent.
    pub async fn update(&self, entity: &T) -> Result<()> {
        self.ensure_collection(entity)?;
        let outcome = self
            .store
            .commit(
                self.collection,
                entity.id(),
                Precondition::Exists,
                Write::Set(entity.to_record()),
            )
            .await?;
        match outcome {
            CommitOutcome::Committed { .. } => Ok(()),
            CommitOutcome::Rejected => Err(ContentError::not_found(self.collection, entity.id())),
        }
    }

    /// Succeeds whether or not the record exists.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store
            .commit(self.collection, id, Precondition::None, Write::Delete)
            .await?;
        tracing::debug!(collection = self.collection, id, "deleted");
        Ok(())
    }

    /// Overwrites the given fields of an existing record without reading it.
    async fn write_fields(&self, id: &str, fields: Record) -> Result<()> {
        let outcome = self
            .store
            .commit(self.collection, id, Precondition::Exists, Write::Merge(fields))
            .await?;
        match outcome {
            CommitOutcome::Committed { .. } => Ok(()),
            CommitOutcome::Rejected => Err(ContentError::not_found(self.collection, id)),
        }
    }

    /// Read-modify-write of one entity. `apply` returns whether it changed
    /// anything; only the fields that differ are committed.
    async fn mutate<F>(&self, id: &str, mut apply: F) -> Result<bool>
    where
        F: FnMut(&mut T) -> Result<bool> + Send,
    {
        self.tx
            .run(self.collection, id, |record| {
                let mut entity = self.decode(record)?;
                if !apply(&mut entity)? {
                    return Ok(None);
                }
                let fields = changed_fields(record, entity.to_record());
                Ok((!fields.is_empty()).then_some(fields))
            })
            .await
    }
}

impl<T: Document + Likeable> ContentRepository<T> {
    pub async fn increment_likes(&self, id: &str) -> Result<()> {
        self.mutate(id, |entity| {
            entity.like();
            Ok(true)
        })
        .await?;
        Ok(())
    }

    /// A no-op when the count is already zero.
    pub async fn decrement_likes(&self, id: &str) -> Result<()> {
        self.mutate(id, |entity| {
            entity.unlike();
            Ok(true)
        })
        .await?;
        Ok(())
    }
}

impl ContentRepository<Post> {
    pub fn posts(store: Arc<dyn DocumentStore>, options: RepositoryOptions) -> Self {
        Self::new(store, POSTS_COLLECTION, options)
    }

    pub fn stories(store: Arc<dyn DocumentStore>, options: RepositoryOptions) -> Self {
        Self::new(store, STORIES_COLLECTION, options)
    }

    pub fn discussion_posts(store: Arc<dyn DocumentStore>, options: RepositoryOptions) -> Self {
        Self::new(store, DISCUSSION_POSTS_COLLECTION, options)
    }

    pub fn for_kind(kind: PostKind, store: Arc<dyn DocumentStore>, options: RepositoryOptions) -> Self {
        Self::new(store, kind.collection(), options)
    }

    pub async fn increment_shares(&self, id: &str) -> Result<()> {
        self.mutate(id, |post| {
            post.base.increment_shares();
            Ok(true)
        })
        .await?;
        Ok(())
    }

    pub async fn increment_impressions(&self, id: &str) -> Result<()> {
        self.mutate(id, |post| {
            post.base.increment_impressions();
            Ok(true)
        })
        .await?;
        Ok(())
    }

    pub async fn add_media(&self, id: &str, media: Media) -> Result<()> {
        self.mutate(id, |post| {
            post.base.add_media(media.clone());
            Ok(true)
        })
        .await?;
        Ok(())
    }

    /// Out-of-range indices follow the configured [`MediaIndexPolicy`].
    pub async fn remove_media(&self, id: &str, index: usize) -> Result<()> {
        let policy = self.media_index_policy;
        self.mutate(id, |post| match post.base.remove_media_at(index) {
            Some(_) => Ok(true),
            None => index_miss(policy, index, post.base.media().len()),
        })
        .await?;
        Ok(())
    }

    /// Returns whether an item with that id was attached.
    pub async fn remove_media_by_id(&self, id: &str, media_id: &str) -> Result<bool> {
        self.mutate(id, |post| Ok(post.base.remove_media_by_id(media_id).is_some()))
            .await
    }

    pub async fn replace_media(&self, id: &str, index: usize, media: Media) -> Result<()> {
        let policy = self.media_index_policy;
        self.mutate(id, |post| match post.base.replace_media_at(index, media.clone()) {
            Some(_) => Ok(true),
            None => index_miss(policy, index, post.base.media().len()),
        })
        .await?;
        Ok(())
    }

    pub async fn clear_media(&self, id: &str) -> Result<()> {
        self.mutate(id, |post| {
            post.base.clear_media();
            Ok(true)
        })
        .await?;
        Ok(())
    }

    pub async fn add_comment(&self, id: &str, comment: Comment) -> Result<()> {
        self.mutate(id, |post| {
            post.base.add_comment(comment.clone());
            Ok(true)
        })
        .await?;
        Ok(())
    }

    /// Returns whether a top-level comment with that id was removed.
    pub async fn remove_comment(&self, id: &str, comment_id: &str) -> Result<bool> {
        self.mutate(id, |post| Ok(post.base.remove_comment(comment_id).is_some()))
            .await
    }

    /// Fails with `InvalidTransition` when the post is already `Deleted`.
    pub async fn edit_visibility(&self, id: &str, visibility: Visibility, at: DateTime<Utc>) -> Result<()> {
        self.mutate(id, |post| {
            let current = post.base.visibility();
            if post.edit_visibility(visibility, at) {
                Ok(true)
            } else {
                tracing::warn!(id = post.id(), %current, %visibility, "visibility change refused");
                Err(ContentError::InvalidTransition {
                    from: current.to_string(),
                    to: visibility.to_string(),
                })
            }
        })
        .await?;
        Ok(())
    }

    pub async fn extend_expiration(&self, id: &str, by: Duration) -> Result<()> {
        self.mutate(id, |post| {
            let story = post
                .as_story_mut()
                .ok_or_else(|| ContentError::invalid("Story", "post has no expiration"))?;
            story.extend_expiration(by);
            Ok(true)
        })
        .await?;
        Ok(())
    }

    pub async fn react(&self, id: &str, reaction: &str) -> Result<()> {
        self.mutate(id, |post| {
            let story = post
                .as_story_mut()
                .ok_or_else(|| ContentError::invalid("Story", "post does not take reactions"))?;
            story.react(reaction);
            Ok(true)
        })
        .await?;
        Ok(())
    }
}

impl ContentRepository<Comment> {
    pub fn comments(store: Arc<dyn DocumentStore>, options: RepositoryOptions) -> Self {
        Self::new(store, COMMENT_COLLECTION, options)
    }

    pub async fn add_reply(&self, id: &str, reply: Comment) -> Result<()> {
        self.mutate(id, |comment| {
            comment.add_reply(reply.clone());
            Ok(true)
        })
        .await?;
        Ok(())
    }

    /// Returns whether a direct reply with that id was removed.
    pub async fn delete_reply(&self, id: &str, reply_id: &str) -> Result<bool> {
        self.mutate(id, |comment| Ok(comment.remove_reply(reply_id).is_some()))
            .await
    }

    /// Direct overwrite of status and text; deletion is terminal.
    pub async fn mark_as_deleted(&self, id: &str) -> Result<()> {
        let mut fields = Record::new();
        fields.insert("status".into(), CommentStatus::Deleted.as_str().into());
        fields.insert("text".into(), DELETED_PLACEHOLDER.into());
        self.write_fields(id, fields).await
    }

    /// Leaves a deleted comment untouched.
    pub async fn mark_as_reported(&self, id: &str) -> Result<()> {
        self.mutate(id, |comment| Ok(comment.report())).await?;
        Ok(())
    }
}

impl ContentRepository<Media> {
    pub fn media(store: Arc<dyn DocumentStore>, options: RepositoryOptions) -> Self {
        Self::new(store, MEDIA_COLLECTION, options)
    }

    pub async fn update_file_url(&self, id: &str, url: Option<String>) -> Result<()> {
        let mut fields = Record::new();
        fields.insert("fileURL".into(), url.into());
        self.write_fields(id, fields).await
    }

    pub async fn update_title(&self, id: &str, title: Option<String>) -> Result<()> {
        let mut fields = Record::new();
        fields.insert("title".into(), title.into());
        self.write_fields(id, fields).await
    }

    /// Ignored for images. Returns whether the duration was stored.
    pub async fn update_duration(&self, id: &str, duration: Duration) -> Result<bool> {
        self.mutate(id, |media| Ok(media.set_duration(duration))).await
    }

    /// Switching to `Image` also clears the stored duration.
    pub async fn change_type(&self, id: &str, media_type: MediaType) -> Result<()> {
        self.mutate(id, |media| {
            media.set_media_type(media_type);
            Ok(true)
        })
        .await?;
        Ok(())
    }
}
