//! # Content Service
//!
//! Entry point for the UI layer. Builds new entities from the injected
//! clock, id source and the caller's session, then hands them to the
//! per-collection repositories.

use std::sync::Arc;
use std::time::Duration;

use domains::{
    Clock, Comment, ContentError, DiscussionDetails, DocumentStore, IdGenerator, Media, Post,
    PostKind, Result, SessionProvider, Visibility, DEFAULT_STORY_DURATION,
};

use crate::repository::{ContentRepository, RepositoryOptions};

pub struct ContentService {
    posts: ContentRepository<Post>,
    stories: ContentRepository<Post>,
    discussions: ContentRepository<Post>,
    comments: ContentRepository<Comment>,
    media: ContentRepository<Media>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    story_duration: Duration,
}

fn author(session: &dyn SessionProvider) -> Result<String> {
    session.current_user_id().ok_or(ContentError::Unauthenticated)
}

impl ContentService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        options: RepositoryOptions,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            posts: ContentRepository::posts(store.clone(), options),
            stories: ContentRepository::stories(store.clone(), options),
            discussions: ContentRepository::discussion_posts(store.clone(), options),
            comments: ContentRepository::comments(store.clone(), options),
            media: ContentRepository::media(store, options),
            clock,
            ids,
            story_duration: DEFAULT_STORY_DURATION,
        }
    }

    /// Lifetime given to stories published from now on.
    pub fn with_story_duration(mut self, duration: Duration) -> Self {
        self.story_duration = duration;
        self
    }

    pub fn repository(&self, kind: PostKind) -> &ContentRepository<Post> {
        match kind {
            PostKind::Standard => &self.posts,
            PostKind::Discussion => &self.discussions,
            PostKind::Story => &self.stories,
        }
    }

    pub fn comments(&self) -> &ContentRepository<Comment> {
        &self.comments
    }

    pub fn media(&self) -> &ContentRepository<Media> {
        &self.media
    }

    pub async fn publish_post(
        &self,
        session: &dyn SessionProvider,
        caption: &str,
        media: Vec<Media>,
        tags: &[&str],
    ) -> Result<Post> {
        let mut post = Post::standard(self.ids.next_id(), author(session)?, caption, self.clock.now());
        for item in media {
            post.base.add_media(item);
        }
        for tag in tags {
            post.base.add_tag(tag);
        }
        self.posts.create(&post).await?;
        tracing::info!(post_id = post.id(), "post published");
        Ok(post)
    }

    pub async fn publish_story(
        &self,
        session: &dyn SessionProvider,
        caption: &str,
        media: Vec<Media>,
    ) -> Result<Post> {
        let mut story = Post::story(
            self.ids.next_id(),
            author(session)?,
            caption,
            self.clock.now(),
            self.story_duration,
        );
        for item in media {
            story.base.add_media(item);
        }
        self.stories.create(&story).await?;
        tracing::info!(story_id = story.id(), "story published");
        Ok(story)
    }

    pub async fn open_discussion(
        &self,
        session: &dyn SessionProvider,
        community_id: &str,
        title: &str,
        body: &str,
    ) -> Result<Post> {
        let details = DiscussionDetails::new(community_id, title, body);
        let post = Post::discussion(self.ids.next_id(), author(session)?, details, self.clock.now());
        self.discussions.create(&post).await?;
        tracing::info!(post_id = post.id(), community_id, "discussion opened");
        Ok(post)
    }

    /// Attaches a top-level comment to the post, then stores it on its own.
    /// If the second write fails the embedded copy is removed again.
    pub async fn comment_on(
        &self,
        session: &dyn SessionProvider,
        kind: PostKind,
        post_id: &str,
        text: &str,
    ) -> Result<Comment> {
        let comment = Comment::new(self.ids.next_id(), author(session)?, post_id, text, self.clock.now());
        let posts = self.repository(kind);
        posts.add_comment(post_id, comment.clone()).await?;
        if let Err(err) = self.comments.create(&comment).await {
            if let Err(undo) = posts.remove_comment(post_id, &comment.id).await {
                tracing::warn!(post_id, comment_id = %comment.id, error = %undo, "orphaned embedded comment");
            }
            return Err(err);
        }
        Ok(comment)
    }

    pub async fn reply_to(
        &self,
        session: &dyn SessionProvider,
        parent_id: &str,
        text: &str,
    ) -> Result<Comment> {
        let user_id = author(session)?;
        let parent = self.comments.read(parent_id).await?;
        let reply = parent.reply(self.ids.next_id(), user_id, text, self.clock.now());
        self.comments.add_reply(parent_id, reply.clone()).await?;
        Ok(reply)
    }

    pub async fn set_visibility(&self, kind: PostKind, post_id: &str, visibility: Visibility) -> Result<()> {
        self.repository(kind)
            .edit_visibility(post_id, visibility, self.clock.now())
            .await
    }

    /// Returns `false` for discussions, which carry a title instead.
    pub async fn edit_caption(&self, kind: PostKind, post_id: &str, caption: &str) -> Result<bool> {
        let repo = self.repository(kind);
        let mut post = repo.read(post_id).await?;
        if !post.edit_caption(caption, self.clock.now()) {
            return Ok(false);
        }
        repo.update(&post).await?;
        Ok(true)
    }

    /// Evaluated against the injected clock on every call.
    pub async fn is_story_expired(&self, story_id: &str) -> Result<bool> {
        let story = self.stories.read(story_id).await?;
        Ok(story.is_expired_at(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use domains::{
        CommitOutcome, MockClock, MockIdGenerator, MockSessionProvider, Precondition, Snapshot,
        Write, COMMENT_COLLECTION,
    };
    use storage_adapters::InMemoryDocumentStore;

    use crate::collaborators::{StaticSession, UuidGenerator};

    fn fixed_clock() -> Arc<dyn Clock> {
        let mut clock = MockClock::new();
        clock
            .expect_now()
            .returning(|| Utc.with_ymd_and_hms(2024, 10, 13, 12, 0, 0).unwrap());
        Arc::new(clock)
    }

    fn service() -> ContentService {
        ContentService::new(
            Arc::new(InMemoryDocumentStore::new()),
            RepositoryOptions::default(),
            fixed_clock(),
            Arc::new(UuidGenerator),
        )
    }

    #[tokio::test]
    async fn test_publish_requires_session() {
        let mut session = MockSessionProvider::new();
        session.expect_current_user_id().returning(|| None);

        let err = service().publish_post(&session, "hi", vec![], &[]).await.unwrap_err();
        assert_eq!(err, ContentError::Unauthenticated);
    }

    #[tokio::test]
    async fn test_publish_uses_injected_ids() {
        let mut ids = MockIdGenerator::new();
        ids.expect_next_id().times(1).returning(|| "p-42".to_string());
        let service = ContentService::new(
            Arc::new(InMemoryDocumentStore::new()),
            RepositoryOptions::default(),
            fixed_clock(),
            Arc::new(ids),
        );

        let post = service
            .publish_post(&StaticSession::signed_in("u1"), "hi", vec![], &["a", "a", "b"])
            .await
            .unwrap();
        assert_eq!(post.id(), "p-42");
        assert_eq!(post.base.tags(), ["a".to_string(), "b".to_string()]);
        assert_eq!(service.repository(PostKind::Standard).read("p-42").await.unwrap(), post);
    }

    #[tokio::test]
    async fn test_comment_and_reply() {
        let service = service();
        let session = StaticSession::signed_in("u1");
        let post = service.publish_post(&session, "hi", vec![], &[]).await.unwrap();

        let comment = service
            .comment_on(&session, PostKind::Standard, post.id(), "first")
            .await
            .unwrap();
        let reply = service.reply_to(&session, &comment.id, "second").await.unwrap();
        assert_eq!(reply.parent_id.as_deref(), Some(comment.id.as_str()));

        let stored = service.comments().read(&comment.id).await.unwrap();
        assert_eq!(stored.replies(), [reply]);
        let post = service.repository(PostKind::Standard).read(post.id()).await.unwrap();
        assert_eq!(post.base.comment_count(), 1);
    }

    #[tokio::test]
    async fn test_comment_on_missing_post_stores_nothing() {
        let service = service();
        let err = service
            .comment_on(&StaticSession::signed_in("u1"), PostKind::Story, "nope", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_edit_caption_by_kind() {
        let service = service();
        let session = StaticSession::signed_in("u1");
        let story = service.publish_story(&session, "old", vec![]).await.unwrap();
        let discussion = service.open_discussion(&session, "c1", "Q", "?").await.unwrap();

        assert!(service.edit_caption(PostKind::Story, story.id(), "new").await.unwrap());
        assert!(!service
            .edit_caption(PostKind::Discussion, discussion.id(), "new")
            .await
            .unwrap());

        let stored = service.repository(PostKind::Story).read(story.id()).await.unwrap();
        assert_eq!(stored.caption(), Some("new"));
        assert!(stored.base.edit_mark().is_edited);
    }

    #[tokio::test]
    async fn test_story_duration_is_configurable() {
        let service = service().with_story_duration(Duration::from_secs(60));
        let story = service
            .publish_story(&StaticSession::signed_in("u1"), "quick", vec![])
            .await
            .unwrap();
        let details = story.as_story().unwrap();
        assert_eq!(details.expires_at() - story.base.created_at, chrono::Duration::seconds(60));
        assert!(!service.is_story_expired(story.id()).await.unwrap());
    }

    /// Accepts everything except writes to the comment collection.
    struct CommentsDown(InMemoryDocumentStore);

    #[async_trait]
    impl DocumentStore for CommentsDown {
        async fn get(&self, collection: &str, id: &str) -> Result<Option<Snapshot>> {
            self.0.get(collection, id).await
        }

        async fn commit(
            &self,
            collection: &str,
            id: &str,
            precondition: Precondition,
            write: Write,
        ) -> Result<CommitOutcome> {
            if collection == COMMENT_COLLECTION {
                return Err(ContentError::StoreUnavailable("comments offline".into()));
            }
            self.0.commit(collection, id, precondition, write).await
        }
    }

    #[tokio::test]
    async fn test_failed_comment_write_leaves_post_untouched() {
        let service = ContentService::new(
            Arc::new(CommentsDown(InMemoryDocumentStore::new())),
            RepositoryOptions::default(),
            fixed_clock(),
            Arc::new(UuidGenerator),
        );
        let session = StaticSession::signed_in("u1");
        let post = service.publish_post(&session, "hi", vec![], &[]).await.unwrap();

        let err = service
            .comment_on(&session, PostKind::Standard, post.id(), "lost")
            .await
            .unwrap_err();
        assert_eq!(err, ContentError::StoreUnavailable("comments offline".into()));

        let stored = service.repository(PostKind::Standard).read(post.id()).await.unwrap();
        assert_eq!(stored.base.comment_count(), 0);
    }
}
