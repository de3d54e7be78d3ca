//! End-to-end flows through the repositories and the content service.

use std::sync::Arc;
use std::time::Duration;

use domains::{
    Comment, CommentStatus, ContentError, Document, Media, MediaIndexPolicy, Post, PostKind,
    Visibility, DELETED_PLACEHOLDER,
};
use integration_tests::{epoch, fast_options, memory_store, posts_repo, service_with_clock, ContendedStore, ManualClock};
use services::{ContentRepository, StaticSession};
use tokio_test::{assert_err, assert_ok};

#[tokio::test(flavor = "multi_thread", worker_threads = 3)]
async fn test_three_concurrent_likes() {
    let repo = posts_repo(Arc::new(ContendedStore::new(memory_store(), 2)));
    repo.create(&Post::standard("p1", "u1", "hi", epoch())).await.unwrap();

    let (a, b, c) = tokio::join!(
        repo.increment_likes("p1"),
        repo.increment_likes("p1"),
        repo.increment_likes("p1"),
    );
    assert_ok!(a);
    assert_ok!(b);
    assert_ok!(c);
    assert_eq!(repo.read("p1").await.unwrap().base.likes(), 3);
}

#[tokio::test]
async fn test_reply_added_then_removed() {
    let repo = ContentRepository::comments(memory_store(), fast_options(5));
    let parent = Comment::new("c1", "u1", "p1", "root", epoch());
    repo.create(&parent).await.unwrap();

    let x = parent.reply("x", "u2", "child", epoch());
    repo.add_reply("c1", x.clone()).await.unwrap();
    assert_eq!(repo.read("c1").await.unwrap().replies(), [x.clone()]);

    assert!(repo.delete_reply("c1", &x.id).await.unwrap());
    assert!(repo.read("c1").await.unwrap().replies().is_empty());
}

#[tokio::test]
async fn test_story_expires_after_clock_advance() {
    let clock = Arc::new(ManualClock::default());
    let service = service_with_clock(clock.clone()).with_story_duration(Duration::from_secs(3600));
    let story = service
        .publish_story(&StaticSession::signed_in("u1"), "brb", vec![])
        .await
        .unwrap();

    assert!(!service.is_story_expired(story.id()).await.unwrap());
    clock.advance(Duration::from_secs(3600));
    assert!(!service.is_story_expired(story.id()).await.unwrap());
    clock.advance(Duration::from_secs(1));
    assert!(service.is_story_expired(story.id()).await.unwrap());

    service
        .repository(PostKind::Story)
        .extend_expiration(story.id(), Duration::from_secs(600))
        .await
        .unwrap();
    assert!(!service.is_story_expired(story.id()).await.unwrap());
}

#[test]
fn test_bogus_visibility_is_invalid_data() {
    let mut record = Post::standard("p1", "u1", "hi", epoch()).to_record();
    record.insert("visibility".into(), "Bogus".into());
    let err = assert_err!(Post::from_record(&record));
    assert!(matches!(err, ContentError::InvalidData { entity: "Post", .. }));
}

#[tokio::test]
async fn test_moderation_flow() {
    let clock = Arc::new(ManualClock::default());
    let service = service_with_clock(clock.clone());
    let author = StaticSession::signed_in("u1");
    let troll = StaticSession::signed_in("u9");

    let post = service.publish_post(&author, "sunset", vec![], &["sky"]).await.unwrap();
    let comment = service
        .comment_on(&troll, PostKind::Standard, post.id(), "boo")
        .await
        .unwrap();

    service.comments().mark_as_reported(&comment.id).await.unwrap();
    assert_eq!(
        service.comments().read(&comment.id).await.unwrap().status(),
        CommentStatus::Reported
    );

    service.comments().mark_as_deleted(&comment.id).await.unwrap();
    service.comments().mark_as_reported(&comment.id).await.unwrap();
    let stored = service.comments().read(&comment.id).await.unwrap();
    assert_eq!(stored.status(), CommentStatus::Deleted);
    assert_eq!(stored.text(), DELETED_PLACEHOLDER);

    clock.advance(Duration::from_secs(60));
    service
        .set_visibility(PostKind::Standard, post.id(), Visibility::Deleted)
        .await
        .unwrap();
    let err = service
        .set_visibility(PostKind::Standard, post.id(), Visibility::Public)
        .await
        .unwrap_err();
    assert!(matches!(err, ContentError::InvalidTransition { .. }));

    let stored = service.repository(PostKind::Standard).read(post.id()).await.unwrap();
    assert_eq!(stored.base.visibility(), Visibility::Deleted);
    assert_eq!(stored.base.edit_mark().edited_at, Some(epoch() + chrono::Duration::seconds(60)));
}

#[tokio::test]
async fn test_anonymous_users_cannot_publish() {
    let service = service_with_clock(Arc::new(ManualClock::default()));
    let nobody = StaticSession::anonymous();

    assert_eq!(
        service.publish_story(&nobody, "hi", vec![]).await.unwrap_err(),
        ContentError::Unauthenticated
    );
    assert_eq!(
        service.open_discussion(&nobody, "c1", "t", "b").await.unwrap_err(),
        ContentError::Unauthenticated
    );
}

#[tokio::test]
async fn test_sequential_ids_and_media_on_publish() {
    let service = service_with_clock(Arc::new(ManualClock::default()));
    let session = StaticSession::signed_in("u1");
    let first = service
        .publish_post(&session, "one", vec![Media::image("m1", None)], &[])
        .await
        .unwrap();
    let second = service.publish_post(&session, "two", vec![], &[]).await.unwrap();

    assert_eq!(first.id(), "id-1");
    assert_eq!(second.id(), "id-2");
    assert_eq!(first.base.media().len(), 1);
}

#[tokio::test]
async fn test_strict_media_policy_end_to_end() {
    let store = memory_store();
    let repo = ContentRepository::posts(
        store,
        services::RepositoryOptions {
            media_index_policy: MediaIndexPolicy::Reject,
            ..fast_options(5)
        },
    );
    repo.create(&Post::standard("p1", "u1", "hi", epoch())).await.unwrap();

    let err = repo
        .replace_media("p1", 0, Media::image("m1", None))
        .await
        .unwrap_err();
    assert_eq!(err, ContentError::IndexOutOfRange { index: 0, len: 0 });
}
