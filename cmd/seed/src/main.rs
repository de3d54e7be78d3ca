//! # seed
//!
//! Loads configuration, opens the configured document store and writes a
//! small demo data set: one post with a comment thread, one story and one
//! discussion.

use std::sync::Arc;

use anyhow::Context;
use configs::{AppConfig, LogConfig, StoreBackend};
use domains::{DocumentStore, Media, MediaType, PostKind};
use services::{ContentService, RepositoryOptions, StaticSession, SystemClock, UuidGenerator};
use storage_adapters::InMemoryDocumentStore;
use tracing_subscriber::EnvFilter;

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryDocumentStore::new())),
        #[cfg(feature = "db-sqlite")]
        StoreBackend::Sqlite => {
            use secrecy::ExposeSecret;
            let store = storage_adapters::SqliteDocumentStore::connect(config.store.database_url.expose_secret())
                .await
                .context("opening sqlite store")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "db-sqlite"))]
        StoreBackend::Sqlite => anyhow::bail!("store.backend = sqlite needs the db-sqlite feature"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.log);

    let store = open_store(&config).await?;
    let options = RepositoryOptions {
        max_attempts: config.transaction.max_attempts,
        backoff_base: config.transaction.backoff_base(),
        media_index_policy: config.content.media_index_policy,
    };
    let service = ContentService::new(store, options, Arc::new(SystemClock), Arc::new(UuidGenerator))
        .with_story_duration(config.content.story_duration());

    let alice = StaticSession::signed_in("alice");
    let bob = StaticSession::signed_in("bob");

    let cover = Media::new(
        "seed-cover",
        MediaType::Image,
        None,
        Some("Harbour at dusk".into()),
        Some("alice".into()),
        Some("https://cdn.example/seed-cover.jpg".into()),
    );
    let post = service
        .publish_post(&alice, "First light over the harbour", vec![cover], &["photography", "sea"])
        .await?;
    let comment = service
        .comment_on(&bob, PostKind::Standard, post.id(), "Stunning colours")
        .await?;
    service.reply_to(&alice, &comment.id, "Thanks! Shot at 6am").await?;
    service.repository(PostKind::Standard).increment_likes(post.id()).await?;
    service.comments().increment_likes(&comment.id).await?;

    let story = service.publish_story(&bob, "Morning run", vec![]).await?;
    service.repository(PostKind::Story).react(story.id(), "🔥").await?;

    let discussion = service
        .open_discussion(&alice, "photographers", "Favourite lens?", "Primes or zooms for street work?")
        .await?;

    let post = service.repository(PostKind::Standard).read(post.id()).await?;
    tracing::info!(
        post_id = post.id(),
        likes = post.base.likes(),
        comments = post.base.comment_count(),
        story_id = story.id(),
        discussion_id = discussion.id(),
        backend = ?config.store.backend,
        "seed data written"
    );
    Ok(())
}
