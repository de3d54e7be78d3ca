use std::sync::Arc;

use domains::{ContentError, DocumentStore, MockDocumentStore, Post};
use integration_tests::{check_store_contract, epoch, memory_store, posts_repo, ContendedStore};

#[tokio::test]
async fn test_memory_store_contract() {
    check_store_contract(memory_store()).await;
}

#[tokio::test]
async fn test_contended_store_passes_contract_without_conflicts() {
    check_store_contract(Arc::new(ContendedStore::new(memory_store(), 0))).await;
}

#[tokio::test]
async fn test_unavailable_store_fails_every_operation() {
    let mut store = MockDocumentStore::new();
    store
        .expect_get()
        .returning(|_, _| Err(ContentError::StoreUnavailable("timeout".into())));
    store
        .expect_commit()
        .returning(|_, _, _, _| Err(ContentError::StoreUnavailable("timeout".into())));
    let store: Arc<dyn DocumentStore> = Arc::new(store);
    let repo = posts_repo(store);
    let post = Post::standard("p1", "u1", "hi", epoch());

    let unavailable = ContentError::StoreUnavailable("timeout".into());
    assert_eq!(repo.create(&post).await.unwrap_err(), unavailable);
    assert_eq!(repo.read("p1").await.unwrap_err(), unavailable);
    assert_eq!(repo.update(&post).await.unwrap_err(), unavailable);
    assert_eq!(repo.delete("p1").await.unwrap_err(), unavailable);
    assert_eq!(repo.increment_shares("p1").await.unwrap_err(), unavailable);
}
