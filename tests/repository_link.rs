use chrono::{Duration, Utc};
use click_shortener::domain::entities::NewLink;
use click_shortener::domain::repositories::LinkStore;
use click_shortener::error::AppError;
use click_shortener::infrastructure::persistence::PgLinkStore;
use sqlx::PgPool;
use std::sync::Arc;

fn new_link(alias: &str) -> NewLink {
    NewLink {
        alias: alias.to_string(),
        original_url: "https://example.com".to_string(),
        expires_at: None,
    }
}

#[sqlx::test]
async fn test_create_then_find(pool: PgPool) {
    let store = PgLinkStore::new(Arc::new(pool));
    let expires_at = Utc::now() + Duration::days(1);

    let created = store
        .create(NewLink {
            alias: "test123".to_string(),
            original_url: "https://example.com/page".to_string(),
            expires_at: Some(expires_at),
        })
        .await
        .unwrap();
    assert_eq!(created.click_count, 0);

    let found = store.find_by_alias("test123").await.unwrap().unwrap();
    assert_eq!(found.alias, "test123");
    assert_eq!(found.original_url, "https://example.com/page");
    // TIMESTAMPTZ keeps microseconds only
    let drift = found.expires_at.unwrap() - expires_at;
    assert!(drift.num_milliseconds().abs() < 1);
}

#[sqlx::test]
async fn test_find_by_alias_not_found(pool: PgPool) {
    let store = PgLinkStore::new(Arc::new(pool));

    let result = store.find_by_alias("notfound").await.unwrap();

    assert!(result.is_none());
}

#[sqlx::test]
async fn test_create_duplicate_alias(pool: PgPool) {
    let store = PgLinkStore::new(Arc::new(pool));

    store.create(new_link("dup")).await.unwrap();
    let result = store.create(new_link("dup")).await;

    assert!(matches!(result, Err(AppError::Conflict { .. })));
}

#[sqlx::test]
async fn test_concurrent_increments_are_not_lost(pool: PgPool) {
    let store = Arc::new(PgLinkStore::new(Arc::new(pool)));
    store.create(new_link("hot")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..100 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.increment_clicks("hot").await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let link = store.find_by_alias("hot").await.unwrap().unwrap();
    assert_eq!(link.click_count, 100);
}

#[sqlx::test]
async fn test_increment_unknown_alias_is_noop(pool: PgPool) {
    let store = PgLinkStore::new(Arc::new(pool));

    assert!(store.increment_clicks("ghost").await.is_ok());
    assert!(store.find_by_alias("ghost").await.unwrap().is_none());
}

#[sqlx::test]
async fn test_ping(pool: PgPool) {
    let store = PgLinkStore::new(Arc::new(pool));

    assert!(store.ping().await);
}
