//! In-memory [`FeedStore`] used to exercise the scheduler and ingestor
//! without SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::FeedStore;
use super::types::{Feed, NewPost, Post, StoreError};

#[derive(Default)]
struct Inner {
    feeds: Vec<Feed>,
    posts: Vec<Post>,
    /// Post URLs whose insert should fail with a non-duplicate error
    failing_urls: Vec<String>,
}

/// A cloneable in-memory store. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a never-fetched feed with a random owner
    pub async fn add_feed(&self, name: &str, url: &str) -> Feed {
        let now = Utc::now();
        let feed = Feed {
            id: Uuid::new_v4(),
            name: name.to_string(),
            url: url.to_string(),
            user_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            last_fetched_at: None,
        };
        self.inner.lock().await.feeds.push(feed.clone());
        feed
    }

    pub async fn feed(&self, feed_id: Uuid) -> Option<Feed> {
        let inner = self.inner.lock().await;
        inner.feeds.iter().find(|f| f.id == feed_id).cloned()
    }

    pub async fn posts(&self) -> Vec<Post> {
        self.inner.lock().await.posts.clone()
    }

    /// Make every insert of `url` fail with a storage error
    pub async fn fail_inserts_for(&self, url: &str) {
        self.inner.lock().await.failing_urls.push(url.to_string());
    }
}

/// Never-fetched feeds first, then oldest fetch, then creation order
fn next_index(feeds: &[Feed]) -> Option<usize> {
    feeds
        .iter()
        .enumerate()
        .min_by_key(|(_, f)| (f.last_fetched_at.is_some(), f.last_fetched_at, f.created_at))
        .map(|(i, _)| i)
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn get_next_feed_to_fetch(&self) -> Result<Option<Feed>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(next_index(&inner.feeds).map(|i| inner.feeds[i].clone()))
    }

    async fn mark_feed_fetched_at(
        &self,
        feed_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let feed = inner
            .feeds
            .iter_mut()
            .find(|f| f.id == feed_id)
            .ok_or_else(|| StoreError::NotFound(format!("feed {feed_id}")))?;
        feed.last_fetched_at = Some(at);
        feed.updated_at = at;
        Ok(())
    }

    async fn claim_next_feed(&self, at: DateTime<Utc>) -> Result<Option<Feed>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(i) = next_index(&inner.feeds) else {
            return Ok(None);
        };
        let feed = &mut inner.feeds[i];
        feed.last_fetched_at = Some(at);
        feed.updated_at = at;
        Ok(Some(feed.clone()))
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.failing_urls.contains(&post.url) {
            return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                "injected failure for {}",
                post.url
            ))));
        }
        if inner.posts.iter().any(|p| p.url == post.url) {
            return Err(StoreError::DuplicateUrl(post.url.clone()));
        }
        let stored = Post::from(post.clone());
        inner.posts.push(stored.clone());
        Ok(stored)
    }

    async fn get_feed(&self, url: &str) -> Result<Option<Feed>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.feeds.iter().find(|f| f.url == url).cloned())
    }

    async fn get_feeds(&self) -> Result<Vec<Feed>, StoreError> {
        Ok(self.inner.lock().await.feeds.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_never_fetched_first() {
        let store = MemoryStore::new();
        let a = store.add_feed("a", "https://a.example.com").await;
        let b = store.add_feed("b", "https://b.example.com").await;

        store.mark_feed_fetched(a.id).await.unwrap();
        let next = store.get_next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, b.id);
    }

    #[tokio::test]
    async fn test_claim_marks_feed() {
        let store = MemoryStore::new();
        let a = store.add_feed("a", "https://a.example.com").await;
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let claimed = store.claim_next_feed(at).await.unwrap().unwrap();
        assert_eq!(claimed.id, a.id);
        assert_eq!(store.feed(a.id).await.unwrap().last_fetched_at, Some(at));
    }

    #[tokio::test]
    async fn test_oldest_fetch_wins() {
        let store = MemoryStore::new();
        let a = store.add_feed("a", "https://a.example.com").await;
        let b = store.add_feed("b", "https://b.example.com").await;
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        store.mark_feed_fetched_at(a.id, t).await.unwrap();
        store
            .mark_feed_fetched_at(b.id, t - Duration::hours(1))
            .await
            .unwrap();

        let next = store.get_next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, b.id);
    }

    #[tokio::test]
    async fn test_get_feed_by_url_and_list() {
        let store = MemoryStore::new();
        let a = store.add_feed("a", "https://a.example.com").await;
        let b = store.add_feed("b", "https://b.example.com/rss").await;

        let found = store.get_feed("https://b.example.com/rss").await.unwrap();
        assert_eq!(found.map(|f| f.id), Some(b.id));
        assert!(store.get_feed("https://a.example.com/").await.unwrap().is_none());

        let ids: Vec<Uuid> = store.get_feeds().await.unwrap().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected() {
        let store = MemoryStore::new();
        let feed = store.add_feed("a", "https://a.example.com").await;
        let now = Utc::now();
        let post = NewPost {
            id: Uuid::new_v4(),
            feed_id: feed.id,
            title: "t".into(),
            url: "https://a.example.com/1".into(),
            description: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        };

        store.create_post(&post).await.unwrap();
        let err = store.create_post(&post).await.unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.posts().await.len(), 1);
    }
}
