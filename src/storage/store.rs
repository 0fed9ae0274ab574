use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::schema::Database;
use super::types::{Feed, NewPost, Post, StoreError};

/// The store operations the polling pipeline depends on.
///
/// [`Database`] is the SQLite implementation; [`MemoryStore`](super::MemoryStore)
/// is an in-memory fake for tests.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// The feed with the smallest last-fetched time, never-fetched feeds first.
    async fn get_next_feed_to_fetch(&self) -> Result<Option<Feed>, StoreError>;

    /// Set a feed's last-fetched time to `at`. Idempotent.
    async fn mark_feed_fetched_at(&self, feed_id: Uuid, at: DateTime<Utc>)
        -> Result<(), StoreError>;

    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<(), StoreError> {
        self.mark_feed_fetched_at(feed_id, Utc::now()).await
    }

    /// Atomically select the next feed to fetch and mark it fetched at `at`.
    ///
    /// Returns the feed with `last_fetched_at` already set to `at`, or `None`
    /// when the store holds no feeds.
    async fn claim_next_feed(&self, at: DateTime<Utc>) -> Result<Option<Feed>, StoreError>;

    /// Insert a post; a URL that is already stored yields [`StoreError::DuplicateUrl`].
    async fn create_post(&self, post: &NewPost) -> Result<Post, StoreError>;

    async fn get_feed(&self, url: &str) -> Result<Option<Feed>, StoreError>;

    async fn get_feeds(&self) -> Result<Vec<Feed>, StoreError>;
}

#[async_trait]
impl FeedStore for Database {
    async fn get_next_feed_to_fetch(&self) -> Result<Option<Feed>, StoreError> {
        self.next_feed_to_fetch().await
    }

    async fn mark_feed_fetched_at(
        &self,
        feed_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.set_feed_fetched(feed_id, at).await
    }

    async fn claim_next_feed(&self, at: DateTime<Utc>) -> Result<Option<Feed>, StoreError> {
        self.claim_feed(at).await
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post, StoreError> {
        self.insert_post(post).await
    }

    async fn get_feed(&self, url: &str) -> Result<Option<Feed>, StoreError> {
        self.feed_by_url(url).await
    }

    async fn get_feeds(&self) -> Result<Vec<Feed>, StoreError> {
        self.list_feeds().await
    }
}
