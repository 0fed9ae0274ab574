use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::schema::{is_unique_violation, Database};
use super::types::{to_millis, Feed, FeedRow, NewFeed, StoreError};

const FEED_COLUMNS: &str = "id, name, url, user_id, created_at, updated_at, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a new feed. The URL must not already be registered.
    pub async fn create_feed(&self, feed: &NewFeed) -> Result<Feed, StoreError> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let row: FeedRow = sqlx::query_as(&format!(
            "INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(id.to_string())
        .bind(to_millis(now))
        .bind(to_millis(now))
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(feed.user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("feed {}", feed.url))
            } else {
                StoreError::Database(e)
            }
        })?;

        row.into_feed()
    }

    /// Look up a feed by its source URL
    pub async fn feed_by_url(&self, url: &str) -> Result<Option<Feed>, StoreError> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"))
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;
        row.map(FeedRow::into_feed).transpose()
    }

    /// All feeds, oldest first
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, StoreError> {
        let rows: Vec<FeedRow> = sqlx::query_as(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(FeedRow::into_feed).collect()
    }

    /// The feed with the smallest `last_fetched_at`; never-fetched feeds come first.
    pub async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, StoreError> {
        let row: Option<FeedRow> = sqlx::query_as(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds
             ORDER BY last_fetched_at ASC NULLS FIRST, created_at, id
             LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        row.map(FeedRow::into_feed).transpose()
    }

    /// Set `last_fetched_at` (and `updated_at`) to `at`. Idempotent.
    pub async fn set_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
            .bind(to_millis(at))
            .bind(to_millis(at))
            .bind(feed_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("feed {feed_id}")));
        }
        Ok(())
    }

    /// Select the least recently fetched feed and stamp it with `at` in one
    /// statement.
    ///
    /// The subquery and the UPDATE run as a single SQLite write, so two
    /// processes polling the same database can never claim the same feed for
    /// the same tick.
    pub async fn claim_feed(&self, at: DateTime<Utc>) -> Result<Option<Feed>, StoreError> {
        let row: Option<FeedRow> = sqlx::query_as(&format!(
            "UPDATE feeds SET last_fetched_at = ?, updated_at = ?
             WHERE id = (
                 SELECT id FROM feeds
                 ORDER BY last_fetched_at ASC NULLS FIRST, created_at, id
                 LIMIT 1
             )
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(to_millis(at))
        .bind(to_millis(at))
        .fetch_optional(&self.pool)
        .await?;
        row.map(FeedRow::into_feed).transpose()
    }
}
