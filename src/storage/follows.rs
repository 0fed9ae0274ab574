use chrono::Utc;
use uuid::Uuid;

use super::schema::{is_unique_violation, Database};
use super::types::{to_millis, FeedFollow, FeedFollowRow, StoreError};

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Follow a feed. Following the same feed twice is a `Conflict`.
    pub async fn create_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> Result<FeedFollow, StoreError> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(to_millis(now))
        .bind(to_millis(now))
        .bind(user_id.to_string())
        .bind(feed_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("follow of feed {}", feed_id))
            } else {
                StoreError::Database(e)
            }
        })?;

        let row: FeedFollowRow = sqlx::query_as(
            r#"
                SELECT ff.id, ff.user_id, ff.feed_id, ff.created_at, ff.updated_at,
                       u.name AS user_name, f.name AS feed_name
                FROM feed_follows ff
                JOIN users u ON u.id = ff.user_id
                JOIN feeds f ON f.id = ff.feed_id
                WHERE ff.id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await?;
        row.into_follow()
    }

    /// Follows of one user, ordered by feed name
    pub async fn feed_follows_for_user(&self, user_id: Uuid) -> Result<Vec<FeedFollow>, StoreError> {
        let rows: Vec<FeedFollowRow> = sqlx::query_as(
            r#"
                SELECT ff.id, ff.user_id, ff.feed_id, ff.created_at, ff.updated_at,
                       u.name AS user_name, f.name AS feed_name
                FROM feed_follows ff
                JOIN users u ON u.id = ff.user_id
                JOIN feeds f ON f.id = ff.feed_id
                WHERE ff.user_id = ?
                ORDER BY f.name
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(FeedFollowRow::into_follow).collect()
    }

    /// Remove a follow. Returns `NotFound` when the user was not following the feed.
    pub async fn delete_feed_follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id.to_string())
            .bind(feed_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("follow of feed {}", feed_id)));
        }
        Ok(())
    }
}
