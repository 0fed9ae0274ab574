use uuid::Uuid;

use super::schema::{is_unique_violation, Database};
use super::types::{to_millis, NewPost, Post, PostRow, StoreError};

/// Maximum number of posts returned by a single browse query
const MAX_POSTS: i64 = 2000;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post.
    ///
    /// A post whose URL is already stored, under any feed, is rejected with
    /// [`StoreError::DuplicateUrl`].
    pub async fn insert_post(&self, post: &NewPost) -> Result<Post, StoreError> {
        let row: PostRow = sqlx::query_as(
            "INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id, feed_id, title, url, description, published_at, created_at, updated_at",
        )
        .bind(post.id.to_string())
        .bind(to_millis(post.created_at))
        .bind(to_millis(post.updated_at))
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at.map(to_millis))
        .bind(post.feed_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateUrl(post.url.clone())
            } else {
                StoreError::Database(e)
            }
        })?;
        row.into_post()
    }

    /// Newest posts from the feeds a user follows.
    ///
    /// Posts without a published date sort after dated ones.
    pub async fn posts_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Post>, StoreError> {
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
                SELECT p.id, p.feed_id, p.title, p.url, p.description, p.published_at,
                       p.created_at, p.updated_at
                FROM posts p
                JOIN feed_follows ff ON ff.feed_id = p.feed_id
                WHERE ff.user_id = ?
                ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC
                LIMIT ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(limit.clamp(0, MAX_POSTS))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PostRow::into_post).collect()
    }

    pub async fn posts_for_feed(&self, feed_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
                SELECT id, feed_id, title, url, description, published_at, created_at, updated_at
                FROM posts
                WHERE feed_id = ?
                ORDER BY created_at, id
                LIMIT ?
            "#,
        )
        .bind(feed_id.to_string())
        .bind(MAX_POSTS)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PostRow::into_post).collect()
    }

    pub async fn count_posts(&self) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
