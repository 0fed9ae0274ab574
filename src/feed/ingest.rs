use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::feed::parser::{ParsedFeedDocument, ParsedItem};
use crate::storage::{FeedStore, NewPost, StoreError};

/// Publish dates are expected in RFC 1123 form with a numeric zone,
/// e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
pub const PUBLISHED_AT_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Per-document ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Items present in the document
    pub seen: usize,
    /// Posts newly stored
    pub created: usize,
    /// Items whose URL was already stored
    pub duplicates: usize,
    /// Items without a link
    pub skipped: usize,
    /// Items the store failed to persist
    pub failed: usize,
}

/// Turns parsed feed items into stored posts.
pub struct Ingestor<S> {
    store: S,
}

impl<S: FeedStore> Ingestor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Store every item of `doc` as a post of `feed_id`, in document order.
    ///
    /// Never fails: duplicates are counted and skipped quietly, other storage
    /// errors are logged and skipped, and the remaining items are still
    /// processed.
    pub async fn ingest(&self, doc: &ParsedFeedDocument, feed_id: Uuid) -> IngestReport {
        let mut report = IngestReport {
            seen: doc.items.len(),
            ..IngestReport::default()
        };

        for item in &doc.items {
            if item.link.is_empty() {
                tracing::warn!(feed_id = %feed_id, title = %item.title, "Item has no link, skipping");
                report.skipped += 1;
                continue;
            }

            let post = new_post(item, feed_id, Utc::now());
            match self.store.create_post(&post).await {
                Ok(_) => report.created += 1,
                Err(StoreError::DuplicateUrl(url)) => {
                    tracing::debug!(feed_id = %feed_id, url = %url, "Post already stored");
                    report.duplicates += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        feed_id = %feed_id,
                        url = %item.link,
                        error = %e,
                        "Failed to store post"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            feed_id = %feed_id,
            seen = report.seen,
            created = report.created,
            duplicates = report.duplicates,
            skipped = report.skipped,
            failed = report.failed,
            "Ingested feed items"
        );

        report
    }
}

fn new_post(item: &ParsedItem, feed_id: Uuid, now: DateTime<Utc>) -> NewPost {
    let description = if item.description.is_empty() {
        None
    } else {
        Some(item.description.clone())
    };

    NewPost {
        id: Uuid::new_v4(),
        feed_id,
        title: item.title.clone(),
        url: item.link.clone(),
        description,
        published_at: parse_published_at(&item.pub_date),
        created_at: now,
        updated_at: now,
    }
}

/// Parse a publish date in [`PUBLISHED_AT_FORMAT`]; anything else is `None`.
pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw.trim(), PUBLISHED_AT_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
