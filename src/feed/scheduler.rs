use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::feed::fetcher::{FetchError, Fetcher};
use crate::feed::ingest::{IngestReport, Ingestor};
use crate::storage::FeedStore;
use crate::util::{parse_interval, IntervalError};

/// Fatal startup errors; nothing raised after the loop starts is fatal.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid poll interval: {0}")]
    InvalidInterval(#[from] IntervalError),
    #[error("Poll interval must be positive")]
    NonPositiveInterval,
}

/// What a single fetch cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The store has no feeds
    Idle,
    /// The feed was fetched and its items ingested
    Fetched { feed_id: Uuid, report: IngestReport },
    /// The feed was claimed but could not be fetched
    FetchFailed { feed_id: Uuid, error: FetchError },
    /// Claiming a feed failed
    StoreUnavailable,
}

/// Polls one feed per tick, least recently fetched first.
pub struct Scheduler<S> {
    store: S,
    fetcher: Fetcher,
    ingestor: Ingestor<S>,
    interval: Duration,
}

impl<S: FeedStore + Clone> Scheduler<S> {
    pub fn new(store: S, fetcher: Fetcher, interval: Duration) -> Result<Self, ConfigurationError> {
        if interval.is_zero() {
            return Err(ConfigurationError::NonPositiveInterval);
        }
        Ok(Self {
            ingestor: Ingestor::new(store.clone()),
            store,
            fetcher,
            interval,
        })
    }

    /// Same as [`Scheduler::new`], parsing a human-readable interval (`"1m"`, `"30s"`)
    pub fn from_interval_str(
        store: S,
        fetcher: Fetcher,
        interval: &str,
    ) -> Result<Self, ConfigurationError> {
        Self::new(store, fetcher, parse_interval(interval)?)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run fetch cycles forever: one immediately, then one per interval.
    ///
    /// Ticks are fixed-rate. A cycle that overruns the interval delays the
    /// next one; ticks missed meanwhile are dropped rather than replayed.
    pub async fn run(&self) {
        tracing::info!(interval = ?self.interval, "Collecting feeds");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// Claim the least recently fetched feed, fetch it and ingest its items.
    ///
    /// The feed is stamped as fetched before the request goes out, so a slow
    /// or failing fetch still moves it to the back of the queue.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let feed = match self.store.claim_next_feed(Utc::now()).await {
            Ok(Some(feed)) => feed,
            Ok(None) => {
                tracing::info!("No feeds to fetch");
                return CycleOutcome::Idle;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to select next feed");
                return CycleOutcome::StoreUnavailable;
            }
        };

        tracing::info!(feed_id = %feed.id, name = %feed.name, url = %feed.url, "Fetching feed");

        match self.fetcher.fetch(&feed.url).await {
            Ok(doc) => {
                let report = self.ingestor.ingest(&doc, feed.id).await;
                tracing::info!(
                    name = %feed.name,
                    created = report.created,
                    seen = report.seen,
                    "Feed collected"
                );
                CycleOutcome::Fetched {
                    feed_id: feed.id,
                    report,
                }
            }
            Err(error) => {
                tracing::warn!(
                    feed_id = %feed.id,
                    url = %feed.url,
                    error = %error,
                    "Failed to fetch feed"
                );
                CycleOutcome::FetchFailed {
                    feed_id: feed.id,
                    error,
                }
            }
        }
    }
}
