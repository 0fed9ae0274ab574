//! Feed polling: fetch RSS documents and turn their items into posts.
//!
//! - [`parser`] - RSS 2.0 decoding with `quick-xml` and HTML unescaping
//! - [`fetcher`] - single-attempt HTTP retrieval with a timeout and size limit
//! - [`ingest`] - item to post conversion and duplicate-tolerant storage
//! - [`scheduler`] - the fixed-rate loop that ties the three together
//!
//! # Example
//!
//! ```ignore
//! use gator::feed::{Fetcher, Scheduler};
//!
//! let fetcher = Fetcher::new("gator", Duration::from_secs(10))?;
//! let scheduler = Scheduler::from_interval_str(db, fetcher, "1m")?;
//! scheduler.run().await;
//! ```

pub mod fetcher;
pub mod ingest;
pub mod parser;
pub mod scheduler;

pub use fetcher::{FetchError, Fetcher, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use ingest::{parse_published_at, IngestReport, Ingestor, PUBLISHED_AT_FORMAT};
pub use parser::{parse_feed, ParsedFeedDocument, ParsedItem};
pub use scheduler::{ConfigurationError, CycleOutcome, Scheduler};
