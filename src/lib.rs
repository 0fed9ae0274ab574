//! gator: a command-line RSS aggregator.
//!
//! A single background loop claims the least recently fetched feed, fetches
//! it over HTTP and stores each new item as a post, deduplicated by URL.

pub mod commands;
pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
