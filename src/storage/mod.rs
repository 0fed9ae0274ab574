mod feeds;
mod follows;
mod memory;
mod posts;
mod schema;
mod store;
mod types;
mod users;

pub use memory::MemoryStore;
pub use schema::Database;
pub use store::FeedStore;
pub use types::{
    DatabaseError, Feed, FeedFollow, NewFeed, NewPost, Post, StoreError, User,
};
