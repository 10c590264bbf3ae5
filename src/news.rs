//! Fetching, normalizing and caching news feeds.

pub mod article;
mod error;
pub mod feed;
pub mod provider;

pub use self::article::{Article, FeedPage};
pub use self::error::NewsError;
pub use self::feed::FeedService;
pub use self::provider::NewsProvider;
