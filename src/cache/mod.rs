//! Tag-based cache for server resources.
//!
//! Reads register their results under tags; mutations invalidate tags.
//! The mapping in both directions lives in `tags` as a declarative table,
//! and `store` holds the tagged entries. Together they guarantee that a
//! read never returns data a completed mutation has made stale.

pub mod store;
pub mod tags;

pub use store::TagCache;
pub use tags::{invalidated_tags, provided_tags, Mutation, Query, Tag};
