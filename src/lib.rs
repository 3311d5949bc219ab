//! coursecache - client core for an e-learning platform.
//!
//! This crate is the non-visual core of a course platform client: it owns
//! the authenticated session (persisted locally with a sliding 24 hour
//! expiry and revalidated by a background task) and a tag-based cache that
//! keeps fetched server resources consistent after mutations. UI layers
//! sit on top and only ever call [`Client`] and read [`auth::AuthState`].

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthState, SessionController, SessionRecord, SessionStore};
pub use cache::{Mutation, Query, Tag, TagCache};
pub use client::Client;
pub use config::Config;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
