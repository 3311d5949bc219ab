//! REST API client module for the e-learning platform services.
//!
//! This module provides the `ApiClient` for communicating with the
//! platform API: auth, course and lecture catalog, purchases, playback
//! progress, and tests.
//!
//! Authentication uses a server-issued session cookie carried by the
//! client's cookie jar; an HTTP 401 from any endpoint means the server no
//! longer honors it.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
