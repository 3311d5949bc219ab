//! Session lifecycle management.
//!
//! This module provides:
//! - `SessionStore`/`SessionRecord`: the persisted single-slot session with
//!   a sliding 24 hour expiry, self-healing on corrupt or stale reads
//! - `SessionController`/`AuthState`: the process-wide authentication state
//!   and its transition API, plus the periodic background revalidation task
//!
//! The controller is the sole writer of both the persisted slot and the
//! in-memory state; everything else reads.

pub mod controller;
pub mod session;

pub use controller::{AuthState, SessionController, DEFAULT_CHECK_INTERVAL};
pub use session::{SessionRecord, SessionStore, SESSION_KEY, SESSION_TTL_HOURS};
