use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::User;
use crate::storage::KeyValueStorage;

/// Storage key for the single session slot.
pub const SESSION_KEY: &str = "user_session";

/// Session lifetime in hours. The window slides forward on every refresh,
/// so an active client never expires.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Length of the random portion of a session id.
const SESSION_ID_RANDOM_LEN: usize = 9;

/// The persisted session: the authenticated user, an absolute expiry, and a
/// client-generated identifier. The identifier is local bookkeeping only,
/// not a credential; the server's cookie is the real secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user: User,
    /// Persisted as epoch milliseconds under the wire name `expiry`.
    #[serde(rename = "expiry", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }
}

/// Generate a fresh session id of the form `sess_<random>_<millis>`.
fn generate_session_id() -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!(
        "sess_{}_{}",
        random.to_lowercase(),
        Utc::now().timestamp_millis()
    )
}

/// Persistent store for the single session slot.
///
/// Every method degrades storage failures to "no session": a corrupt or
/// unreadable record is indistinguishable from an absent one, and the slot
/// is cleared so the next read starts clean. Nothing here returns an error
/// to the caller.
pub struct SessionStore {
    storage: Box<dyn KeyValueStorage>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(storage: Box<dyn KeyValueStorage>) -> Self {
        Self::with_ttl(storage, Duration::hours(SESSION_TTL_HOURS))
    }

    pub fn with_ttl(storage: Box<dyn KeyValueStorage>, ttl: Duration) -> Self {
        Self { storage, ttl }
    }

    /// Create and persist a new session for `user`, overwriting any
    /// existing record.
    pub fn save(&mut self, user: &User) -> SessionRecord {
        let record = SessionRecord {
            user: user.clone(),
            expires_at: Utc::now() + self.ttl,
            session_id: generate_session_id(),
        };
        self.persist(&record);
        record
    }

    /// Read the current session. Missing, unparsable, or expired records
    /// all come back as `None`, and the slot is cleared as a side effect so
    /// a bad record is never observed twice.
    pub fn load(&mut self) -> Option<SessionRecord> {
        let raw = match self.storage.get(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read session slot, treating as absent");
                self.clear();
                return None;
            }
        };

        let record: SessionRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Stored session is unparsable, clearing it");
                self.clear();
                return None;
            }
        };

        if record.is_expired() {
            debug!(session_id = %record.session_id, "Stored session expired, clearing it");
            self.clear();
            return None;
        }

        Some(record)
    }

    /// Remove the persisted record unconditionally. Idempotent.
    pub fn clear(&mut self) {
        if let Err(e) = self.storage.remove(SESSION_KEY) {
            warn!(error = %e, "Failed to clear session slot");
        }
    }

    /// Slide the expiry window forward on a valid session. Returns `None`
    /// without side effects when no valid session exists.
    pub fn refresh(&mut self) -> Option<SessionRecord> {
        let mut record = self.load()?;
        record.expires_at = Utc::now() + self.ttl;
        self.persist(&record);
        debug!(
            session_id = %record.session_id,
            expires_at = %record.expires_at,
            "Session refreshed"
        );
        Some(record)
    }

    /// Cheap probe for "is there a live session".
    pub fn is_valid(&mut self) -> bool {
        self.load().is_some()
    }

    fn persist(&mut self, record: &SessionRecord) {
        match serde_json::to_string(record) {
            Ok(raw) => {
                if let Err(e) = self.storage.set(SESSION_KEY, &raw) {
                    warn!(error = %e, "Failed to persist session record");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize session record"),
        }
    }

    /// Overwrite the stored record as-is, expiry included. Used by the
    /// lifecycle layer's tests and by nothing else.
    #[cfg(test)]
    pub(crate) fn store_raw(&mut self, record: &SessionRecord) {
        self.persist(record);
    }
}
