use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::models::User;

use super::session::{SessionRecord, SessionStore};

/// Default period between revalidation ticks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Process-wide authentication state. Readable from anywhere; written only
/// by the [`SessionController`].
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub session_id: Option<String>,
}

impl AuthState {
    fn from_record(record: &SessionRecord) -> Self {
        Self {
            user: Some(record.user.clone()),
            is_authenticated: true,
            session_id: Some(record.session_id.clone()),
        }
    }
}

struct ControllerInner {
    store: Mutex<SessionStore>,
    state: RwLock<AuthState>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every logout. A revalidation tick captures the epoch when
    /// it fires and discards its work if the value moved meanwhile, so a
    /// logout racing a tick always wins.
    epoch: AtomicU64,
    check_interval: Duration,
}

/// Orchestrates login/logout/refresh transitions between the persistent
/// session store and the in-memory auth state, and owns the background
/// revalidation task. Cloning shares the same controller.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

impl SessionController {
    /// Build the controller, restoring auth state from the persisted
    /// session if a live one exists. No network involved.
    pub fn new(mut store: SessionStore, check_interval: Duration) -> Self {
        let state = store
            .load()
            .map(|record| AuthState::from_record(&record))
            .unwrap_or_default();
        if state.is_authenticated {
            debug!(session_id = ?state.session_id, "Restored session from storage");
        }
        Self {
            inner: Arc::new(ControllerInner {
                store: Mutex::new(store),
                state: RwLock::new(state),
                task: Mutex::new(None),
                epoch: AtomicU64::new(0),
                check_interval,
            }),
        }
    }

    pub async fn state(&self) -> AuthState {
        self.inner.state.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.read().await.is_authenticated
    }

    pub async fn current_user(&self) -> Option<User> {
        self.inner.state.read().await.user.clone()
    }

    /// Record a successful login: persist a fresh session, flip the state
    /// to authenticated, and start the revalidation task.
    pub async fn login(&self, user: User) -> SessionRecord {
        let record = self.inner.store.lock().await.save(&user);
        *self.inner.state.write().await = AuthState::from_record(&record);
        info!(session_id = %record.session_id, "User logged in");
        self.start_revalidation().await;
        record
    }

    /// Explicit logout: stop the revalidation task, clear storage, reset
    /// state. Always ends Unauthenticated, whatever else is in flight.
    pub async fn logout(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.stop_revalidation().await;
        self.inner.store.lock().await.clear();
        *self.inner.state.write().await = AuthState::default();
        info!("User logged out");
    }

    /// The 401 path: the server no longer honors our credential, so the
    /// local session is terminated. The local TTL is only an optimistic
    /// cache of the server's opinion.
    pub async fn handle_auth_rejection(&self) {
        if self.is_authenticated().await {
            warn!("Server rejected credentials, terminating local session");
        }
        self.logout().await;
    }

    /// Start the background revalidation task. Returns `false` without
    /// spawning when a task is already running, so a second login never
    /// creates a duplicate timer.
    pub async fn start_revalidation(&self) -> bool {
        let mut task = self.inner.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Revalidation task already running");
            return false;
        }

        let inner = Arc::clone(&self.inner);
        let period = self.inner.check_interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the session was just
            // saved, so skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let epoch = inner.epoch.load(Ordering::SeqCst);
                if !Self::periodic_check(&inner, epoch).await {
                    debug!("Revalidation task stopping");
                    break;
                }
            }
        }));
        debug!(period_secs = period.as_secs(), "Revalidation task started");
        true
    }

    /// Abort the revalidation task. Effective immediately for future
    /// ticks; a tick already past its epoch capture discards itself.
    pub async fn stop_revalidation(&self) {
        if let Some(handle) = self.inner.task.lock().await.take() {
            handle.abort();
        }
    }

    /// Whether a revalidation task is currently live (spawned and not yet
    /// self-terminated or stopped).
    pub async fn revalidation_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// One revalidation tick. Returns `true` when the session is still
    /// live and the task should keep running.
    async fn periodic_check(inner: &ControllerInner, epoch: u64) -> bool {
        let mut store = inner.store.lock().await;

        if !store.is_valid() {
            drop(store);
            // The slot is already clear (load self-heals); only the state
            // transition remains.
            *inner.state.write().await = AuthState::default();
            debug!("Session expired, forcing unauthenticated state");
            return false;
        }

        // A logout may have landed between this tick firing and the lock
        // being acquired. Its clear() has priority over our refresh.
        if inner.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Discarding revalidation tick superseded by logout");
            return false;
        }

        match store.refresh() {
            Some(record) => {
                drop(store);
                *inner.state.write().await = AuthState::from_record(&record);
                true
            }
            None => {
                drop(store);
                *inner.state.write().await = AuthState::default();
                false
            }
        }
    }
}
