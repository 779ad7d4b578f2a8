//! Session store
//!
//! Holds every live call in memory. Each session sits behind its own async
//! mutex: different calls never contend, and a second request for a call
//! that is already mid-turn fails fast with `Busy` instead of queueing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use cold_call_config::CallConfig;

use crate::session::Session;
use crate::{CallError, Result};

struct StoreEntry {
    session: Arc<Mutex<Session>>,
    last_activity: RwLock<Instant>,
    /// Set once the call reaches END
    ended_at: RwLock<Option<Instant>>,
}

impl StoreEntry {
    fn new(session: Session) -> Self {
        let ended_at = session.is_call_over().then(Instant::now);
        Self {
            session: Arc::new(Mutex::new(session)),
            last_activity: RwLock::new(Instant::now()),
            ended_at: RwLock::new(ended_at),
        }
    }

    fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    fn mark_ended(&self) {
        let mut ended_at = self.ended_at.write();
        if ended_at.is_none() {
            *ended_at = Some(Instant::now());
        }
    }

    fn is_expired(&self, idle_expiry: Duration, ended_retention: Duration) -> bool {
        if let Some(ended) = *self.ended_at.read() {
            if ended.elapsed() > ended_retention {
                return true;
            }
        }
        self.last_activity.read().elapsed() > idle_expiry
    }
}

/// Exclusive access to one session for the duration of a turn.
///
/// Dropping the lease without calling [`SessionLease::commit`] leaves the
/// stored session untouched.
pub struct SessionLease {
    entry: Arc<StoreEntry>,
    guard: OwnedMutexGuard<Session>,
}

impl SessionLease {
    pub fn session(&self) -> &Session {
        &self.guard
    }

    /// Replace the stored session with the updated copy
    pub fn commit(mut self, updated: Session) {
        let ended = updated.is_call_over();
        *self.guard = updated;
        self.entry.touch();
        if ended {
            self.entry.mark_ended();
        }
    }
}

/// In-memory session store
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<StoreEntry>>>,
    max_sessions: usize,
    idle_expiry: Duration,
    ended_retention: Duration,
    cleanup_interval: Duration,
}

impl SessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self::from_config(&CallConfig {
            max_sessions,
            ..CallConfig::default()
        })
    }

    pub fn from_config(config: &CallConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: config.max_sessions,
            idle_expiry: config.idle_expiry(),
            ended_retention: config.ended_retention(),
            cleanup_interval: config.cleanup_interval(),
        }
    }

    /// Override the expiry windows
    pub fn with_expiry(mut self, idle_expiry: Duration, ended_retention: Duration) -> Self {
        self.idle_expiry = idle_expiry;
        self.ended_retention = ended_retention;
        self
    }

    /// Expired and not held by a turn in flight
    fn expired(&self, entry: &StoreEntry) -> bool {
        entry.is_expired(self.idle_expiry, self.ended_retention) && entry.session.try_lock().is_ok()
    }

    /// Look up an entry, dropping it if it has expired
    fn live_entry(&self, id: &str) -> Option<Arc<StoreEntry>> {
        let entry = self.sessions.read().get(id).cloned()?;
        if self.expired(&entry) {
            let mut sessions = self.sessions.write();
            if sessions.get(id).is_some_and(|current| Arc::ptr_eq(current, &entry)) {
                sessions.remove(id);
            }
            tracing::info!(session_id = %id, "Expired session dropped on lookup");
            return None;
        }
        Some(entry)
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.live_entry(id).is_some()
    }

    /// Store a freshly started session
    pub fn insert(&self, session: Session) -> Result<()> {
        let id = session.session_id.clone();
        let mut sessions = self.sessions.write();

        if let Some(existing) = sessions.get(&id) {
            if !self.expired(existing) {
                return Err(CallError::DuplicateSession(id));
            }
            sessions.remove(&id);
        }

        if sessions.len() >= self.max_sessions {
            self.cleanup_expired_internal(&mut sessions);

            if sessions.len() >= self.max_sessions {
                return Err(CallError::CapacityExceeded(self.max_sessions));
            }
        }

        sessions.insert(id.clone(), Arc::new(StoreEntry::new(session)));
        tracing::info!(session_id = %id, "Created session");

        Ok(())
    }

    /// Take exclusive access to a session, failing fast if it is in use
    pub fn acquire(&self, id: &str) -> Result<SessionLease> {
        let entry = self
            .live_entry(id)
            .ok_or_else(|| CallError::UnknownSession(id.to_string()))?;

        let guard = Arc::clone(&entry.session)
            .try_lock_owned()
            .map_err(|_| CallError::Busy(id.to_string()))?;
        entry.touch();

        Ok(SessionLease { entry, guard })
    }

    /// Copy of a session, waiting for any in-flight turn to finish
    pub async fn snapshot(&self, id: &str) -> Result<Session> {
        let entry = self
            .live_entry(id)
            .ok_or_else(|| CallError::UnknownSession(id.to_string()))?;
        let session = entry.session.lock().await;
        Ok(session.clone())
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        match self.sessions.write().remove(id) {
            Some(_) => {
                tracing::info!(session_id = %id, "Removed session");
                Ok(())
            }
            None => Err(CallError::UnknownSession(id.to_string())),
        }
    }

    /// Number of sessions held, including ended ones still retained
    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn list(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Remove expired sessions, returning how many were dropped
    pub fn evict_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        self.cleanup_expired_internal(&mut sessions)
    }

    fn cleanup_expired_internal(&self, sessions: &mut HashMap<String, Arc<StoreEntry>>) -> usize {
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, e)| self.expired(e))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
            tracing::info!(session_id = %id, "Expired session");
        }

        expired.len()
    }

    /// Start a background task that periodically evicts expired sessions.
    ///
    /// Send `true` on the returned channel to stop it.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let store = Arc::clone(self);
        let interval = store.cleanup_interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let removed = store.evict_expired();
                        if removed > 0 {
                            tracing::info!(
                                "Session cleanup: removed {} expired sessions ({} remaining)",
                                removed,
                                store.count()
                            );
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Session cleanup task shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
