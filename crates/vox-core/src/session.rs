//! Session lifecycle: creation, activity tracking, interruption counting,
//! and inactivity-driven expiry via a background janitor.
//!
//! The janitor loop is the same shape as a lease-expiry sweep: a
//! `tokio::time::interval` ticking against a `CancellationToken`, so it
//! shuts down cleanly alongside the rest of the process.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::SessionManagerError;
use crate::ids::new_id;
use crate::types::{Session, SessionStatus};

#[derive(Debug, Clone, Copy)]
pub struct SessionManagerConfig {
    pub inactivity_timeout: chrono::Duration,
    pub ended_retention: chrono::Duration,
}

impl SessionManagerConfig {
    /// `inactivity_timeout <= 0` falls back to two minutes. `ended_retention
    /// <= 0` disables pruning of ended sessions entirely.
    pub fn new(inactivity_timeout: chrono::Duration, ended_retention: chrono::Duration) -> Self {
        let inactivity_timeout = if inactivity_timeout <= chrono::Duration::zero() {
            chrono::Duration::minutes(2)
        } else {
            inactivity_timeout
        };
        Self {
            inactivity_timeout,
            ended_retention,
        }
    }
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self::new(chrono::Duration::minutes(2), chrono::Duration::zero())
    }
}

/// Invoked once per session that transitions to `ended`, whether by an
/// explicit `end()` call or by janitor-driven inactivity expiry.
pub type ExpireHook = Arc<dyn Fn(Session) + Send + Sync>;

struct SessionManagerState {
    sessions: HashMap<String, Session>,
    active_by_user: HashMap<String, String>,
    janitor_ticks: u64,
    last_janitor_run: Option<DateTime<Utc>>,
}

pub struct SessionManager {
    state: RwLock<SessionManagerState>,
    config: SessionManagerConfig,
    expire_hook: RwLock<Option<ExpireHook>>,
}

impl SessionManager {
    pub fn new(config: SessionManagerConfig) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(SessionManagerState {
                sessions: HashMap::new(),
                active_by_user: HashMap::new(),
                janitor_ticks: 0,
                last_janitor_run: None,
            }),
            config,
            expire_hook: RwLock::new(None),
        })
    }

    pub fn set_expire_hook(&self, hook: ExpireHook) {
        *self.expire_hook.write().unwrap() = Some(hook);
    }

    fn fire_expire_hook(&self, session: Session) {
        let hook = self.expire_hook.read().unwrap().clone();
        if let Some(hook) = hook {
            hook(session);
        }
    }

    pub fn create(&self, user_id: &str, persona_id: &str, voice_id: Option<&str>) -> Session {
        let now = Utc::now();
        let session = Session {
            id: new_id(),
            user_id: user_id.to_string(),
            persona_id: persona_id.to_string(),
            voice_id: voice_id.map(str::to_string),
            status: SessionStatus::Active,
            active_turn_id: None,
            interruption_count: 0,
            started_at: now,
            last_activity_at: now,
        };

        let mut state = self.state.write().unwrap();
        state.sessions.insert(session.id.clone(), session.clone());
        state
            .active_by_user
            .insert(user_id.to_string(), session.id.clone());
        session
    }

    pub fn get(&self, session_id: &str) -> Result<Session, SessionManagerError> {
        self.state
            .read()
            .unwrap()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionManagerError::NotFound(session_id.to_string()))
    }

    pub fn touch(&self, session_id: &str) -> Result<Session, SessionManagerError> {
        let mut state = self.state.write().unwrap();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionManagerError::NotFound(session_id.to_string()))?;
        session.last_activity_at = Utc::now();
        Ok(session.clone())
    }

    pub fn start_turn(
        &self,
        session_id: &str,
        turn_id: &str,
    ) -> Result<Session, SessionManagerError> {
        let mut state = self.state.write().unwrap();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionManagerError::NotFound(session_id.to_string()))?;
        session.active_turn_id = Some(turn_id.to_string());
        session.last_activity_at = Utc::now();
        Ok(session.clone())
    }

    pub fn interrupt(&self, session_id: &str) -> Result<Session, SessionManagerError> {
        let mut state = self.state.write().unwrap();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionManagerError::NotFound(session_id.to_string()))?;
        session.interruption_count += 1;
        session.last_activity_at = Utc::now();
        Ok(session.clone())
    }

    pub fn end(&self, session_id: &str) -> Result<Session, SessionManagerError> {
        let now = Utc::now();
        let snapshot = {
            let mut state = self.state.write().unwrap();
            let session = state
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| SessionManagerError::NotFound(session_id.to_string()))?;
            if session.status == SessionStatus::Ended {
                return Ok(session.clone());
            }
            session.status = SessionStatus::Ended;
            session.active_turn_id = None;
            session.last_activity_at = now;
            let snapshot = session.clone();
            if state.active_by_user.get(&snapshot.user_id) == Some(&snapshot.id) {
                state.active_by_user.remove(&snapshot.user_id);
            }
            snapshot
        };
        self.fire_expire_hook(snapshot.clone());
        Ok(snapshot)
    }

    pub fn active_count(&self) -> usize {
        self.state
            .read()
            .unwrap()
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .count()
    }

    pub fn janitor_tick_count(&self) -> u64 {
        self.state.read().unwrap().janitor_ticks
    }

    pub fn last_janitor_run(&self) -> Option<DateTime<Utc>> {
        self.state.read().unwrap().last_janitor_run
    }

    /// Runs one expiry sweep: ends active sessions idle past
    /// `inactivity_timeout`, then removes ended sessions past
    /// `ended_retention` (when retention is enabled).
    pub fn sweep(&self, now: DateTime<Utc>) {
        let expired = {
            let mut state = self.state.write().unwrap();
            state.janitor_ticks += 1;
            state.last_janitor_run = Some(now);

            let timeout = self.config.inactivity_timeout;
            let to_expire: Vec<String> = state
                .sessions
                .values()
                .filter(|s| s.status == SessionStatus::Active && now - s.last_activity_at > timeout)
                .map(|s| s.id.clone())
                .collect();

            let mut expired = Vec::with_capacity(to_expire.len());
            for id in to_expire {
                if let Some(session) = state.sessions.get_mut(&id) {
                    session.status = SessionStatus::Ended;
                    session.active_turn_id = None;
                    session.last_activity_at = now;
                    let snapshot = session.clone();
                    if state.active_by_user.get(&snapshot.user_id) == Some(&snapshot.id) {
                        state.active_by_user.remove(&snapshot.user_id);
                    }
                    expired.push(snapshot);
                }
            }

            if self.config.ended_retention > chrono::Duration::zero() {
                let retention = self.config.ended_retention;
                let to_prune: Vec<String> = state
                    .sessions
                    .values()
                    .filter(|s| {
                        s.status == SessionStatus::Ended && now - s.last_activity_at > retention
                    })
                    .map(|s| s.id.clone())
                    .collect();
                for id in to_prune {
                    state.sessions.remove(&id);
                }
            }

            expired
        };

        for session in expired {
            self.fire_expire_hook(session);
        }
    }

    /// Spawns the background janitor loop and returns its handle. Drop the
    /// `CancellationToken` (or call `cancel()`) to stop it.
    pub fn start_janitor(
        self: &Arc<Self>,
        cancel: CancellationToken,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.sweep(Utc::now());
                    }
                    _ = cancel.cancelled() => {
                        tracing::info!("session janitor stopped");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn create_get_touch_roundtrip() {
        let mgr = SessionManager::new(SessionManagerConfig::default());
        let s = mgr.create("u1", "p1", Some("v1"));
        assert_eq!(mgr.get(&s.id).unwrap().id, s.id);
        assert_eq!(mgr.active_count(), 1);

        let touched = mgr.touch(&s.id).unwrap();
        assert!(touched.last_activity_at >= s.last_activity_at);
    }

    #[test]
    fn end_fires_hook_and_clears_active_count() {
        let mgr = SessionManager::new(SessionManagerConfig::default());
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        mgr.set_expire_hook(Arc::new(move |_s| {
            fired2.fetch_add(1, Ordering::SeqCst);
        }));

        let s = mgr.create("u1", "p1", None);
        mgr.end(&s.id).unwrap();
        assert_eq!(mgr.active_count(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // ending again is a no-op, hook does not fire twice
        mgr.end(&s.id).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sweep_expires_inactive_sessions() {
        let mgr = SessionManager::new(SessionManagerConfig::new(
            chrono::Duration::seconds(30),
            chrono::Duration::zero(),
        ));
        let s = mgr.create("u1", "p1", None);
        let later = s.last_activity_at + chrono::Duration::seconds(31);
        mgr.sweep(later);
        assert_eq!(mgr.get(&s.id).unwrap().status, SessionStatus::Ended);
        assert_eq!(mgr.janitor_tick_count(), 1);
    }

    #[test]
    fn sweep_prunes_ended_sessions_past_retention() {
        let mgr = SessionManager::new(SessionManagerConfig::new(
            chrono::Duration::seconds(30),
            chrono::Duration::seconds(60),
        ));
        let s = mgr.create("u1", "p1", None);
        mgr.end(&s.id).unwrap();
        let later = Utc::now() + chrono::Duration::seconds(61);
        mgr.sweep(later);
        assert!(mgr.get(&s.id).is_err());
    }
}
