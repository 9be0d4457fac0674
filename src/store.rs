//! Session store boundary
//!
//! Sessions are owned by an external store; this crate only asks whether a session
//! is scheduled at a given minute.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{Result, Session};

/// Read-only access to scheduled sessions.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// The session scheduled in the same minute as `at`, if any.
    async fn session_at(&self, at: DateTime<Utc>) -> Result<Option<Session>>;
}

fn minute(at: &DateTime<Utc>) -> i64 {
    at.timestamp().div_euclid(60)
}

/// Session store held in memory, seeded from configuration.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<Vec<Session>>,
}

impl InMemorySessionStore {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self { sessions: RwLock::new(sessions) }
    }

    pub fn insert(&self, session: Session) {
        self.sessions.write().push(session);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn session_at(&self, at: DateTime<Utc>) -> Result<Option<Session>> {
        let target = minute(&at);
        Ok(self.sessions.read().iter().find(|s| minute(&s.scheduled_time) == target).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn matches_on_the_minute() {
        let at = Utc.with_ymd_and_hms(2025, 7, 6, 14, 0, 0).unwrap();
        let store = InMemorySessionStore::new(vec![Session::new("f1", "gp", at)]);

        let hit = store.session_at(at + chrono::Duration::seconds(42)).await.unwrap();
        assert_eq!(hit.map(|s| s.session_key), Some("gp".to_string()));

        assert!(store.session_at(at + chrono::Duration::seconds(60)).await.unwrap().is_none());
        assert!(store.session_at(at - chrono::Duration::seconds(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inserted_sessions_are_visible() {
        let store = InMemorySessionStore::default();
        assert!(store.is_empty());
        let at = Utc.with_ymd_and_hms(2025, 7, 5, 10, 30, 0).unwrap();
        store.insert(Session::new("f2", "sprint", at));
        assert_eq!(store.len(), 1);
        assert!(store.session_at(at).await.unwrap().is_some());
    }
}
