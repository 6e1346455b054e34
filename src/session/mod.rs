use crate::providers::base::Message;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 30;

/// One completed exchange within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub agent: String,
}

/// A conversation session. History is append-only: each turn adds exactly
/// one exchange once the turn has fully completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub history: Vec<Exchange>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            last_activity: now,
            history: Vec::new(),
        }
    }

    /// Convert stored history into the message sequence the engine expects.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() * 2);
        for exchange in &self.history {
            messages.push(Message::user(&exchange.user));
            messages.push(Message::assistant(&exchange.agent, None));
        }
        messages
    }
}

/// In-memory session store with idle expiry. Expired sessions are dropped
/// lazily on access and eagerly via `cleanup_expired`.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Session>>,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(timeout_minutes: i64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout: Duration::minutes(timeout_minutes),
        }
    }

    pub async fn create(&self) -> Session {
        let session = Session::new();
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Fetch a live session. Returns `None` (and drops the entry) when the
    /// session does not exist or has been idle past the timeout.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(id) {
            Some(session) if Utc::now() - session.last_activity <= self.timeout => {
                Some(session.clone())
            }
            Some(_) => {
                sessions.remove(id);
                None
            }
            None => None,
        }
    }

    /// Append a completed exchange to a session's history.
    pub async fn record(&self, id: &str, user: &str, agent: &str) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(id) {
            session.history.push(Exchange {
                timestamp: Utc::now(),
                user: user.to_string(),
                agent: agent.to_string(),
            });
            session.last_activity = Utc::now();
        }
    }

    pub async fn delete(&self, id: &str) {
        self.sessions.lock().await.remove(id);
    }

    pub async fn cleanup_expired(&self) -> usize {
        let cutoff = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| cutoff - s.last_activity <= self.timeout);
        before - sessions.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TIMEOUT_MINUTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_returns_empty_session() {
        let manager = SessionManager::default();
        let session = manager.create().await;
        assert!(session.history.is_empty());
        assert!(manager.get(&session.id).await.is_some());
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let manager = SessionManager::default();
        assert!(manager.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn record_appends_in_order() {
        let manager = SessionManager::default();
        let session = manager.create().await;
        manager.record(&session.id, "My fridge leaks", "Which brand?").await;
        manager.record(&session.id, "Whirlpool", "Here are some parts...").await;

        let session = manager.get(&session.id).await.unwrap();
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].user, "My fridge leaks");
        assert_eq!(session.history[1].agent, "Here are some parts...");
    }

    #[tokio::test]
    async fn to_messages_alternates_roles() {
        let manager = SessionManager::default();
        let session = manager.create().await;
        manager.record(&session.id, "hello", "hi there").await;

        let messages = manager.get(&session.id).await.unwrap().to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[1].content, "hi there");
    }

    #[tokio::test]
    async fn idle_sessions_expire_on_access() {
        let manager = SessionManager::new(0);
        let session = manager.create().await;
        // Zero-minute timeout: anything older than "now" is expired.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(manager.get(&session.id).await.is_none());
    }

    #[tokio::test]
    async fn cleanup_drops_only_expired_sessions() {
        let manager = SessionManager::new(0);
        manager.create().await;
        manager.create().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let removed = manager.cleanup_expired().await;
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let manager = SessionManager::default();
        let session = manager.create().await;
        manager.delete(&session.id).await;
        assert!(manager.get(&session.id).await.is_none());
    }
}
