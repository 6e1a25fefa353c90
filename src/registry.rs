//! In-memory session registry
//!
//! Tracks active session metadata for the HTTP API. State is
//! process-lifetime only; nothing is persisted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Capture mode requested for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Screen,
    Camera,
    Hybrid,
}

/// Metadata for one registered session
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    /// Session identifier
    pub id: String,
    /// Capture mode
    pub mode: SessionMode,
    /// Creation timestamp (unix millis)
    pub created_at: i64,
    /// Last activity timestamp (unix millis)
    pub last_seen: i64,
}

/// Registry of active sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session and return its record
    pub async fn create(&self, id: &str, mode: SessionMode) -> SessionRecord {
        let now = chrono::Utc::now().timestamp_millis();
        let record = SessionRecord {
            id: id.to_string(),
            mode,
            created_at: now,
            last_seen: now,
        };
        self.sessions
            .write()
            .await
            .insert(id.to_string(), record.clone());
        record
    }

    /// Look up a session by ID
    pub async fn get(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Update a session's last-seen timestamp; no-op for unknown IDs
    pub async fn touch(&self, id: &str) {
        if let Some(record) = self.sessions.write().await.get_mut(id) {
            record.last_seen = chrono::Utc::now().timestamp_millis();
        }
    }

    /// Remove a session, returning its record if it existed
    pub async fn remove(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.write().await.remove(id)
    }

    /// Number of registered sessions
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_touch_remove() {
        let registry = SessionRegistry::new();

        let record = registry.create("s1", SessionMode::Screen).await;
        assert_eq!(record.id, "s1");
        assert_eq!(registry.count().await, 1);

        registry.touch("s1").await;
        let fetched = registry.get("s1").await.unwrap();
        assert!(fetched.last_seen >= record.last_seen);

        assert!(registry.remove("s1").await.is_some());
        assert!(registry.get("s1").await.is_none());
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn touch_unknown_session_is_a_noop() {
        let registry = SessionRegistry::new();
        registry.touch("missing").await;
        assert_eq!(registry.count().await, 0);
    }
}
