use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use run_tracker_lib::{position_fix::PositionFix, session::Session};
use tokio::sync::Mutex;

use crate::{DataManagerError, RunStore};

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    raw_points: HashMap<String, Vec<PositionFix>>,
}

/**
 * MemoryStore keeps sessions and raw points in process memory.
 * Clones share the same data.
 */
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<(), DataManagerError> {
        let mut inner = self.inner.lock().await;
        if inner.sessions.contains_key(&session.session_id) {
            return Err(DataManagerError::Database(format!("Session {} already exists", session.session_id)));
        }
        inner.sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn update_session(&self, session: &Session) -> Result<(), DataManagerError> {
        let mut inner = self.inner.lock().await;
        let stored = inner.sessions.get_mut(&session.session_id)
            .ok_or_else(|| DataManagerError::MissingSession(session.session_id.clone()))?;
        *stored = session.clone();
        Ok(())
    }

    async fn get_active_session(&self) -> Result<Option<Session>, DataManagerError> {
        let inner = self.inner.lock().await;
        Ok(inner.sessions.values()
            .filter(|session| session.active)
            .max_by_key(|session| session.start_time)
            .cloned())
    }

    async fn get_session_by_id(&self, session_id: &str) -> Result<Option<Session>, DataManagerError> {
        Ok(self.inner.lock().await.sessions.get(session_id).cloned())
    }

    async fn insert_raw_point(&self, session_id: &str, fix: &PositionFix) -> Result<(), DataManagerError> {
        let mut inner = self.inner.lock().await;
        if !inner.sessions.contains_key(session_id) {
            return Err(DataManagerError::MissingSession(session_id.to_string()));
        }
        inner.raw_points.entry(session_id.to_string()).or_default().push(fix.clone());
        Ok(())
    }

    async fn get_raw_points_for_session(&self, session_id: &str) -> Result<Vec<PositionFix>, DataManagerError> {
        let inner = self.inner.lock().await;
        let mut points = inner.raw_points.get(session_id).cloned().unwrap_or_default();
        // Stable, so equal timestamps keep insertion order
        points.sort_by_key(|point| point.timestamp);
        Ok(points)
    }

    async fn delete_raw_points_for_session(&self, session_id: &str) -> Result<(), DataManagerError> {
        self.inner.lock().await.raw_points.remove(session_id);
        Ok(())
    }

    async fn list_finished_sessions(&self) -> Result<Vec<Session>, DataManagerError> {
        let inner = self.inner.lock().await;
        let mut sessions: Vec<Session> = inner.sessions.values()
            .filter(|session| !session.active)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), DataManagerError> {
        let mut inner = self.inner.lock().await;
        inner.sessions.remove(session_id);
        inner.raw_points.remove(session_id);
        Ok(())
    }
}
