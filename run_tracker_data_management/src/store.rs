use async_trait::async_trait;
use run_tracker_lib::{position_fix::PositionFix, session::Session};

use crate::DataManagerError;

/// Durable storage of sessions and their raw position fixes.
///
/// `update_session` never inserts: updating an unknown session fails with
/// [`DataManagerError::MissingSession`]. Raw points come back ordered by timestamp,
/// ties in insertion order.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<(), DataManagerError>;

    async fn update_session(&self, session: &Session) -> Result<(), DataManagerError>;

    /// The most recently started session still marked active, if any.
    async fn get_active_session(&self) -> Result<Option<Session>, DataManagerError>;

    async fn get_session_by_id(&self, session_id: &str) -> Result<Option<Session>, DataManagerError>;

    async fn insert_raw_point(&self, session_id: &str, fix: &PositionFix) -> Result<(), DataManagerError>;

    async fn get_raw_points_for_session(&self, session_id: &str) -> Result<Vec<PositionFix>, DataManagerError>;

    async fn delete_raw_points_for_session(&self, session_id: &str) -> Result<(), DataManagerError>;

    /// Sessions no longer active, newest first.
    async fn list_finished_sessions(&self) -> Result<Vec<Session>, DataManagerError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), DataManagerError>;
}

#[cfg(test)]
mod tests {
    use run_tracker_lib::coordinate::Coordinate;

    use super::*;
    use crate::{MemoryStore, RunDatabase};

    fn fix(latitude: f64, timestamp: i64) -> PositionFix {
        PositionFix::new(Coordinate::new(latitude, 10.2), 12.0, 5.0, 2.5, timestamp)
    }

    async fn exercise_store(store: impl RunStore) {
        assert_eq!(store.get_active_session().await.unwrap(), None);

        let older = Session::new("older".into(), 1_000);
        store.insert_session(&older).await.unwrap();
        let newer = Session::new("newer".into(), 2_000);
        store.insert_session(&newer).await.unwrap();

        assert_eq!(store.get_active_session().await.unwrap(), Some(newer.clone()));
        assert!(store.insert_session(&newer).await.is_err());

        // Out of order timestamps come back sorted
        store.insert_raw_point("newer", &fix(56.1, 3_000)).await.unwrap();
        store.insert_raw_point("newer", &fix(56.2, 2_500)).await.unwrap();
        store.insert_raw_point("newer", &fix(56.3, 3_000)).await.unwrap();
        let points = store.get_raw_points_for_session("newer").await.unwrap();
        assert_eq!(points.iter().map(|p| p.latitude).collect::<Vec<_>>(), vec![56.2, 56.1, 56.3]);
        assert_eq!(points[0], fix(56.2, 2_500));
        assert!(store.get_raw_points_for_session("older").await.unwrap().is_empty());

        let mut finished = newer.clone();
        finished.active = false;
        finished.end_time = Some(9_000);
        finished.duration = 7_000;
        finished.distance = 1234.5;
        finished.avg_speed = 2.5;
        finished.max_speed = 4.0;
        finished.encoded_path = "_p~iF~ps|U".into();
        store.update_session(&finished).await.unwrap();

        assert_eq!(store.get_session_by_id("newer").await.unwrap(), Some(finished.clone()));
        assert_eq!(store.get_active_session().await.unwrap(), Some(older.clone()));
        assert_eq!(store.list_finished_sessions().await.unwrap(), vec![finished.clone()]);

        let missing = Session::new("missing".into(), 0);
        assert_eq!(store.update_session(&missing).await, Err(DataManagerError::MissingSession("missing".into())));
        assert_eq!(store.get_session_by_id("missing").await.unwrap(), None);

        store.delete_raw_points_for_session("newer").await.unwrap();
        assert!(store.get_raw_points_for_session("newer").await.unwrap().is_empty());

        store.delete_session("newer").await.unwrap();
        assert_eq!(store.get_session_by_id("newer").await.unwrap(), None);
        assert!(store.list_finished_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_store_contract() {
        exercise_store(MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_store_contract() {
        exercise_store(RunDatabase::in_memory().await.unwrap()).await;
    }

    #[tokio::test]
    async fn raw_points_need_a_session() {
        let memory = MemoryStore::new();
        assert!(memory.insert_raw_point("nope", &fix(1.0, 1)).await.is_err());

        let db = RunDatabase::in_memory().await.unwrap();
        assert!(db.insert_raw_point("nope", &fix(1.0, 1)).await.is_err());
    }
}
