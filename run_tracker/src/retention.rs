use chrono::{DateTime, TimeDelta, Utc};
use run_tracker_data_management::{DataManagerError, RunStore};

/// Unix millis `days` before `now`, or `None` when that lies outside the representable dates.
pub fn retention_cutoff(now: DateTime<Utc>, days: u32) -> Option<i64> {
    let retention = TimeDelta::try_days(days as i64)?;
    now.checked_sub_signed(retention).map(|cutoff| cutoff.timestamp_millis())
}

/// Deletes finished sessions started before `cutoff` (unix millis) along with their
/// raw points. Active sessions are never touched. Returns how many were removed.
pub async fn prune_sessions(store: &impl RunStore, cutoff: i64) -> Result<usize, DataManagerError> {
    let mut removed = 0;

    for session in store.list_finished_sessions().await? {
        if session.start_time >= cutoff {
            continue;
        }

        store.delete_raw_points_for_session(&session.session_id).await?;
        store.delete_session(&session.session_id).await?;
        tracing::debug!("Pruned session {}", session.session_id);
        removed += 1;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use run_tracker_data_management::MemoryStore;
    use run_tracker_lib::{coordinate::Coordinate, position_fix::PositionFix, session::Session};

    use super::*;

    async fn add_session(store: &MemoryStore, id: &str, start_time: i64, active: bool) {
        let mut session = Session::new(id.into(), start_time);
        store.insert_session(&session).await.unwrap();
        store.insert_raw_point(id, &PositionFix::new(Coordinate::new(1., 1.), 0., 5., 1., start_time)).await.unwrap();
        session.active = active;
        store.update_session(&session).await.unwrap();
    }

    #[test]
    fn cutoff_is_days_before_now() {
        let now = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        assert_eq!(retention_cutoff(now, 0), Some(1_700_000_000_000));
        assert_eq!(retention_cutoff(now, 90), Some(1_700_000_000_000 - 90 * 86_400_000));
    }

    #[test]
    fn cutoff_before_earliest_date_is_none() {
        let now = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        assert_eq!(retention_cutoff(now, u32::MAX), None);
    }

    #[tokio::test]
    async fn removes_only_old_finished_sessions() {
        let store = MemoryStore::new();
        add_session(&store, "old", 1_000, false).await;
        add_session(&store, "old_but_running", 1_000, true).await;
        add_session(&store, "recent", 9_000, false).await;

        assert_eq!(prune_sessions(&store, 5_000).await.unwrap(), 1);

        assert_eq!(store.get_session_by_id("old").await.unwrap(), None);
        assert!(store.get_raw_points_for_session("old").await.unwrap().is_empty());
        assert!(store.get_session_by_id("old_but_running").await.unwrap().is_some());
        assert_eq!(store.get_raw_points_for_session("recent").await.unwrap().len(), 1);
    }
}
