use run_tracker_data_management::RunStore;
use run_tracker_lib::{position_fix::PositionFix, session::Session, snapshot::Snapshot};
use tokio::sync::watch;

use crate::{aggregate::{PathStep, RunningAggregate}, clock::Clock, summary::SessionSummary, TrackingError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    /// Meters
    pub accuracy_threshold: f64,
    /// Meters
    pub glitch_threshold: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            accuracy_threshold: 40.0,
            glitch_threshold: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingPhase {
    Idle,
    Active,
    Paused,
}

/// How `ingest` treated a fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// Not tracking, or paused
    Ignored,
    /// Coordinates, accuracy or speed outside their valid ranges
    Invalid,
    LowAccuracy,
    /// Persisted and counted for speed, but kept out of the path
    Glitch,
    Accepted,
}

struct ActiveRun {
    session: Session,
    aggregate: RunningAggregate,
}

/// The session tracking state machine.
///
/// Owns the running aggregate of at most one session and publishes a [`Snapshot`]
/// after every accepted fix and lifecycle transition. All mutation goes through
/// `&mut self`; see [`crate::TrackerService`] for sharing it between tasks.
pub struct TrackingEngine<S, C> {
    store: S,
    clock: C,
    filter: FilterSettings,
    run: Option<ActiveRun>,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl<S: RunStore, C: Clock> TrackingEngine<S, C> {
    pub fn new(store: S, clock: C, filter: FilterSettings) -> Self {
        let (snapshot_tx, _) = watch::channel(Snapshot::default());

        Self {
            store,
            clock,
            filter,
            run: None,
            snapshot_tx,
        }
    }

    /// Latest-value stream of snapshots. New receivers see the current snapshot immediately.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn phase(&self) -> TrackingPhase {
        match &self.run {
            None => TrackingPhase::Idle,
            Some(run) if run.aggregate.is_paused() => TrackingPhase::Paused,
            Some(_) => TrackingPhase::Active,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.run.as_ref().map(|run| run.session.session_id.as_str())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Starts a new session. Without an id (or with an empty one) a random id is generated.
    pub async fn start(&mut self, session_id: Option<String>) -> Result<String, TrackingError> {
        if let Some(run) = &self.run {
            return Err(TrackingError::InvalidState(format!("session {} is already in progress", run.session.session_id)));
        }

        let session_id = session_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_session_id);
        let now = self.clock.now_millis();
        let session = Session::new(session_id.clone(), now);

        // Nothing changes in memory unless the record is committed
        self.store.insert_session(&session).await.inspect_err(|err| {
            tracing::error!("Failed to store new session {}: {err}", session_id);
        })?;

        let run = ActiveRun {
            session,
            aggregate: RunningAggregate::new(now),
        };
        self.snapshot_tx.send_replace(run.aggregate.snapshot(&session_id, now));
        self.run = Some(run);

        tracing::info!("Started session {}", session_id);
        Ok(session_id)
    }

    /// Pausing twice is a no-op.
    pub fn pause(&mut self) -> Result<(), TrackingError> {
        let now = self.clock.now_millis();
        let run = self.run.as_mut().ok_or(TrackingError::NoActiveSession)?;
        if run.aggregate.is_paused() {
            return Ok(());
        }

        run.aggregate.pause(now);
        self.snapshot_tx.send_replace(run.aggregate.snapshot(&run.session.session_id, now));

        tracing::info!("Paused session {}", run.session.session_id);
        Ok(())
    }

    /// Resuming a session that is not paused is a no-op.
    pub fn resume(&mut self) -> Result<(), TrackingError> {
        let now = self.clock.now_millis();
        let run = self.run.as_mut().ok_or(TrackingError::NoActiveSession)?;
        if !run.aggregate.is_paused() {
            return Ok(());
        }

        run.aggregate.resume(now);
        self.snapshot_tx.send_replace(run.aggregate.snapshot(&run.session.session_id, now));

        tracing::info!("Resumed session {}", run.session.session_id);
        Ok(())
    }

    /// Finalizes the session and returns to idle.
    ///
    /// If the final write fails the session stays in progress untouched, so the
    /// stop can be retried.
    pub async fn stop(&mut self) -> Result<SessionSummary, TrackingError> {
        let now = self.clock.now_millis();
        let run = self.run.as_ref().ok_or(TrackingError::NoActiveSession)?;

        let summary = SessionSummary::build(&run.session, &run.aggregate, now);
        self.store.update_session(&summary.session).await.inspect_err(|err| {
            tracing::error!("Failed to store finished session {}: {err}", summary.session.session_id);
        })?;

        self.run = None;
        self.snapshot_tx.send_replace(Snapshot::default());

        tracing::info!(
            "Stopped session {}: {:.1} m in {} s",
            summary.session.session_id,
            summary.session.distance,
            summary.session.duration / 1000
        );
        Ok(summary)
    }

    /// Feeds one fix through the filters. Never fails: rejected fixes are dropped
    /// and a failed raw point write is only logged.
    pub async fn ingest(&mut self, fix: PositionFix) -> FixOutcome {
        let Some(run) = self.run.as_mut() else {
            return FixOutcome::Ignored;
        };
        if run.aggregate.is_paused() {
            return FixOutcome::Ignored;
        }

        if !fix.is_valid() {
            tracing::debug!("Dropping invalid fix {:?}", fix);
            return FixOutcome::Invalid;
        }

        if fix.accuracy > self.filter.accuracy_threshold {
            tracing::debug!("Dropping fix with accuracy {} m", fix.accuracy);
            return FixOutcome::LowAccuracy;
        }

        let now = self.clock.now_millis();

        // Kept even when the fix is left out of the path
        let raw_point = PositionFix {
            timestamp: now,
            ..fix.clone()
        };
        if let Err(err) = self.store.insert_raw_point(&run.session.session_id, &raw_point).await {
            tracing::warn!("Failed to store raw point for session {}: {err}", run.session.session_id);
        }

        let step = run.aggregate.record_fix(&fix, self.filter.glitch_threshold);
        self.snapshot_tx.send_replace(run.aggregate.snapshot(&run.session.session_id, now));

        match step {
            PathStep::Glitch(distance) => {
                tracing::debug!("Ignoring {:.0} m jump as a GPS glitch", distance);
                FixOutcome::Glitch
            }
            PathStep::Started | PathStep::Extended(_) => FixOutcome::Accepted,
        }
    }

    /// Persists the current totals so the session can be recovered after a crash.
    /// Works while active or paused and leaves the lifecycle fields alone.
    pub async fn checkpoint(&mut self) -> Result<(), TrackingError> {
        let now = self.clock.now_millis();
        let run = self.run.as_mut().ok_or(TrackingError::NoActiveSession)?;

        let session = run.aggregate.checkpoint_of(&run.session, now);
        self.store.update_session(&session).await?;
        run.session = session;

        tracing::debug!("Checkpointed session {}", run.session.session_id);
        Ok(())
    }

    /// Rebuilds the in-progress session after a restart.
    ///
    /// Returns `false` when there is nothing worth resuming: no active session,
    /// no raw points for it, or a path encoding that cannot be decoded.
    /// Nothing is written to storage either way.
    pub async fn recover(&mut self) -> Result<bool, TrackingError> {
        if let Some(run) = &self.run {
            return Err(TrackingError::InvalidState(format!("session {} is already in progress", run.session.session_id)));
        }

        let Some(session) = self.store.get_active_session().await? else {
            return Ok(false);
        };

        let raw_points = self.store.get_raw_points_for_session(&session.session_id).await?;
        if raw_points.is_empty() {
            tracing::info!("Active session {} has no raw points, not recovering", session.session_id);
            return Ok(false);
        }

        let now = self.clock.now_millis();
        let aggregate = match RunningAggregate::restore(&session, raw_points.len(), now) {
            Ok(aggregate) => aggregate,
            Err(err) => {
                tracing::warn!("Abandoning recovery of session {}: {}", session.session_id, TrackingError::from(err));
                return Ok(false);
            }
        };

        self.snapshot_tx.send_replace(aggregate.snapshot(&session.session_id, now));
        tracing::info!(
            "Recovered session {} with {} path points and {} raw points",
            session.session_id,
            aggregate.path.len(),
            raw_points.len()
        );
        self.run = Some(ActiveRun {
            session,
            aggregate,
        });

        Ok(true)
    }
}

fn generate_session_id() -> String {
    let random_bytes: [u8; 16] = rand::random();
    hex::encode(random_bytes)
}
