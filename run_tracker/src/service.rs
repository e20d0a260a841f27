use std::time::Duration;

use run_tracker_data_management::RunStore;
use run_tracker_lib::{position_fix::PositionFix, snapshot::Snapshot};
use tokio::{sync::{mpsc, oneshot, watch}, task::JoinHandle, time::{interval_at, Instant, MissedTickBehavior}};

use crate::{clock::Clock, engine::{TrackingEngine, TrackingPhase}, summary::SessionSummary, TrackingError};

const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, TrackingError>>;

enum Command {
    Start { session_id: Option<String>, reply: Reply<String> },
    Pause { reply: Reply<()> },
    Resume { reply: Reply<()> },
    Stop { reply: Reply<SessionSummary> },
    Ingest(PositionFix),
    Checkpoint { reply: Reply<()> },
    Recover { reply: Reply<bool> },
}

/// The background task owning the engine. Every command is applied in arrival order,
/// so engine operations never interleave.
pub struct TrackerService<S, C> {
    engine: TrackingEngine<S, C>,
    commands: mpsc::Receiver<Command>,
    checkpoints: CheckpointTimer,
}

/// Cloneable front end of a running [`TrackerService`].
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl<S, C> TrackerService<S, C>
where
    S: RunStore + 'static,
    C: Clock + 'static,
{
    /// Moves `engine` into a new task. The task ends once every handle is dropped.
    pub fn spawn(engine: TrackingEngine<S, C>, checkpoint_interval: Duration) -> (TrackerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = TrackerHandle {
            snapshots: engine.subscribe(),
            commands: tx.clone(),
        };

        let service = Self {
            engine,
            commands: rx,
            checkpoints: CheckpointTimer::new(checkpoint_interval, tx.downgrade()),
        };
        drop(tx);

        (handle, tokio::spawn(service.run()))
    }

    async fn run(mut self) {
        tracing::debug!("Tracker service running");

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Start { session_id, reply } => {
                    let _ = reply.send(self.engine.start(session_id).await);
                }
                Command::Pause { reply } => {
                    let _ = reply.send(self.engine.pause());
                }
                Command::Resume { reply } => {
                    let _ = reply.send(self.engine.resume());
                }
                Command::Stop { reply } => {
                    let _ = reply.send(self.engine.stop().await);
                }
                Command::Ingest(fix) => {
                    self.engine.ingest(fix).await;
                    continue;
                }
                Command::Checkpoint { reply } => {
                    let _ = reply.send(self.engine.checkpoint().await);
                    continue;
                }
                Command::Recover { reply } => {
                    let _ = reply.send(self.engine.recover().await);
                }
            }

            // Lifecycle may have changed
            if self.engine.phase() == TrackingPhase::Active {
                self.checkpoints.ensure_running();
            } else {
                self.checkpoints.cancel().await;
            }
        }

        self.checkpoints.cancel().await;
        tracing::debug!("Tracker service stopped");
    }
}

impl TrackerHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, TrackingError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.map_err(|_| TrackingError::ServiceClosed)?;
        response.await.map_err(|_| TrackingError::ServiceClosed)?
    }

    pub async fn start(&self, session_id: Option<String>) -> Result<String, TrackingError> {
        self.request(|reply| Command::Start { session_id, reply }).await
    }

    pub async fn pause(&self) -> Result<(), TrackingError> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<(), TrackingError> {
        self.request(|reply| Command::Resume { reply }).await
    }

    pub async fn stop(&self) -> Result<SessionSummary, TrackingError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn checkpoint(&self) -> Result<(), TrackingError> {
        self.request(|reply| Command::Checkpoint { reply }).await
    }

    pub async fn recover(&self) -> Result<bool, TrackingError> {
        self.request(|reply| Command::Recover { reply }).await
    }

    /// Queues a fix. Filtering outcomes are not reported back.
    pub async fn ingest(&self, fix: PositionFix) -> Result<(), TrackingError> {
        self.commands.send(Command::Ingest(fix)).await.map_err(|_| TrackingError::ServiceClosed)
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }
}

/// Periodic checkpoint trigger. At most one timer task exists; it waits for each
/// checkpoint to finish before scheduling the next.
struct CheckpointTimer {
    interval: Duration,
    commands: mpsc::WeakSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl CheckpointTimer {
    fn new(interval: Duration, commands: mpsc::WeakSender<Command>) -> Self {
        Self {
            interval,
            commands,
            task: None,
        }
    }

    fn ensure_running(&mut self) {
        if self.task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let interval = self.interval;
        let commands = self.commands.clone();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                // Only a weak sender is held, so the timer never keeps the service alive
                let Some(sender) = commands.upgrade() else {
                    break;
                };
                let (reply, response) = oneshot::channel();
                if sender.send(Command::Checkpoint { reply }).await.is_err() {
                    break;
                }
                drop(sender);

                match response.await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => tracing::warn!("Periodic checkpoint failed: {err}"),
                    Err(_) => break,
                }
            }
        }));
    }

    async fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use run_tracker_data_management::MemoryStore;
    use run_tracker_lib::coordinate::Coordinate;

    use super::*;
    use crate::{clock::ManualClock, engine::FilterSettings};

    const T0: i64 = 1_700_000_000_000;

    fn spawn_service() -> (TrackerHandle, JoinHandle<()>, MemoryStore, ManualClock) {
        let store = MemoryStore::new();
        let clock = ManualClock::new(T0);
        let engine = TrackingEngine::new(store.clone(), clock.clone(), FilterSettings::default());
        let (handle, task) = TrackerService::spawn(engine, Duration::from_secs(10));
        (handle, task, store, clock)
    }

    fn fix(latitude: f64, speed: f64) -> PositionFix {
        PositionFix::new(Coordinate::new(latitude, 10.0), 0., 5., speed, 0)
    }

    async fn stored_duration(store: &MemoryStore, session_id: &str) -> i64 {
        store.get_session_by_id(session_id).await.unwrap().unwrap().duration
    }

    #[tokio::test]
    async fn commands_are_applied_in_order() {
        let (handle, _, store, _) = spawn_service();
        let mut snapshots = handle.subscribe();
        assert!(snapshots.borrow_and_update().is_idle());

        let id = handle.start(Some("r1".into())).await.unwrap();
        assert_eq!(id, "r1");
        handle.ingest(fix(56.0, 2.)).await.unwrap();
        handle.ingest(fix(56.0001, 4.)).await.unwrap();
        // Replies come after every earlier command was handled
        handle.checkpoint().await.unwrap();

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.path.len(), 2);
        assert_eq!(snapshot.max_speed, 4.);
        assert!(snapshots.has_changed().unwrap());

        assert!(matches!(handle.start(None).await, Err(TrackingError::InvalidState(_))));

        let summary = handle.stop().await.unwrap();
        assert_eq!(summary.speed_samples, 2);
        assert!(handle.snapshot().is_idle());
        assert!(!store.get_session_by_id("r1").await.unwrap().unwrap().active);
        assert!(matches!(handle.stop().await, Err(TrackingError::NoActiveSession)));
    }

    #[tokio::test]
    async fn late_subscribers_get_latest_snapshot() {
        let (handle, _, _, _) = spawn_service();
        handle.start(Some("r1".into())).await.unwrap();
        handle.pause().await.unwrap();

        let snapshots = handle.subscribe();
        let snapshot = snapshots.borrow().clone();
        assert!(snapshot.tracking);
        assert!(snapshot.paused);
    }

    #[tokio::test(start_paused = true)]
    async fn checkpoints_run_only_while_active() {
        let (handle, _, store, clock) = spawn_service();
        handle.start(Some("r1".into())).await.unwrap();
        handle.ingest(fix(56.0, 2.)).await.unwrap();

        clock.advance(5_000);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(stored_duration(&store, "r1").await, 5_000);

        // No timer while paused
        handle.pause().await.unwrap();
        clock.advance(1_000);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(stored_duration(&store, "r1").await, 5_000);

        handle.resume().await.unwrap();
        clock.advance(3_000);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(stored_duration(&store, "r1").await, 8_000);

        handle.stop().await.unwrap();
        let finished = store.get_session_by_id("r1").await.unwrap().unwrap();
        clock.advance(50_000);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.get_session_by_id("r1").await.unwrap().unwrap(), finished);
    }

    #[tokio::test(start_paused = true)]
    async fn recovered_session_is_checkpointed() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(T0);

        {
            let mut engine = TrackingEngine::new(store.clone(), clock.clone(), FilterSettings::default());
            engine.start(Some("r1".into())).await.unwrap();
            engine.ingest(fix(56.0, 2.)).await;
            clock.advance(2_000);
            engine.checkpoint().await.unwrap();
        }

        clock.advance(120_000);
        let engine = TrackingEngine::new(store.clone(), clock.clone(), FilterSettings::default());
        let (handle, _) = TrackerService::spawn(engine, Duration::from_secs(10));
        assert!(handle.recover().await.unwrap());
        assert_eq!(handle.snapshot().duration, 2_000);

        clock.advance(1_000);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(stored_duration(&store, "r1").await, 3_000);
    }

    #[tokio::test]
    async fn service_ends_with_last_handle() {
        let (handle, task, _, _) = spawn_service();
        handle.start(Some("r1".into())).await.unwrap();

        drop(handle);
        task.await.unwrap();
    }
}
