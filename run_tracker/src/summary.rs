use run_tracker_lib::session::Session;
use serde::Serialize;

use crate::aggregate::RunningAggregate;

/// Final result of a stopped session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session: Session,
    pub path_points: usize,
    pub speed_samples: u32,
}

impl SessionSummary {
    /// Finalizes `session` at `now`: closes it and stores the totals and encoded path.
    pub fn build(session: &Session, aggregate: &RunningAggregate, now: i64) -> Self {
        let mut session = aggregate.checkpoint_of(session, now);
        session.end_time = Some(now);
        session.active = false;

        Self {
            session,
            path_points: aggregate.path.len(),
            speed_samples: aggregate.speed_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use run_tracker_lib::polyline;

    use super::*;

    #[test]
    fn empty_session_summary() {
        let aggregate = RunningAggregate::new(5_000);
        let summary = SessionSummary::build(&Session::new("r1".into(), 5_000), &aggregate, 5_000);

        assert_eq!(summary.session.duration, 0);
        assert_eq!(summary.session.distance, 0.);
        assert_eq!(summary.session.avg_speed, 0.);
        assert_eq!(summary.session.encoded_path, "");
        assert_eq!(summary.session.end_time, Some(5_000));
        assert!(!summary.session.active);
        assert_eq!(summary.speed_samples, 0);
    }

    #[test]
    fn paused_session_stops_at_pause_start() {
        let mut aggregate = RunningAggregate::new(0);
        aggregate.path.push(run_tracker_lib::coordinate::Coordinate::new(1., 2.));
        aggregate.pause(60_000);

        let summary = SessionSummary::build(&Session::new("r1".into(), 0), &aggregate, 90_000);
        assert_eq!(summary.session.duration, 60_000);
        assert_eq!(summary.session.end_time, Some(90_000));
        assert_eq!(polyline::decode(&summary.session.encoded_path).unwrap(), aggregate.path);
        assert_eq!(summary.path_points, 1);
    }
}
