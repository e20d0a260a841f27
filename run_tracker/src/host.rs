use run_tracker_lib::position_fix::PositionFix;
use serde::Deserialize;

/// One line of newline-delimited JSON input from the hosting process.
///
/// `{"type": "start", "session_id": "r1"}`, `{"type": "pause"}`, `{"type": "resume"}`,
/// `{"type": "stop"}` or `{"type": "fix", "latitude": .., "longitude": .., "accuracy": .., "timestamp": ..}`.
/// Lifecycle events may carry a `timestamp`, used when replaying a log.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    Start {
        session_id: Option<String>,
        timestamp: Option<i64>,
    },
    Pause {
        timestamp: Option<i64>,
    },
    Resume {
        timestamp: Option<i64>,
    },
    Stop {
        timestamp: Option<i64>,
    },
    Fix(PositionFix),
}

impl HostEvent {
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            HostEvent::Start { timestamp, .. }
            | HostEvent::Pause { timestamp }
            | HostEvent::Resume { timestamp }
            | HostEvent::Stop { timestamp } => *timestamp,
            HostEvent::Fix(fix) => Some(fix.timestamp),
        }
    }
}
