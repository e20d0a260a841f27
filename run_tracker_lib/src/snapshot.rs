use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

/// Immutable view of the tracking state, published after every accepted update
/// and every lifecycle transition. The default value is the idle state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub tracking: bool,
    pub paused: bool,
    pub current_speed: f64,
    pub distance: f64,
    /// Milliseconds
    pub duration: i64,
    pub avg_speed: f64,
    pub max_speed: f64,
    pub path: Vec<Coordinate>,
    pub current_location: Option<Coordinate>,
    pub accuracy: f64,
    pub session_id: Option<String>,
}

impl Snapshot {
    pub fn is_idle(&self) -> bool {
        !self.tracking
    }
}
