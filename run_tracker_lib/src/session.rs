use serde::{Deserialize, Serialize};

/// The durable record of one tracked run.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    /// Milliseconds since the unix epoch
    pub start_time: i64,
    pub end_time: Option<i64>,
    /// Milliseconds, paused intervals excluded
    pub duration: i64,
    /// Meters
    pub distance: f64,
    pub avg_speed: f64,
    pub max_speed: f64,
    pub encoded_path: String,
    pub active: bool,
}

impl Session {
    /// A freshly started session with no accumulated data.
    pub fn new(session_id: String, start_time: i64) -> Self {
        Self {
            session_id,
            start_time,
            end_time: None,
            duration: 0,
            distance: 0.,
            avg_speed: 0.,
            max_speed: 0.,
            encoded_path: String::new(),
            active: true,
        }
    }
}
