#![allow(dead_code)]

pub const SESSIONS_TABLE_NAME: &str = "Sessions";
pub const SESSION_ID: &str = "session_id";
pub const START_TIME: &str = "start_time";
pub const END_TIME: &str = "end_time";
pub const DURATION: &str = "duration";
pub const DISTANCE: &str = "distance";
pub const AVG_SPEED: &str = "avg_speed";
pub const MAX_SPEED: &str = "max_speed";
pub const ENCODED_PATH: &str = "encoded_path";
pub const ACTIVE: &str = "active";

pub const RAW_POINTS_TABLE_NAME: &str = "RawPoints";
pub const POINT_ID: &str = "point_id";
// Session id
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
pub const ALTITUDE: &str = "altitude";
pub const ACCURACY: &str = "accuracy";
pub const SPEED: &str = "speed";
pub const TIMESTAMP: &str = "timestamp";
