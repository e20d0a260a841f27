use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

/// A raw sample from the location source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    /// Meters per second
    #[serde(default)]
    pub speed: f64,
    /// Milliseconds since the unix epoch
    pub timestamp: i64,
}

impl PositionFix {
    pub fn new(coordinate: Coordinate, altitude: f64, accuracy: f64, speed: f64, timestamp: i64) -> Self {
        Self {
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            altitude,
            accuracy,
            speed,
            timestamp,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Latitude and longitude within their ranges, accuracy and speed non-negative.
    /// NaN never passes.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.accuracy >= 0.0
            && self.speed >= 0.0
    }
}
