pub mod aggregate;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod retention;
pub mod service;
pub mod summary;

pub use engine::{FilterSettings, FixOutcome, TrackingEngine, TrackingPhase};
pub use error::TrackingError;
pub use service::{TrackerHandle, TrackerService};
