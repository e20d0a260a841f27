use run_tracker_data_management::DataManagerError;
use run_tracker_lib::polyline::PolylineError;

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    /// The operation is not valid in the current lifecycle state, e.g. a double start.
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("no active session")]
    NoActiveSession,
    #[error("storage failure: {0}")]
    StorageFailure(#[from] DataManagerError),
    #[error("malformed path encoding: {0}")]
    MalformedEncoding(#[from] PolylineError),
    #[error("tracker service has shut down")]
    ServiceClosed,
}
