pub mod coordinate;
pub mod geo;
pub mod polyline;
pub mod position_fix;
pub mod session;
pub mod snapshot;
