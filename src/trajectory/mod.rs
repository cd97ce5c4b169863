mod error;
mod hapi;
mod source;
mod synthetic;
mod tle;
mod types;

pub use error::TrajectoryError;
pub use hapi::HapiClient;
pub use source::{EphemerisRequest, EphemerisSeries, EphemerisSource, TrajectorySource};
pub use synthetic::SyntheticOrbit;
pub use tle::AssignmentPolicy;
pub use types::{CoordTag, Trajectory};
