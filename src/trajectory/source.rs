use std::path::PathBuf;

use crate::trajectory::synthetic::SyntheticOrbit;
use crate::trajectory::tle::{tle_trajectory, AssignmentPolicy};
use crate::trajectory::types::{CoordGrid, CoordTag, Trajectory};
use crate::trajectory::TrajectoryError;

/// Coordinate systems the remote ephemeris service can deliver
/// positions in (cartesian only).
pub const EPHEMERIS_COORD_SYSTEMS: [&str; 4] = ["GEO", "GSM", "GSE", "SM"];

/// A request against the remote satellite-ephemeris service.
#[derive(Debug, Clone)]
pub struct EphemerisRequest {
    pub dataset: String,
    pub start_ts: i64,
    pub stop_ts: i64,
    /// Position field names, e.g. `X_GEO, Y_GEO, Z_GEO`.
    pub parameters: [String; 3],
}

/// Position time series returned by an ephemeris service.
#[derive(Debug, Clone, Default)]
pub struct EphemerisSeries {
    pub time: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

/// Capability interface for remote satellite-ephemeris retrieval.
/// The wire format behind it is out of scope here.
pub trait EphemerisSource {
    fn fetch(&self, request: &EphemerisRequest) -> Result<EphemerisSeries, TrajectoryError>;
}

/// The four ways a flythrough trajectory can be produced. Each variant
/// builds the same `Trajectory` record so the downstream orchestration
/// is written once.
#[derive(Debug, Clone)]
pub enum TrajectorySource {
    /// Sample circular/precessing orbit from shape parameters.
    Synthetic(SyntheticOrbit),
    /// SGP4 propagation of a two-line-element file.
    Tle {
        file: PathBuf,
        start_ts: i64,
        stop_ts: i64,
        cadence: i64,
        policy: AssignmentPolicy,
    },
    /// Positions fetched from a remote ephemeris service. The
    /// coordinate system must be a canonical name from
    /// `EPHEMERIS_COORD_SYSTEMS`.
    RemoteEphemeris {
        dataset: String,
        start_ts: i64,
        stop_ts: i64,
        coord_system: String,
    },
    /// A previously persisted trajectory file.
    File { path: PathBuf },
}

impl TrajectorySource {
    pub fn build(&self, ephemeris: &dyn EphemerisSource) -> Result<Trajectory, TrajectoryError> {
        match self {
            TrajectorySource::Synthetic(orbit) => orbit.generate(),
            TrajectorySource::Tle {
                file,
                start_ts,
                stop_ts,
                cadence,
                policy,
            } => tle_trajectory(file, *start_ts, *stop_ts, *cadence, *policy),
            TrajectorySource::RemoteEphemeris {
                dataset,
                start_ts,
                stop_ts,
                coord_system,
            } => remote_trajectory(ephemeris, dataset, *start_ts, *stop_ts, coord_system),
            TrajectorySource::File { path } => crate::flythrough::output::read_trajectory(path),
        }
    }
}

fn remote_trajectory(
    ephemeris: &dyn EphemerisSource,
    dataset: &str,
    start_ts: i64,
    stop_ts: i64,
    coord_system: &str,
) -> Result<Trajectory, TrajectoryError> {
    if !EPHEMERIS_COORD_SYSTEMS.contains(&coord_system) {
        return Err(TrajectoryError::UnsupportedEphemerisCoord(
            coord_system.to_string(),
        ));
    }

    let request = EphemerisRequest {
        dataset: dataset.to_string(),
        start_ts,
        stop_ts,
        parameters: [
            format!("X_{coord_system}"),
            format!("Y_{coord_system}"),
            format!("Z_{coord_system}"),
        ],
    };
    let series = ephemeris.fetch(&request)?;
    log::debug!(
        "ephemeris dataset {dataset} returned {} samples in {coord_system}",
        series.time.len()
    );

    Ok(Trajectory {
        time: series.time,
        c1: series.x,
        c2: series.y,
        c3: series.z,
        coord: CoordTag::new(coord_system, CoordGrid::Car),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubEphemeris;

    impl EphemerisSource for StubEphemeris {
        fn fetch(&self, request: &EphemerisRequest) -> Result<EphemerisSeries, TrajectoryError> {
            assert_eq!(request.parameters[0], "X_GSM");
            Ok(EphemerisSeries {
                time: vec![request.start_ts as f64, request.stop_ts as f64],
                x: vec![1.0, 2.0],
                y: vec![3.0, 4.0],
                z: vec![5.0, 6.0],
            })
        }
    }

    #[test]
    fn remote_maps_fields_and_tags_cartesian() {
        let source = TrajectorySource::RemoteEphemeris {
            dataset: "grace1".to_string(),
            start_ts: 100,
            stop_ts: 200,
            coord_system: "GSM".to_string(),
        };
        let traj = source.build(&StubEphemeris).unwrap();
        assert_eq!(traj.coord.to_string(), "GSM-car");
        assert_eq!(traj.c1, vec![1.0, 2.0]);
        assert_eq!(traj.c3, vec![5.0, 6.0]);
    }

    #[test]
    fn remote_rejects_spherical_only_systems() {
        let source = TrajectorySource::RemoteEphemeris {
            dataset: "grace1".to_string(),
            start_ts: 100,
            stop_ts: 200,
            coord_system: "GDZ".to_string(),
        };
        assert!(matches!(
            source.build(&StubEphemeris),
            Err(TrajectoryError::UnsupportedEphemerisCoord(_))
        ));
    }
}
