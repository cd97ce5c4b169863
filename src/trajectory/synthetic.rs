use std::f64::consts::PI;

use crate::trajectory::types::{linspace, CoordGrid, CoordTag, Trajectory};
use crate::trajectory::TrajectoryError;

/// Orbital period of the generated sample orbit, in seconds.
const ORBIT_PERIOD_S: f64 = 90.0 * 60.0;

/// Shape parameters for a sample circular, slowly precessing orbit.
///
/// Latitude and height follow one sinusoid per 90-minute orbit, scaled
/// to the requested bands; longitude advances `lon_per_orbit` degrees
/// per orbit and is wrapped into [0, 360) before the output shift to
/// [-180, 180). Height additionally decays linearly by up to
/// `precession * min_height` over the full duration, a rough one-way
/// precession model rather than anything physically exact.
#[derive(Debug, Clone)]
pub struct SyntheticOrbit {
    /// UTC timestamp of the first sample, seconds.
    pub start_time: f64,
    /// UTC timestamp of the last sample, seconds.
    pub stop_time: f64,
    /// Maximum latitude, degrees.
    pub max_lat: f64,
    /// Minimum latitude, degrees.
    pub min_lat: f64,
    /// Degrees of longitude traversed per orbit. Values away from 360
    /// precess the ground track forward or backward.
    pub lon_per_orbit: f64,
    /// Maximum starting height, km.
    pub max_height: f64,
    /// Minimum starting height, km.
    pub min_height: f64,
    /// Overall height decrease across the duration, as a fraction of
    /// `min_height`.
    pub precession: f64,
    /// Sample cadence, seconds.
    pub cadence: f64,
}

impl Default for SyntheticOrbit {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            stop_time: 0.0,
            max_lat: 65.0,
            min_lat: -65.0,
            lon_per_orbit: 363.0,
            max_height: 450.0,
            min_height: 400.0,
            precession: 0.01,
            cadence: 2.0,
        }
    }
}

impl SyntheticOrbit {
    /// Generate the trajectory, tagged `GDZ-sph` with
    /// (c1, c2, c3) = (lon - 180 deg, lat deg, height km).
    pub fn generate(&self) -> Result<Trajectory, TrajectoryError> {
        let duration = self.stop_time - self.start_time;
        let total = (duration / self.cadence) as i64;
        if self.cadence <= 0.0 || total < 1 {
            return Err(TrajectoryError::EmptyTimeRange {
                start: self.start_time as i64,
                stop: self.stop_time as i64,
                cadence: self.cadence as i64,
            });
        }
        let total = total as usize;

        let samples_per_orbit = (ORBIT_PERIOD_S / self.cadence).round() as usize;
        // A cadence longer than half the period yields zero samples per
        // orbit and no meaningful ground track.
        if samples_per_orbit == 0 {
            return Err(TrajectoryError::EmptyTimeRange {
                start: self.start_time as i64,
                stop: self.stop_time as i64,
                cadence: self.cadence as i64,
            });
        }
        let n_orbits = duration / (samples_per_orbit as f64 * self.cadence);
        let whole_orbits = n_orbits.floor() as usize;
        // Truncate the partial orbit to the exact remaining sample count.
        let leftover = total.saturating_sub(whole_orbits * samples_per_orbit);

        let phase = linspace(0.0, 2.0 * PI, samples_per_orbit);
        let mut lat: Vec<f64> = Vec::with_capacity(total);
        let mut height: Vec<f64> = Vec::with_capacity(total);
        for _ in 0..whole_orbits {
            lat.extend(phase.iter().map(|p| p.cos()));
            height.extend(phase.iter().map(|p| p.sin()));
        }
        lat.extend(phase.iter().take(leftover).map(|p| p.cos()));
        height.extend(phase.iter().take(leftover).map(|p| p.sin()));

        let mut lon = linspace(0.0, self.lon_per_orbit * n_orbits, total);
        wrap_longitudes(&mut lon);

        let h_scale = (self.max_height - self.min_height) / 2.0;
        let h_offset = (self.max_height + self.min_height) / 2.0;
        let lat_scale = (self.max_lat - self.min_lat) / 2.0;
        let lat_offset = (self.max_lat + self.min_lat) / 2.0;
        let decay = linspace(0.0, self.precession, total);

        let c1: Vec<f64> = lon.iter().map(|l| l - 180.0).collect();
        let c2: Vec<f64> = lat.iter().map(|l| l * lat_scale + lat_offset).collect();
        let c3: Vec<f64> = height
            .iter()
            .zip(&decay)
            .map(|(h, d)| h * h_scale + h_offset - d * self.min_height)
            .collect();

        log::debug!(
            "synthetic orbit: {} samples, {} whole orbits + {} partial samples",
            total,
            whole_orbits,
            leftover
        );

        Ok(Trajectory {
            time: linspace(self.start_time, self.stop_time, total),
            c1,
            c2,
            c3,
            coord: CoordTag::new("GDZ", CoordGrid::Sph),
        })
    }
}

/// Fold longitudes into [0, 360) by repeated +-360 corrections, 360
/// itself included so the later -180 shift stays below 180. A single
/// modulo would do for one wrap, but large `lon_per_orbit` values can
/// overshoot by several revolutions, so correct until converged.
fn wrap_longitudes(lon: &mut [f64]) {
    let max = |v: &[f64]| v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = |v: &[f64]| v.iter().cloned().fold(f64::INFINITY, f64::min);

    while max(lon) >= 360.0 {
        for l in lon.iter_mut().filter(|l| **l >= 360.0) {
            *l -= 360.0;
        }
    }
    while min(lon) < 0.0 {
        for l in lon.iter_mut().filter(|l| **l < 0.0) {
            *l += 360.0;
        }
    }
}
