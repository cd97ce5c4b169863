use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::trajectory::TrajectoryError;

/// IUGG mean Earth radius, used to scale propagated positions to R_E.
pub const EARTH_RADIUS_KM: f64 = 6371.0087714;

/// Whether the three coordinate components are spherical
/// (lon, lat, alt-or-radius) or cartesian (x, y, z).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordGrid {
    Sph,
    Car,
}

impl CoordGrid {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordGrid::Sph => "sph",
            CoordGrid::Car => "car",
        }
    }
}

impl FromStr for CoordGrid {
    type Err = TrajectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sph" => Ok(CoordGrid::Sph),
            "car" => Ok(CoordGrid::Car),
            other => Err(TrajectoryError::InvalidCoordTag(other.to_string())),
        }
    }
}

/// Compound coordinate identifier, e.g. `GDZ-sph` or `teme-car`.
///
/// The tag fully determines the units and ordering of the trajectory
/// components: spherical tags carry (lon deg, lat deg, alt km or radius
/// R_E), cartesian tags carry (x, y, z) in R_E.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordTag {
    pub system: String,
    pub grid: CoordGrid,
}

impl CoordTag {
    pub fn new(system: &str, grid: CoordGrid) -> Self {
        Self {
            system: system.to_string(),
            grid,
        }
    }

    /// Parse a `<SYSTEM>-<grid>` tag.
    pub fn parse(tag: &str) -> Result<Self, TrajectoryError> {
        let (system, grid) = tag
            .rsplit_once('-')
            .ok_or_else(|| TrajectoryError::InvalidCoordTag(tag.to_string()))?;
        Ok(Self {
            system: system.to_string(),
            grid: grid.parse()?,
        })
    }
}

impl fmt::Display for CoordTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.system, self.grid.as_str())
    }
}

/// A time-tagged position series produced by one trajectory source.
///
/// All four arrays have equal length and `time` is monotonic
/// non-decreasing UTC seconds since 1970-01-01. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub time: Vec<f64>,
    pub c1: Vec<f64>,
    pub c2: Vec<f64>,
    pub c3: Vec<f64>,
    pub coord: CoordTag,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// `n` evenly spaced samples over `[a, b]`, endpoints included.
pub(crate) fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![a],
        _ => {
            let step = (b - a) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| a + step * i as f64).collect();
            out[n - 1] = b;
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_tag_round_trips() {
        let tag = CoordTag::parse("GDZ-sph").unwrap();
        assert_eq!(tag.system, "GDZ");
        assert_eq!(tag.grid, CoordGrid::Sph);
        assert_eq!(tag.to_string(), "GDZ-sph");
    }

    #[test]
    fn coord_tag_rejects_bad_grid() {
        assert!(CoordTag::parse("GEO-cyl").is_err());
        assert!(CoordTag::parse("GEO").is_err());
    }

    #[test]
    fn linspace_hits_both_endpoints() {
        let v = linspace(0.0, 5400.0, 2700);
        assert_eq!(v.len(), 2700);
        assert_eq!(v[0], 0.0);
        assert_eq!(v[2699], 5400.0);
    }

    #[test]
    fn linspace_degenerate_counts() {
        assert!(linspace(1.0, 2.0, 0).is_empty());
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
    }
}
