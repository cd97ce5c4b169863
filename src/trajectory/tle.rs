use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sgp4::{Constants, Elements};

use crate::trajectory::types::{linspace, CoordGrid, CoordTag, Trajectory, EARTH_RADIUS_KM};
use crate::trajectory::TrajectoryError;

/// Gap beyond which SGP4 extrapolation accuracy is considered degraded.
const GAP_WARN_SECONDS: f64 = 86400.0;

/// Character span of the epoch field within TLE line 1.
const EPOCH_FIELD: std::ops::Range<usize> = 18..32;

/// How output timestamps are matched to the TLE that propagates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignmentPolicy {
    /// Each timestamp uses the most recent TLE with epoch <= t; times
    /// before the first TLE propagate backward from it, times at or
    /// after the last TLE propagate forward from it. Typical for
    /// forecasting, where future TLEs do not exist yet.
    #[default]
    Forward,
    /// Each timestamp uses whichever TLE epoch is closest in absolute
    /// time, ties broken toward the lower index. More accurate when
    /// the full TLE history is already known.
    Nearest,
}

impl FromStr for AssignmentPolicy {
    type Err = TrajectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(AssignmentPolicy::Forward),
            "nearest" => Ok(AssignmentPolicy::Nearest),
            other => Err(TrajectoryError::Propagation(format!(
                "unknown assignment policy '{other}', expected forward or nearest"
            ))),
        }
    }
}

/// One two-line element set, plus the UTC timestamp of its epoch field.
#[derive(Debug, Clone)]
pub struct TleRecord {
    pub line1: String,
    pub line2: String,
    pub epoch_ts: i64,
}

/// One propagation batch: all output sample indices governed by a
/// single TLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TleAssignment {
    pub tle_index: usize,
    pub samples: Vec<usize>,
}

/// Read a headerless TLE file: two lines per record, file order assumed
/// chronological. A dangling line or malformed epoch is fatal.
pub fn parse_tle_file(path: &Path) -> Result<Vec<TleRecord>, TrajectoryError> {
    let content = fs::read_to_string(path)?;
    let file = path.display().to_string();
    parse_tle_lines(&content, &file)
}

fn parse_tle_lines(content: &str, file: &str) -> Result<Vec<TleRecord>, TrajectoryError> {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() || lines.len() % 2 != 0 {
        return Err(TrajectoryError::InvalidTle {
            file: file.to_string(),
            message: format!("expected paired lines, found {} line(s)", lines.len()),
        });
    }

    let mut records = Vec::with_capacity(lines.len() / 2);
    for pair in lines.chunks(2) {
        let epoch_ts = epoch_timestamp(pair[0], file)?;
        records.push(TleRecord {
            line1: pair[0].trim_end().to_string(),
            line2: pair[1].trim_end().to_string(),
            epoch_ts,
        });
    }
    Ok(records)
}

/// Derive a UTC timestamp from the fixed-width epoch field of line 1:
/// two-digit year (>= 57 means 1900s, else 2000s) followed by a
/// fractional day of year. Rounded to whole seconds.
fn epoch_timestamp(line1: &str, file: &str) -> Result<i64, TrajectoryError> {
    let invalid = |message: String| TrajectoryError::InvalidTle {
        file: file.to_string(),
        message,
    };

    let field = line1
        .get(EPOCH_FIELD)
        .ok_or_else(|| invalid(format!("line 1 too short for epoch field: '{line1}'")))?
        .trim();
    if field.len() < 3 {
        return Err(invalid(format!("epoch field '{field}' too short")));
    }

    let yy: i32 = field[0..2]
        .parse()
        .map_err(|_| invalid(format!("bad epoch year in '{field}'")))?;
    let year = if yy >= 57 { 1900 + yy } else { 2000 + yy };
    let day_of_year: f64 = field[2..]
        .parse()
        .map_err(|_| invalid(format!("bad epoch day in '{field}'")))?;
    if day_of_year < 1.0 {
        return Err(invalid(format!("epoch day {day_of_year} out of range")));
    }

    let year_start = NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| invalid(format!("bad epoch year {year}")))?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| invalid(format!("bad epoch year {year}")))?
        .and_utc()
        .timestamp();
    Ok(year_start + ((day_of_year - 1.0) * 86400.0).round() as i64)
}

/// Decimal Julian date for a UTC timestamp. The Unix epoch is JD
/// 2440587.5 and UTC days map linearly onto it, so this is sub-second
/// accurate regardless of calendar library.
pub fn julian_date(utc_ts: f64) -> f64 {
    utc_ts / 86400.0 + 2440587.5
}

/// Assign each output timestamp to a governing TLE under the given
/// policy, returning one batch per TLE interval that holds samples.
/// Batches covering more than 24 h of extrapolation beyond the first or
/// last epoch emit a non-fatal diagnostic.
pub fn assign_timestamps(
    epochs: &[i64],
    times: &[f64],
    policy: AssignmentPolicy,
) -> Vec<TleAssignment> {
    match policy {
        AssignmentPolicy::Forward => assign_forward(epochs, times),
        AssignmentPolicy::Nearest => assign_nearest(epochs, times),
    }
}

fn warn_gap(times: &[f64], samples: &[usize], epoch: i64, side: &str) {
    let count = samples
        .iter()
        .filter(|&&i| (times[i] - epoch as f64).abs() > GAP_WARN_SECONDS)
        .count();
    if count > 0 {
        log::warn!("{count} times are more than 24 hrs {side} TLE");
    }
}

fn assign_forward(epochs: &[i64], times: &[f64]) -> Vec<TleAssignment> {
    let mut batches = Vec::new();
    let last = epochs.len() - 1;

    // Interval sweep: before-first, between each consecutive pair,
    // at-or-after-last. The first TLE can own two batches (backward
    // and forward propagation), mirroring the interval walk.
    for i in 0..=epochs.len() {
        let (tle_index, samples) = if i == 0 {
            let idx: Vec<usize> = (0..times.len())
                .filter(|&k| times[k] < epochs[0] as f64)
                .collect();
            warn_gap(times, &idx, epochs[0], "before the first");
            (0, idx)
        } else if i < epochs.len() {
            let lo = epochs[i - 1] as f64;
            let hi = epochs[i] as f64;
            let idx: Vec<usize> = (0..times.len())
                .filter(|&k| times[k] >= lo && times[k] < hi)
                .collect();
            (i - 1, idx)
        } else {
            let idx: Vec<usize> = (0..times.len())
                .filter(|&k| times[k] >= epochs[last] as f64)
                .collect();
            warn_gap(times, &idx, epochs[last], "after the last");
            (last, idx)
        };

        if samples.is_empty() {
            log::debug!("skipped empty TLE interval {i}");
            continue;
        }
        batches.push(TleAssignment { tle_index, samples });
    }
    batches
}

fn assign_nearest(epochs: &[i64], times: &[f64]) -> Vec<TleAssignment> {
    let nearest = |t: f64| -> usize {
        let mut best = 0;
        let mut best_diff = f64::INFINITY;
        for (i, &e) in epochs.iter().enumerate() {
            let diff = (t - e as f64).abs();
            // strict comparison keeps ties on the lower index
            if diff < best_diff {
                best = i;
                best_diff = diff;
            }
        }
        best
    };

    let mut batches = Vec::new();
    for i in 0..epochs.len() {
        let samples: Vec<usize> = (0..times.len()).filter(|&k| nearest(times[k]) == i).collect();
        if samples.is_empty() {
            log::debug!("skipped empty TLE interval {i}");
            continue;
        }
        if i == 0 {
            warn_gap(times, &samples, epochs[0], "before the first");
        }
        if i == epochs.len() - 1 {
            warn_gap(times, &samples, epochs[i], "after the last");
        }
        batches.push(TleAssignment {
            tle_index: i,
            samples,
        });
    }
    batches
}

/// Output timestamps at `cadence` over `[start, stop]`. When the span
/// is not a whole number of cadences, `stop` is pushed up to the next
/// multiple so the requested range is always covered.
fn output_timestamps(
    start_ts: i64,
    stop_ts: i64,
    cadence: i64,
) -> Result<Vec<f64>, TrajectoryError> {
    if cadence <= 0 || stop_ts < start_ts {
        return Err(TrajectoryError::EmptyTimeRange {
            start: start_ts,
            stop: stop_ts,
            cadence,
        });
    }
    let mut n = (stop_ts - start_ts) / cadence;
    let mut stop = stop_ts;
    if start_ts + cadence * n < stop_ts {
        n += 1;
        stop = start_ts + cadence * n;
    }
    Ok(linspace(start_ts as f64, stop as f64, (n + 1) as usize))
}

/// Propagate a TLE file into a `teme-car` trajectory in Earth radii.
pub fn tle_trajectory(
    tle_file: &Path,
    start_ts: i64,
    stop_ts: i64,
    cadence: i64,
    policy: AssignmentPolicy,
) -> Result<Trajectory, TrajectoryError> {
    let records = parse_tle_file(tle_file)?;
    let times = output_timestamps(start_ts, stop_ts, cadence)?;
    let epochs: Vec<i64> = records.iter().map(|r| r.epoch_ts).collect();

    // Fresh allocations every call: results must never alias the input
    // timestamp array or any previous call's output.
    let mut c1 = vec![0.0; times.len()];
    let mut c2 = vec![0.0; times.len()];
    let mut c3 = vec![0.0; times.len()];

    for batch in assign_timestamps(&epochs, &times, policy) {
        let record = &records[batch.tle_index];
        log::debug!(
            "TLE {} covers samples {}..={} (JD {:.6}..{:.6})",
            batch.tle_index,
            batch.samples[0],
            batch.samples[batch.samples.len() - 1],
            julian_date(times[batch.samples[0]]),
            julian_date(times[batch.samples[batch.samples.len() - 1]]),
        );
        propagate_batch(record, &times, &batch.samples, &mut c1, &mut c2, &mut c3)?;
    }

    Ok(Trajectory {
        time: times,
        c1,
        c2,
        c3,
        coord: CoordTag::new("teme", CoordGrid::Car),
    })
}

/// Propagate every sample of a batch with one initialized satellite,
/// storing TEME positions scaled from km to Earth radii.
fn propagate_batch(
    record: &TleRecord,
    times: &[f64],
    samples: &[usize],
    c1: &mut [f64],
    c2: &mut [f64],
    c3: &mut [f64],
) -> Result<(), TrajectoryError> {
    let elements = Elements::from_tle(None, record.line1.as_bytes(), record.line2.as_bytes())
        .map_err(|e| TrajectoryError::Propagation(e.to_string()))?;
    let constants = Constants::from_elements(&elements)
        .map_err(|e| TrajectoryError::Propagation(e.to_string()))?;

    for &k in samples {
        let secs = times[k].floor() as i64;
        let nanos = ((times[k] - times[k].floor()) * 1e9).round() as u32;
        let dt = DateTime::<Utc>::from_timestamp(secs, nanos)
            .ok_or_else(|| TrajectoryError::Propagation(format!("timestamp {} out of range", times[k])))?;
        let minutes = elements
            .datetime_to_minutes_since_epoch(&dt.naive_utc())
            .map_err(|e| TrajectoryError::Propagation(e.to_string()))?;
        let prediction = constants
            .propagate(minutes)
            .map_err(|e| TrajectoryError::Propagation(e.to_string()))?;
        c1[k] = prediction.position[0] / EARTH_RADIUS_KM;
        c2[k] = prediction.position[1] / EARTH_RADIUS_KM;
        c3[k] = prediction.position[2] / EARTH_RADIUS_KM;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ISS_LINE1: &str =
        "1 25544U 98067A   20045.18587073  .00000950  00000-0  25302-4 0  9990";
    const ISS_LINE2: &str =
        "2 25544  51.6443 242.0161 0004885 264.6060 207.3845 15.49165514212791";

    fn write_tle(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("iss.tle");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "{ISS_LINE1}").unwrap();
        writeln!(f, "{ISS_LINE2}").unwrap();
        path
    }

    #[test]
    fn epoch_field_year_pivot() {
        // 57 and above belongs to the 1900s, below to the 2000s
        let frac_secs = (0.18587073f64 * 86400.0).round() as i64;

        let mut line_57 = ISS_LINE1.to_string();
        line_57.replace_range(18..23, "57001");
        let ts_57 = epoch_timestamp(&line_57, "t").unwrap();
        let start_1957 = chrono::NaiveDate::from_ymd_opt(1957, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        assert_eq!(ts_57, start_1957 + frac_secs);

        let mut line_56 = ISS_LINE1.to_string();
        line_56.replace_range(18..23, "56001");
        let ts_56 = epoch_timestamp(&line_56, "t").unwrap();
        let start_2056 = chrono::NaiveDate::from_ymd_opt(2056, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        assert_eq!(ts_56, start_2056 + frac_secs);
    }

    #[test]
    fn epoch_fractional_day_rounds_to_seconds() {
        let ts = epoch_timestamp(ISS_LINE1, "t").unwrap();
        // 2020 day 45.18587073 = 2020-02-14 04:27:39 UTC (rounded)
        let year_start = 1_577_836_800; // 2020-01-01
        assert_eq!(ts, year_start + 3_817_659);
    }

    #[test]
    fn dangling_line_is_fatal() {
        let content = format!("{ISS_LINE1}\n{ISS_LINE2}\n{ISS_LINE1}\n");
        assert!(matches!(
            parse_tle_lines(&content, "t"),
            Err(TrajectoryError::InvalidTle { .. })
        ));
    }

    #[test]
    fn julian_date_of_j2000() {
        // 2000-01-01T12:00:00Z
        assert_eq!(julian_date(946_728_000.0), 2_451_545.0);
    }

    #[test]
    fn forward_covers_boundaries() {
        let epochs = vec![1000, 2000];
        let times = vec![0.0, 500.0, 1000.0, 1500.0, 2000.0, 2500.0];
        let batches = assign_timestamps(&epochs, &times, AssignmentPolicy::Forward);

        let owner = |k: usize| {
            batches
                .iter()
                .find(|b| b.samples.contains(&k))
                .map(|b| b.tle_index)
        };
        // strictly before the first epoch: index 0
        assert_eq!(owner(0), Some(0));
        assert_eq!(owner(1), Some(0));
        // between epochs: previous TLE
        assert_eq!(owner(2), Some(0));
        assert_eq!(owner(3), Some(0));
        // at or after the last epoch: last index
        assert_eq!(owner(4), Some(1));
        assert_eq!(owner(5), Some(1));
    }

    #[test]
    fn forward_skips_empty_intervals() {
        let epochs = vec![1000, 2000, 3000];
        let times = vec![2100.0, 2200.0];
        let batches = assign_timestamps(&epochs, &times, AssignmentPolicy::Forward);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].tle_index, 1);
        assert_eq!(batches[0].samples, vec![0, 1]);
    }

    #[test]
    fn nearest_minimizes_distance_with_low_tie_break() {
        let epochs = vec![0, 100];
        let times = vec![10.0, 50.0, 90.0];
        let batches = assign_timestamps(&epochs, &times, AssignmentPolicy::Nearest);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].tle_index, 0);
        assert_eq!(batches[0].samples, vec![0, 1]); // tie at 50 goes low
        assert_eq!(batches[1].tle_index, 1);
        assert_eq!(batches[1].samples, vec![2]);
    }

    #[test]
    fn stop_extends_to_cadence_multiple() {
        let times = output_timestamps(0, 10, 4).unwrap();
        assert_eq!(times, vec![0.0, 4.0, 8.0, 12.0]);
    }

    #[test]
    fn exact_span_is_untouched() {
        let times = output_timestamps(0, 8, 4).unwrap();
        assert_eq!(times, vec![0.0, 4.0, 8.0]);
    }

    #[test]
    fn zero_cadence_is_fatal() {
        assert!(matches!(
            output_timestamps(0, 10, 0),
            Err(TrajectoryError::EmptyTimeRange { .. })
        ));
    }

    #[test]
    fn trajectory_is_idempotent_and_unaliased() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tle(&dir);
        // one hour straddling the TLE epoch, 60 s cadence
        let start = 1_581_652_800;
        let stop = start + 3600;
        let a = tle_trajectory(&path, start, stop, 60, AssignmentPolicy::Forward).unwrap();
        let b = tle_trajectory(&path, start, stop, 60, AssignmentPolicy::Forward).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 61);
        assert_eq!(a.coord.to_string(), "teme-car");
        // ISS orbits just above one Earth radius
        for i in 0..a.len() {
            let r = (a.c1[i].powi(2) + a.c2[i].powi(2) + a.c3[i].powi(2)).sqrt();
            assert!(r > 1.0 && r < 1.2, "radius {r} implausible for ISS");
        }
    }

    #[test]
    fn nearest_policy_propagates_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tle(&dir);
        let start = 1_581_652_800;
        let traj =
            tle_trajectory(&path, start, start + 600, 60, AssignmentPolicy::Nearest).unwrap();
        for i in 0..traj.len() {
            assert!(traj.c1[i] != 0.0 || traj.c2[i] != 0.0 || traj.c3[i] != 0.0);
        }
    }
}
