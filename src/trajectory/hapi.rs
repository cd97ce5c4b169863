use chrono::DateTime;
use serde::Deserialize;

use crate::trajectory::source::{EphemerisRequest, EphemerisSeries, EphemerisSource};
use crate::trajectory::TrajectoryError;

/// SSCWeb HAPI endpoint serving satellite position time series.
const DEFAULT_SERVER: &str = "http://hapi-server.org/servers/SSCWeb/hapi";

/// Blocking HAPI client: one `data` request per trajectory fetch, JSON
/// response format. No retry layer; failures propagate to the caller.
pub struct HapiClient {
    server: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct HapiResponse {
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
}

impl HapiClient {
    pub fn new() -> Self {
        Self::with_server(DEFAULT_SERVER)
    }

    pub fn with_server(server: &str) -> Self {
        Self {
            server: server.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HapiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EphemerisSource for HapiClient {
    fn fetch(&self, request: &EphemerisRequest) -> Result<EphemerisSeries, TrajectoryError> {
        let url = format!("{}/data", self.server);
        let parameters = request.parameters.join(",");
        log::info!(
            "requesting {} from {} for {}..{}",
            parameters,
            request.dataset,
            request.start_ts,
            request.stop_ts
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("id", request.dataset.as_str()),
                ("parameters", parameters.as_str()),
                ("time.min", &ts_to_iso(request.start_ts)?),
                ("time.max", &ts_to_iso(request.stop_ts)?),
                ("format", "json"),
            ])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| TrajectoryError::Ephemeris(e.to_string()))?;

        let payload: HapiResponse = response
            .json()
            .map_err(|e| TrajectoryError::Ephemeris(e.to_string()))?;
        parse_rows(&payload.data)
    }
}

fn parse_rows(rows: &[Vec<serde_json::Value>]) -> Result<EphemerisSeries, TrajectoryError> {
    let mut series = EphemerisSeries::default();
    for row in rows {
        if row.len() < 4 {
            return Err(TrajectoryError::Ephemeris(format!(
                "data row has {} columns, expected 4",
                row.len()
            )));
        }
        let time_str = row[0]
            .as_str()
            .ok_or_else(|| TrajectoryError::Ephemeris("non-string time column".to_string()))?;
        series.time.push(iso_to_ts(time_str)?);
        for (out, value) in [&mut series.x, &mut series.y, &mut series.z]
            .into_iter()
            .zip(&row[1..4])
        {
            out.push(value.as_f64().ok_or_else(|| {
                TrajectoryError::Ephemeris(format!("non-numeric position value {value}"))
            })?);
        }
    }
    Ok(series)
}

/// UTC timestamp to the ISO-8601 form the HAPI time filters expect.
fn ts_to_iso(ts: i64) -> Result<String, TrajectoryError> {
    let dt = DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| TrajectoryError::Ephemeris(format!("timestamp {ts} out of range")))?;
    Ok(dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

fn iso_to_ts(iso: &str) -> Result<f64, TrajectoryError> {
    let dt = DateTime::parse_from_rfc3339(iso)
        .map_err(|e| TrajectoryError::Ephemeris(format!("bad time '{iso}': {e}")))?;
    Ok(dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_round_trip() {
        let iso = ts_to_iso(1_581_654_459).unwrap();
        assert_eq!(iso, "2020-02-14T04:27:39Z");
        assert_eq!(iso_to_ts(&iso).unwrap(), 1_581_654_459.0);
    }

    #[test]
    fn rows_parse_into_columns() {
        let rows = vec![
            vec![
                serde_json::json!("2020-02-14T00:00:00Z"),
                serde_json::json!(1.5),
                serde_json::json!(-2.5),
                serde_json::json!(0.25),
            ],
            vec![
                serde_json::json!("2020-02-14T00:01:00Z"),
                serde_json::json!(1.6),
                serde_json::json!(-2.4),
                serde_json::json!(0.26),
            ],
        ];
        let series = parse_rows(&rows).unwrap();
        assert_eq!(series.time.len(), 2);
        assert_eq!(series.x, vec![1.5, 1.6]);
        assert_eq!(series.z, vec![0.25, 0.26]);
        assert_eq!(series.time[1] - series.time[0], 60.0);
    }

    #[test]
    fn short_row_is_an_error() {
        let rows = vec![vec![serde_json::json!("2020-02-14T00:00:00Z")]];
        assert!(parse_rows(&rows).is_err());
    }
}
