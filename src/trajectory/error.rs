use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrajectoryError {
    #[error("TLE file read error: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("invalid TLE in {file}: {message}")]
    InvalidTle { file: String, message: String },
    #[error("propagation error: {0}")]
    Propagation(String),
    #[error("invalid coordinate tag '{0}': expected <SYSTEM>-<grid> with grid sph or car")]
    InvalidCoordTag(String),
    #[error("coordinate type {0} not available for ephemeris retrieval; pick from GEO, GSM, GSE, or SM")]
    UnsupportedEphemerisCoord(String),
    #[error("time range {start}..{stop} with cadence {cadence} produces no samples")]
    EmptyTimeRange { start: i64, stop: i64, cadence: i64 },
    #[error("ephemeris service error: {0}")]
    Ephemeris(String),
    #[error("trajectory file {path}: {message}")]
    File { path: String, message: String },
}
