//! Persistence of flythrough results and re-reading of persisted
//! trajectories. Three extensions are supported: `nc` (NetCDF classic),
//! `csv` (comma separated), and `txt` (tab separated). The delimited
//! forms carry the same metadata as `#`-prefixed header lines so a
//! written file can be flown again through `MyFlight`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::flythrough::netcdf3::{self, NcFile, NcVar};
use crate::trajectory::{CoordTag, Trajectory, TrajectoryError};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("output io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported output extension '{0}'; must be one of nc, csv, or txt")]
    UnsupportedExtension(String),
    #[error("{0} already exists; remove the file or change output_name and rerun")]
    Exists(PathBuf),
    #[error("malformed trajectory file {path}: {message}")]
    Malformed { path: PathBuf, message: String },
    #[error(transparent)]
    NetCdf(#[from] netcdf3::NcError),
}

/// One named column of a persisted result, with its units.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub units: String,
    pub data: Vec<f64>,
}

/// The full persisted form of a flythrough result: provenance metadata
/// plus ordered columns (`utc_time`, `c1`, `c2`, `c3`, `net_idx`, then
/// one column per model variable).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFile {
    pub model: String,
    /// Model output files consulted when the result was produced.
    pub files: Vec<String>,
    pub coord_type: String,
    pub coord_grid: String,
    pub columns: Vec<Column>,
}

impl ResultFile {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// First column whose name contains "time", the convention for
    /// locating timestamps in files written by other tools.
    pub fn time_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.contains("time"))
    }
}

/// Extension of an output name, as validated up front: the part after
/// the last dot, or the whole name when no dot is present (which will
/// fail validation unless empty).
pub fn output_extension(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Write a result file, dispatching on the extension. Refuses to
/// overwrite: the orchestrator checks before computing and this guards
/// against races with slower flythroughs.
pub fn write_file(path: &Path, result: &ResultFile) -> Result<PathBuf, OutputError> {
    if path.exists() {
        return Err(OutputError::Exists(path.to_path_buf()));
    }
    match output_extension(&path.display().to_string()) {
        "nc" => write_netcdf(path, result)?,
        "csv" => write_delimited(path, result, ',')?,
        "txt" => write_delimited(path, result, '\t')?,
        other => return Err(OutputError::UnsupportedExtension(other.to_string())),
    }
    Ok(path.to_path_buf())
}

/// Read a result file previously written by `write_file`.
pub fn read_file(path: &Path) -> Result<ResultFile, OutputError> {
    match output_extension(&path.display().to_string()) {
        "nc" => read_netcdf(path),
        "csv" => read_delimited(path, ','),
        "txt" => read_delimited(path, '\t'),
        other => Err(OutputError::UnsupportedExtension(other.to_string())),
    }
}

/// Rebuild a `Trajectory` from a persisted file: time from the first
/// "time"-named column, positions from `c1`/`c2`/`c3`, coordinate tag
/// from the stored metadata.
pub fn read_trajectory(path: &Path) -> Result<Trajectory, TrajectoryError> {
    let as_traj_err = |message: String| TrajectoryError::File {
        path: path.display().to_string(),
        message,
    };

    let result = read_file(path).map_err(|e| as_traj_err(e.to_string()))?;
    let time = result
        .time_column()
        .ok_or_else(|| as_traj_err("no time column".to_string()))?;
    let mut positions = Vec::with_capacity(3);
    for name in ["c1", "c2", "c3"] {
        positions.push(
            result
                .column(name)
                .ok_or_else(|| as_traj_err(format!("missing column '{name}'")))?,
        );
    }
    let tag = format!("{}-{}", result.coord_type, result.coord_grid);
    Ok(Trajectory {
        time: time.data.clone(),
        c1: positions[0].data.clone(),
        c2: positions[1].data.clone(),
        c3: positions[2].data.clone(),
        coord: CoordTag::parse(&tag)?,
    })
}

fn write_delimited(path: &Path, result: &ResultFile, sep: char) -> Result<(), OutputError> {
    let mut out = fs::File::create(path)?;
    writeln!(out, "# model: {}", result.model)?;
    writeln!(out, "# files: {}", result.files.join("; "))?;
    writeln!(out, "# coord_type: {}", result.coord_type)?;
    writeln!(out, "# coord_grid: {}", result.coord_grid)?;
    let units: Vec<&str> = result.columns.iter().map(|c| c.units.as_str()).collect();
    writeln!(out, "# units: {}", units.join(&sep.to_string()))?;
    let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    writeln!(out, "{}", names.join(&sep.to_string()))?;

    let rows = result.columns.first().map(|c| c.data.len()).unwrap_or(0);
    for row in 0..rows {
        let fields: Vec<String> = result
            .columns
            .iter()
            .map(|c| c.data[row].to_string())
            .collect();
        writeln!(out, "{}", fields.join(&sep.to_string()))?;
    }
    Ok(())
}

fn read_delimited(path: &Path, sep: char) -> Result<ResultFile, OutputError> {
    let malformed = |message: String| OutputError::Malformed {
        path: path.to_path_buf(),
        message,
    };

    let content = fs::read_to_string(path)?;
    let mut result = ResultFile::default();
    let mut units: Vec<String> = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.peek() {
        let Some(meta) = line.strip_prefix('#') else {
            break;
        };
        let (key, value) = meta
            .split_once(':')
            .ok_or_else(|| malformed(format!("bad metadata line '{line}'")))?;
        let value = value.trim();
        match key.trim() {
            "model" => result.model = value.to_string(),
            "files" => {
                result.files = value
                    .split(';')
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect();
            }
            "coord_type" => result.coord_type = value.to_string(),
            "coord_grid" => result.coord_grid = value.to_string(),
            "units" => units = value.split(sep).map(|u| u.trim().to_string()).collect(),
            other => log::debug!("ignoring unknown metadata key '{other}'"),
        }
        lines.next();
    }

    let header = lines
        .next()
        .ok_or_else(|| malformed("missing column header".to_string()))?;
    for (i, name) in header.split(sep).enumerate() {
        result.columns.push(Column {
            name: name.trim().to_string(),
            units: units.get(i).cloned().unwrap_or_default(),
            data: Vec::new(),
        });
    }

    for line in lines.filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split(sep).collect();
        if fields.len() != result.columns.len() {
            return Err(malformed(format!(
                "row has {} fields, expected {}",
                fields.len(),
                result.columns.len()
            )));
        }
        for (column, field) in result.columns.iter_mut().zip(&fields) {
            let value: f64 = field
                .trim()
                .parse()
                .map_err(|_| OutputError::Malformed {
                    path: path.to_path_buf(),
                    message: format!("non-numeric field '{field}'"),
                })?;
            column.data.push(value);
        }
    }
    Ok(result)
}

fn write_netcdf(path: &Path, result: &ResultFile) -> Result<(), OutputError> {
    let nc = NcFile {
        global_attrs: vec![
            ("model".to_string(), result.model.clone()),
            ("files".to_string(), result.files.join("; ")),
            ("coord_type".to_string(), result.coord_type.clone()),
            ("coord_grid".to_string(), result.coord_grid.clone()),
        ],
        vars: result
            .columns
            .iter()
            .map(|c| NcVar {
                name: c.name.clone(),
                units: c.units.clone(),
                data: c.data.clone(),
            })
            .collect(),
    };
    netcdf3::write(path, &nc)?;
    Ok(())
}

fn read_netcdf(path: &Path) -> Result<ResultFile, OutputError> {
    let nc = netcdf3::read(path)?;
    Ok(ResultFile {
        model: nc.attr("model").unwrap_or_default().to_string(),
        files: nc
            .attr("files")
            .unwrap_or_default()
            .split(';')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect(),
        coord_type: nc.attr("coord_type").unwrap_or_default().to_string(),
        coord_grid: nc.attr("coord_grid").unwrap_or_default().to_string(),
        columns: nc
            .vars
            .into_iter()
            .map(|v| Column {
                name: v.name,
                units: v.units,
                data: v.data,
            })
            .collect(),
    })
}
