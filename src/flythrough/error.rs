use std::path::PathBuf;

use thiserror::Error;

use crate::flythrough::output::OutputError;
use crate::flythrough::plots::PlotError;
use crate::model::{EngineError, RegistryError};
use crate::trajectory::TrajectoryError;

#[derive(Debug, Error)]
pub enum FlythroughError {
    #[error("output extension '{0}' not recognized; must be one of nc, csv, or txt")]
    UnknownOutputExtension(String),
    #[error("{0} already exists; remove the file or change output_name and rerun")]
    OutputExists(PathBuf),
    #[error(
        "plots can only be requested in coordinate systems that support a cartesian grid; \
         '{0}' does not"
    )]
    UnsupportedPlotCoord(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),
    #[error("interpolation engine error: {0}")]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error(transparent)]
    Plot(#[from] PlotError),
}
