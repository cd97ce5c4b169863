use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::model::registry;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model data error: {0}")]
    Data(String),
    #[error("model file staging error: {0}")]
    Staging(#[from] std::io::Error),
    #[error("no interpolation engine is linked for model '{0}'")]
    Unavailable(String),
    #[error("coordinate conversion {from} -> {to} not supported")]
    UnsupportedConversion { from: String, to: String },
}

/// Everything an engine needs for one interpolation pass. Positions and
/// times are borrowed; engines must not assume ownership or mutate.
pub struct InterpolationRequest<'a> {
    pub model: &'a str,
    pub file_dir: &'a Path,
    pub variables: &'a [String],
    pub time: &'a [f64],
    pub c1: &'a [f64],
    pub c2: &'a [f64],
    pub c3: &'a [f64],
    pub coord_type: &'a str,
    pub coord_grid: &'a str,
    /// Accuracy of the altitude-to-pressure-level inversion, where the
    /// model requires one.
    pub high_res: f64,
}

/// Interpolated values aligned to the timestamps that survived the
/// model's temporal and spatial coverage. `net_idx[i]` is the index of
/// surviving sample `i` in the request arrays.
#[derive(Debug, Clone, Default)]
pub struct InterpolatedSet {
    pub utc_time: Vec<f64>,
    pub c1: Vec<f64>,
    pub c2: Vec<f64>,
    pub c3: Vec<f64>,
    pub net_idx: Vec<usize>,
    pub variables: BTreeMap<String, Vec<f64>>,
}

/// Capability interface over a per-model file reader and interpolator.
/// Implementations own file discovery, caching, and the interpolation
/// algorithm itself; none of that is specified here.
pub trait ModelEngine {
    /// Stage or convert model output files so interpolation can run.
    fn prepare(&self, model: &str, file_dir: &Path) -> Result<(), EngineError>;

    /// Interpolate the requested variables at the request positions.
    /// Samples outside model coverage are dropped, never extrapolated;
    /// variables the model run does not provide are simply absent from
    /// the returned map.
    fn interpolate(&self, request: &InterpolationRequest<'_>) -> Result<InterpolatedSet, EngineError>;

    /// Units per variable name, for the merged units mapping. The
    /// default consults the standardized variable table.
    fn variable_units(&self, _model: &str, variables: &[String]) -> BTreeMap<String, String> {
        registry::variable_units(variables)
    }

    /// Model output files a flythrough over this directory consults,
    /// recorded as provenance in persisted results.
    fn consulted_files(&self, model: &str, file_dir: &Path) -> Result<Vec<String>, EngineError>;
}

/// Pure coordinate conversion between two `(system, grid)` pairs.
/// Implementations return arrays of the same shape as the input.
pub trait CoordConverter {
    #[allow(clippy::too_many_arguments)]
    fn convert(
        &self,
        c1: &[f64],
        c2: &[f64],
        c3: &[f64],
        time: &[f64],
        from: (&str, &str),
        to: (&str, &str),
    ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), EngineError>;
}
