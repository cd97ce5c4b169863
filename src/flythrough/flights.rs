use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::flythrough::error::FlythroughError;
use crate::flythrough::output::{self, output_extension, Column, ResultFile};
use crate::flythrough::plots::{FlightPlotter, PlotRequest};
use crate::model::registry;
use crate::model::{Identifier, InterpolationRequest, ModelEngine};
use crate::trajectory::{
    AssignmentPolicy, EphemerisRequest, EphemerisSeries, EphemerisSource, SyntheticOrbit,
    TrajectoryError, TrajectorySource,
};

/// Options shared by every flight entry point.
#[derive(Debug, Clone)]
pub struct FlightOptions {
    /// Accuracy of the altitude-to-pressure-level inversion, for models
    /// that need one.
    pub high_res: f64,
    /// Result filename with extension (`nc`, `csv`, or `txt`); empty
    /// disables persistence and plotting.
    pub output_name: String,
    /// Cartesian coordinate system for the 3D plots.
    pub plot_coord: Identifier,
}

impl Default for FlightOptions {
    fn default() -> Self {
        Self {
            high_res: 20.0,
            output_name: String::new(),
            plot_coord: Identifier::Name("GEO".to_string()),
        }
    }
}

/// Interpolated model variables merged with the surviving trajectory
/// samples. `net_idx[i]` indexes surviving sample `i` in the input
/// trajectory, so callers can tell which timestamps were dropped.
#[derive(Debug, Clone, Default)]
pub struct FlythroughResult {
    pub utc_time: Vec<f64>,
    pub c1: Vec<f64>,
    pub c2: Vec<f64>,
    pub c3: Vec<f64>,
    pub net_idx: Vec<usize>,
    pub variables: BTreeMap<String, Vec<f64>>,
    /// Units for every key above plus each variable.
    pub units: BTreeMap<String, String>,
}

/// Placeholder for flights that never touch the network.
struct NoEphemeris;

impl EphemerisSource for NoEphemeris {
    fn fetch(&self, _request: &EphemerisRequest) -> Result<EphemerisSeries, TrajectoryError> {
        Err(TrajectoryError::Ephemeris(
            "no ephemeris source configured".to_string(),
        ))
    }
}

/// Build the trajectory from its source and fly it through the model.
#[allow(clippy::too_many_arguments)]
pub fn fly(
    engine: &dyn ModelEngine,
    plotter: &dyn FlightPlotter,
    ephemeris: &dyn EphemerisSource,
    source: &TrajectorySource,
    model: &Identifier,
    file_dir: &Path,
    variables: &[Identifier],
    options: &FlightOptions,
) -> Result<FlythroughResult, FlythroughError> {
    let trajectory = source.build(ephemeris)?;
    let tag = trajectory.coord.to_string();
    model_flythrough(
        engine,
        plotter,
        model,
        file_dir,
        variables,
        &trajectory.time,
        &trajectory.c1,
        &trajectory.c2,
        &trajectory.c3,
        &tag,
        options,
    )
}

/// Fly a synthetic sample orbit through the model data.
pub fn fake_flight(
    engine: &dyn ModelEngine,
    plotter: &dyn FlightPlotter,
    orbit: SyntheticOrbit,
    model: &Identifier,
    file_dir: &Path,
    variables: &[Identifier],
    options: &FlightOptions,
) -> Result<FlythroughResult, FlythroughError> {
    let source = TrajectorySource::Synthetic(orbit);
    fly(
        engine, plotter, &NoEphemeris, &source, model, file_dir, variables, options,
    )
}

/// Retrieve a satellite's real trajectory from the ephemeris service
/// and fly it through the model data.
#[allow(clippy::too_many_arguments)]
pub fn real_flight(
    engine: &dyn ModelEngine,
    plotter: &dyn FlightPlotter,
    ephemeris: &dyn EphemerisSource,
    dataset: &str,
    start_ts: i64,
    stop_ts: i64,
    coord_type: &Identifier,
    model: &Identifier,
    file_dir: &Path,
    variables: &[Identifier],
    options: &FlightOptions,
) -> Result<FlythroughResult, FlythroughError> {
    let source = TrajectorySource::RemoteEphemeris {
        dataset: dataset.to_string(),
        start_ts,
        stop_ts,
        coord_system: registry::resolve_coord_system(coord_type)?,
    };
    fly(
        engine, plotter, ephemeris, &source, model, file_dir, variables, options,
    )
}

/// Propagate a TLE file into a trajectory and fly it through the model
/// data.
#[allow(clippy::too_many_arguments)]
pub fn tle_flight(
    engine: &dyn ModelEngine,
    plotter: &dyn FlightPlotter,
    tle_file: &Path,
    start_ts: i64,
    stop_ts: i64,
    cadence: i64,
    policy: AssignmentPolicy,
    model: &Identifier,
    file_dir: &Path,
    variables: &[Identifier],
    options: &FlightOptions,
) -> Result<FlythroughResult, FlythroughError> {
    let source = TrajectorySource::Tle {
        file: tle_file.to_path_buf(),
        start_ts,
        stop_ts,
        cadence,
        policy,
    };
    fly(
        engine, plotter, &NoEphemeris, &source, model, file_dir, variables, options,
    )
}

/// Read a previously persisted trajectory and fly it through the model
/// data.
pub fn my_flight(
    engine: &dyn ModelEngine,
    plotter: &dyn FlightPlotter,
    trajectory_file: &Path,
    model: &Identifier,
    file_dir: &Path,
    variables: &[Identifier],
    options: &FlightOptions,
) -> Result<FlythroughResult, FlythroughError> {
    let source = TrajectorySource::File {
        path: trajectory_file.to_path_buf(),
    };
    fly(
        engine, plotter, &NoEphemeris, &source, model, file_dir, variables, options,
    )
}

/// Validate, normalize, interpolate, and assemble one flythrough.
///
/// Validation happens before any expensive work; timestamps the model
/// cannot cover are dropped by the engine and recorded via `net_idx`;
/// requested variables the model run lacks are dropped with a warning.
#[allow(clippy::too_many_arguments)]
pub fn model_flythrough(
    engine: &dyn ModelEngine,
    plotter: &dyn FlightPlotter,
    model: &Identifier,
    file_dir: &Path,
    variables: &[Identifier],
    time: &[f64],
    c1: &[f64],
    c2: &[f64],
    c3: &[f64],
    coord: &str,
    options: &FlightOptions,
) -> Result<FlythroughResult, FlythroughError> {
    // Reject bad output requests before touching model data.
    let extension = output_extension(&options.output_name).to_string();
    if !matches!(extension.as_str(), "" | "nc" | "csv" | "txt") {
        return Err(FlythroughError::UnknownOutputExtension(extension));
    }
    let output_path = (!options.output_name.is_empty()).then(|| PathBuf::from(&options.output_name));
    if let Some(path) = &output_path {
        if path.exists() {
            return Err(FlythroughError::OutputExists(path.clone()));
        }
    }

    let model = registry::resolve_model(model)?;
    let variables = registry::resolve_variables(variables)?;
    let (system_token, grid_token) = coord
        .rsplit_once('-')
        .ok_or_else(|| TrajectoryError::InvalidCoordTag(coord.to_string()))?;
    let coord_type = registry::resolve_coord_system(&Identifier::from(system_token))?;
    let coord_grid = registry::resolve_coord_grid(&Identifier::from(grid_token))?;

    engine.prepare(&model, file_dir)?;
    let set = engine.interpolate(&InterpolationRequest {
        model: &model,
        file_dir,
        variables: &variables,
        time,
        c1,
        c2,
        c3,
        coord_type: &coord_type,
        coord_grid: &coord_grid,
        high_res: options.high_res,
    })?;

    for requested in &variables {
        if !set.variables.contains_key(requested) {
            log::warn!("variable {requested} is not in the {model} output; dropping it");
        }
    }
    let surviving: Vec<String> = set.variables.keys().cloned().collect();

    let mut units = engine.variable_units(&model, &surviving);
    units.extend(registry::coord_units(&coord_type, &coord_grid));
    log::info!("result units: {units:?}");

    let result = FlythroughResult {
        utc_time: set.utc_time,
        c1: set.c1,
        c2: set.c2,
        c3: set.c3,
        net_idx: set.net_idx,
        variables: set.variables,
        units,
    };

    if let Some(path) = output_path {
        let files = engine.consulted_files(&model, file_dir)?;
        let written = output::write_file(
            &path,
            &to_result_file(&model, files, &coord_type, &coord_grid, &result),
        )?;
        log::info!("output saved in {}", written.display());

        // SPH and RLL have no cartesian projection to plot into.
        let plot_coord = registry::resolve_coord_system(&options.plot_coord)?;
        if matches!(plot_coord.as_str(), "SPH" | "RLL") {
            return Err(FlythroughError::UnsupportedPlotCoord(plot_coord));
        }

        let stem = options
            .output_name
            .strip_suffix(&format!(".{extension}"))
            .unwrap_or(&options.output_name)
            .to_string();
        for (variable, values) in &result.variables {
            let request = PlotRequest {
                variable,
                units: result.units.get(variable).map(String::as_str).unwrap_or(""),
                model: &model,
                time: &result.utc_time,
                c1: &result.c1,
                c2: &result.c2,
                c3: &result.c3,
                values,
                coord_type: &coord_type,
                coord_grid: &coord_grid,
                plot_coord: &plot_coord,
            };
            plotter.plot_3d(&request, Path::new(&format!("{stem}_{variable}_3D.html")))?;
            plotter.plot_1d(&request, Path::new(&format!("{stem}_{variable}_1D.html")))?;
        }
    }

    Ok(result)
}

fn to_result_file(
    model: &str,
    files: Vec<String>,
    coord_type: &str,
    coord_grid: &str,
    result: &FlythroughResult,
) -> ResultFile {
    let unit_of = |name: &str| result.units.get(name).cloned().unwrap_or_default();
    let mut columns = vec![
        Column {
            name: "utc_time".to_string(),
            units: unit_of("utc_time"),
            data: result.utc_time.clone(),
        },
        Column {
            name: "c1".to_string(),
            units: unit_of("c1"),
            data: result.c1.clone(),
        },
        Column {
            name: "c2".to_string(),
            units: unit_of("c2"),
            data: result.c2.clone(),
        },
        Column {
            name: "c3".to_string(),
            units: unit_of("c3"),
            data: result.c3.clone(),
        },
        Column {
            name: "net_idx".to_string(),
            units: unit_of("net_idx"),
            data: result.net_idx.iter().map(|&i| i as f64).collect(),
        },
    ];
    for (variable, values) in &result.variables {
        columns.push(Column {
            name: variable.clone(),
            units: unit_of(variable),
            data: values.clone(),
        });
    }
    ResultFile {
        model: model.to_string(),
        files,
        coord_type: coord_type.to_string(),
        coord_grid: coord_grid.to_string(),
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EngineError, InterpolatedSet};
    use crate::flythrough::plots::PlotError;
    use std::cell::Cell;

    /// Analytic engine: rho = c3 * 2, coverage limited to
    /// `t_min..=t_max`, consulted file list is fixed.
    struct TestEngine {
        t_min: f64,
        t_max: f64,
        interpolate_calls: Cell<usize>,
    }

    impl TestEngine {
        fn covering(t_min: f64, t_max: f64) -> Self {
            Self {
                t_min,
                t_max,
                interpolate_calls: Cell::new(0),
            }
        }
    }

    impl ModelEngine for TestEngine {
        fn prepare(&self, _model: &str, _file_dir: &Path) -> Result<(), EngineError> {
            Ok(())
        }

        fn interpolate(
            &self,
            request: &InterpolationRequest<'_>,
        ) -> Result<InterpolatedSet, EngineError> {
            self.interpolate_calls.set(self.interpolate_calls.get() + 1);
            let mut set = InterpolatedSet::default();
            for (i, &t) in request.time.iter().enumerate() {
                if t < self.t_min || t > self.t_max {
                    continue;
                }
                set.utc_time.push(t);
                set.c1.push(request.c1[i]);
                set.c2.push(request.c2[i]);
                set.c3.push(request.c3[i]);
                set.net_idx.push(i);
            }
            if request.variables.contains(&"rho".to_string()) {
                set.variables.insert(
                    "rho".to_string(),
                    set.c3.iter().map(|h| h * 2.0).collect(),
                );
            }
            Ok(set)
        }

        fn consulted_files(&self, _model: &str, _file_dir: &Path) -> Result<Vec<String>, EngineError> {
            Ok(vec!["model_day1.nc".to_string()])
        }
    }

    #[derive(Default)]
    struct CountingPlotter {
        plots: Cell<usize>,
    }

    impl FlightPlotter for CountingPlotter {
        fn plot_3d(&self, _request: &PlotRequest<'_>, out: &Path) -> Result<(), PlotError> {
            self.plots.set(self.plots.get() + 1);
            std::fs::write(out, "plot")?;
            Ok(())
        }

        fn plot_1d(&self, _request: &PlotRequest<'_>, out: &Path) -> Result<(), PlotError> {
            self.plots.set(self.plots.get() + 1);
            std::fs::write(out, "plot")?;
            Ok(())
        }
    }

    fn vars(names: &[&str]) -> Vec<Identifier> {
        names.iter().map(|n| Identifier::from(*n)).collect()
    }

    fn short_orbit() -> SyntheticOrbit {
        SyntheticOrbit {
            start_time: 0.0,
            stop_time: 5400.0,
            ..SyntheticOrbit::default()
        }
    }

    #[test]
    fn out_of_coverage_samples_are_dropped_with_net_idx() {
        let engine = TestEngine::covering(1000.0, 4000.0);
        let result = fake_flight(
            &engine,
            &CountingPlotter::default(),
            short_orbit(),
            &Identifier::from("CTIPe"),
            Path::new("/tmp/model-data"),
            &vars(&["rho"]),
            &FlightOptions::default(),
        )
        .unwrap();

        assert!(!result.utc_time.is_empty());
        assert!(result.utc_time.iter().all(|&t| (1000.0..=4000.0).contains(&t)));
        assert_eq!(result.utc_time.len(), result.net_idx.len());
        // net_idx points back into the 2700-sample input orbit
        assert!(result.net_idx.iter().all(|&i| i < 2700));
        assert_eq!(result.variables["rho"].len(), result.utc_time.len());
        // units cover coordinates and the variable
        assert_eq!(result.units["c3"], "km");
        assert_eq!(result.units["rho"], "kg/m^3");
    }

    #[test]
    fn absent_variables_are_dropped_not_fatal() {
        let engine = TestEngine::covering(0.0, 6000.0);
        let result = fake_flight(
            &engine,
            &CountingPlotter::default(),
            short_orbit(),
            &Identifier::from("CTIPe"),
            Path::new("/tmp/model-data"),
            &vars(&["rho", "no_such_var"]),
            &FlightOptions::default(),
        )
        .unwrap();
        assert!(result.variables.contains_key("rho"));
        assert!(!result.variables.contains_key("no_such_var"));
    }

    #[test]
    fn unknown_extension_fails_before_interpolation() {
        let engine = TestEngine::covering(0.0, 6000.0);
        let err = fake_flight(
            &engine,
            &CountingPlotter::default(),
            short_orbit(),
            &Identifier::from("CTIPe"),
            Path::new("/tmp/model-data"),
            &vars(&["rho"]),
            &FlightOptions {
                output_name: "results.xyz".to_string(),
                ..FlightOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, FlythroughError::UnknownOutputExtension(_)));
        assert_eq!(engine.interpolate_calls.get(), 0);
    }

    #[test]
    fn existing_output_fails_before_interpolation() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("results.csv");
        std::fs::write(&existing, "occupied").unwrap();

        let engine = TestEngine::covering(0.0, 6000.0);
        let err = fake_flight(
            &engine,
            &CountingPlotter::default(),
            short_orbit(),
            &Identifier::from("CTIPe"),
            Path::new("/tmp/model-data"),
            &vars(&["rho"]),
            &FlightOptions {
                output_name: existing.display().to_string(),
                ..FlightOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, FlythroughError::OutputExists(_)));
        assert_eq!(engine.interpolate_calls.get(), 0);
    }

    #[test]
    fn spherical_plot_coord_fails_before_any_plot() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("results.csv");
        let engine = TestEngine::covering(0.0, 6000.0);
        let plotter = CountingPlotter::default();

        let err = fake_flight(
            &engine,
            &plotter,
            short_orbit(),
            &Identifier::from("CTIPe"),
            Path::new("/tmp/model-data"),
            &vars(&["rho"]),
            &FlightOptions {
                output_name: output.display().to_string(),
                plot_coord: Identifier::from("SPH"),
                ..FlightOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, FlythroughError::UnsupportedPlotCoord(_)));
        assert_eq!(plotter.plots.get(), 0);
    }

    #[test]
    fn persisted_result_round_trips_through_my_flight() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("orbit.csv");
        let engine = TestEngine::covering(0.0, 6000.0);
        let plotter = CountingPlotter::default();

        let flown = fake_flight(
            &engine,
            &plotter,
            short_orbit(),
            &Identifier::from("CTIPe"),
            Path::new("/tmp/model-data"),
            &vars(&["rho"]),
            &FlightOptions {
                output_name: output.display().to_string(),
                ..FlightOptions::default()
            },
        )
        .unwrap();
        // one 3D and one 1D plot for the single variable
        assert_eq!(plotter.plots.get(), 2);
        assert!(dir.path().join("orbit_rho_3D.html").exists());
        assert!(dir.path().join("orbit_rho_1D.html").exists());

        let reflown = my_flight(
            &engine,
            &CountingPlotter::default(),
            &output,
            &Identifier::from("CTIPe"),
            Path::new("/tmp/model-data"),
            &vars(&["rho"]),
            &FlightOptions::default(),
        )
        .unwrap();

        assert_eq!(reflown.utc_time, flown.utc_time);
        assert_eq!(reflown.c1, flown.c1);
        assert_eq!(reflown.c2, flown.c2);
        assert_eq!(reflown.c3, flown.c3);
        assert_eq!(reflown.variables["rho"], flown.variables["rho"]);
    }

    #[test]
    fn model_codes_resolve_like_names() {
        let engine = TestEngine::covering(0.0, 6000.0);
        let result = fake_flight(
            &engine,
            &CountingPlotter::default(),
            short_orbit(),
            &Identifier::Code(0), // CTIPe
            Path::new("/tmp/model-data"),
            &vars(&["0"]), // rho
            &FlightOptions::default(),
        )
        .unwrap();
        assert!(result.variables.contains_key("rho"));
    }

    #[test]
    fn unknown_model_is_fatal() {
        let engine = TestEngine::covering(0.0, 6000.0);
        let err = fake_flight(
            &engine,
            &CountingPlotter::default(),
            short_orbit(),
            &Identifier::from("NotAModel"),
            Path::new("/tmp/model-data"),
            &vars(&["rho"]),
            &FlightOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FlythroughError::Registry(_)));
    }
}
