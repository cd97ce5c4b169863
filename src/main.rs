mod flythrough;
mod model;
mod trajectory;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::flythrough::{FlightOptions, FlythroughError, FlythroughResult, HtmlPlotter};
use crate::model::{registry, EngineError, Identifier, ModelEngine};
use crate::trajectory::{AssignmentPolicy, HapiClient, SyntheticOrbit};

#[derive(Parser)]
#[command(name = "flythrough")]
#[command(about = "Fly satellite trajectories through space-weather model output")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Be overwhelmed with information.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample orbit and fly it through the model data.
    #[command(name = "FakeFlight")]
    Fake {
        /// UTC timestamp of the first sample, seconds.
        start_time: i64,
        /// UTC timestamp of the last sample, seconds.
        stop_time: i64,
        /// Model name or integer code, e.g. CTIPe or 0.
        model: String,
        /// Directory holding the model output files.
        file_dir: PathBuf,
        /// Bracketed variable list, e.g. [rho,N_n]; integer codes allowed.
        variable_list: String,
        #[arg(default_value_t = 65.0, allow_negative_numbers = true)]
        max_lat: f64,
        #[arg(default_value_t = -65.0, allow_negative_numbers = true)]
        min_lat: f64,
        /// Degrees of longitude per 90-minute orbit.
        #[arg(default_value_t = 363.0, allow_negative_numbers = true)]
        lon_per_orbit: f64,
        /// Maximum starting height, km.
        #[arg(default_value_t = 450.0)]
        max_height: f64,
        /// Minimum starting height, km.
        #[arg(default_value_t = 400.0)]
        min_height: f64,
        /// Height decay across the duration, as a fraction of min_height.
        #[arg(default_value_t = 0.01)]
        p: f64,
        /// Sample cadence, seconds.
        #[arg(default_value_t = 2.0)]
        n: f64,
        #[arg(default_value_t = 20.0)]
        high_res: f64,
        /// Result file with nc, csv, or txt extension; empty skips output.
        #[arg(default_value = "")]
        output_name: String,
        #[arg(default_value = "GEO")]
        plot_coord: String,
    },
    /// Retrieve a satellite trajectory from the ephemeris service and
    /// fly it through the model data.
    #[command(name = "RealFlight")]
    Real {
        /// Satellite dataset id to pull the trajectory from.
        dataset: String,
        start: i64,
        stop: i64,
        model: String,
        file_dir: PathBuf,
        variable_list: String,
        /// One of GEO, GSM, GSE, or SM.
        #[arg(default_value = "GEO")]
        coord_type: String,
        #[arg(default_value = "")]
        output_name: String,
        #[arg(default_value = "GEO")]
        plot_coord: String,
        #[arg(default_value_t = 20.0)]
        high_res: f64,
    },
    /// Propagate a TLE file and fly the trajectory through the model
    /// data.
    #[command(name = "TLEFlight")]
    Tle {
        tle_file: PathBuf,
        start: i64,
        stop: i64,
        /// Seconds between trajectory positions.
        time_cadence: i64,
        model: String,
        file_dir: PathBuf,
        variable_list: String,
        /// TLE assignment policy: forward or nearest.
        #[arg(default_value = "forward")]
        method: String,
        #[arg(default_value = "")]
        output_name: String,
        #[arg(default_value = "GEO")]
        plot_coord: String,
        #[arg(default_value_t = 20.0)]
        high_res: f64,
    },
    /// Fly a previously saved trajectory file through the model data.
    #[command(name = "MyFlight")]
    My {
        /// Trajectory file written by an earlier flythrough (nc, csv,
        /// or txt).
        traj_file: PathBuf,
        model: String,
        file_dir: PathBuf,
        variable_list: String,
        #[arg(default_value = "")]
        output_name: String,
        #[arg(default_value = "GEO")]
        plot_coord: String,
        #[arg(default_value_t = 20.0)]
        high_res: f64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli.command) {
        Ok(result) => {
            println!(
                "{} samples survived the model domain; variables: {:?}",
                result.utc_time.len(),
                result.variables.keys().collect::<Vec<_>>()
            );
            println!("units: {:?}", result.units);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Model readers are external collaborators and none ship in this
/// binary; their crates register interpolation engines here.
fn linked_engine(model: &str) -> Result<Box<dyn ModelEngine>, EngineError> {
    Err(EngineError::Unavailable(model.to_string()))
}

fn run(command: Commands) -> Result<FlythroughResult, FlythroughError> {
    let plotter = HtmlPlotter::new();
    match command {
        Commands::Fake {
            start_time,
            stop_time,
            model,
            file_dir,
            variable_list,
            max_lat,
            min_lat,
            lon_per_orbit,
            max_height,
            min_height,
            p,
            n,
            high_res,
            output_name,
            plot_coord,
        } => {
            log::debug!(
                "FakeFlight {start_time}..{stop_time} model {model} vars {variable_list} \
                 lat {min_lat}..{max_lat} height {min_height}..{max_height} \
                 lon/orbit {lon_per_orbit} p {p} n {n}"
            );
            let model = Identifier::from(model.as_str());
            let engine = linked_engine(&registry::resolve_model(&model)?)?;
            let orbit = SyntheticOrbit {
                start_time: start_time as f64,
                stop_time: stop_time as f64,
                max_lat,
                min_lat,
                lon_per_orbit,
                max_height,
                min_height,
                precession: p,
                cadence: n,
            };
            flythrough::fake_flight(
                engine.as_ref(),
                &plotter,
                orbit,
                &model,
                &file_dir,
                &parse_list_token(&variable_list),
                &FlightOptions {
                    high_res,
                    output_name,
                    plot_coord: Identifier::from(plot_coord.as_str()),
                },
            )
        }
        Commands::Real {
            dataset,
            start,
            stop,
            model,
            file_dir,
            variable_list,
            coord_type,
            output_name,
            plot_coord,
            high_res,
        } => {
            log::debug!(
                "RealFlight {dataset} {start}..{stop} model {model} vars {variable_list} \
                 coord {coord_type}"
            );
            let model = Identifier::from(model.as_str());
            let engine = linked_engine(&registry::resolve_model(&model)?)?;
            flythrough::real_flight(
                engine.as_ref(),
                &plotter,
                &HapiClient::new(),
                &dataset,
                start,
                stop,
                &Identifier::from(coord_type.as_str()),
                &model,
                &file_dir,
                &parse_list_token(&variable_list),
                &FlightOptions {
                    high_res,
                    output_name,
                    plot_coord: Identifier::from(plot_coord.as_str()),
                },
            )
        }
        Commands::Tle {
            tle_file,
            start,
            stop,
            time_cadence,
            model,
            file_dir,
            variable_list,
            method,
            output_name,
            plot_coord,
            high_res,
        } => {
            log::debug!(
                "TLEFlight {} {start}..{stop} cadence {time_cadence} model {model} \
                 vars {variable_list} method {method}",
                tle_file.display()
            );
            let policy: AssignmentPolicy = method.parse()?;
            let model = Identifier::from(model.as_str());
            let engine = linked_engine(&registry::resolve_model(&model)?)?;
            flythrough::tle_flight(
                engine.as_ref(),
                &plotter,
                &tle_file,
                start,
                stop,
                time_cadence,
                policy,
                &model,
                &file_dir,
                &parse_list_token(&variable_list),
                &FlightOptions {
                    high_res,
                    output_name,
                    plot_coord: Identifier::from(plot_coord.as_str()),
                },
            )
        }
        Commands::My {
            traj_file,
            model,
            file_dir,
            variable_list,
            output_name,
            plot_coord,
            high_res,
        } => {
            log::debug!(
                "MyFlight {} model {model} vars {variable_list}",
                traj_file.display()
            );
            let model = Identifier::from(model.as_str());
            let engine = linked_engine(&registry::resolve_model(&model)?)?;
            flythrough::my_flight(
                engine.as_ref(),
                &plotter,
                &traj_file,
                &model,
                &file_dir,
                &parse_list_token(&variable_list),
                &FlightOptions {
                    high_res,
                    output_name,
                    plot_coord: Identifier::from(plot_coord.as_str()),
                },
            )
        }
    }
}

/// Parse a bracket-delimited list token like `[rho,N_n]` or
/// `['rho', 'N_n']` into identifiers.
fn parse_list_token(token: &str) -> Vec<Identifier> {
    token
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .replace(['\'', '"', ' '], "")
        .split(',')
        .filter(|t| !t.is_empty())
        .map(Identifier::from)
        .collect()
}
