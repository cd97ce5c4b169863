mod error;
mod flights;
mod netcdf3;
pub mod output;
mod plots;

pub use error::FlythroughError;
pub use flights::{
    fake_flight, my_flight, real_flight, tle_flight, FlightOptions, FlythroughResult,
};
pub use plots::HtmlPlotter;
