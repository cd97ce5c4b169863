//! Plot generation collaborator. The orchestrator only cares about the
//! trigger order and the output filenames; how a plot is rendered is
//! the implementation's business. `HtmlPlotter` emits self-contained
//! plotly documents, one 3D track and one 1D time series per variable.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::model::{CoordConverter, EngineError};

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("plot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("plot coordinate conversion failed: {0}")]
    Conversion(#[from] EngineError),
}

/// Everything needed to render one variable's plots.
pub struct PlotRequest<'a> {
    pub variable: &'a str,
    pub units: &'a str,
    pub model: &'a str,
    pub time: &'a [f64],
    pub c1: &'a [f64],
    pub c2: &'a [f64],
    pub c3: &'a [f64],
    pub values: &'a [f64],
    pub coord_type: &'a str,
    pub coord_grid: &'a str,
    /// Cartesian system the 3D plot is projected into.
    pub plot_coord: &'a str,
}

pub trait FlightPlotter {
    fn plot_3d(&self, request: &PlotRequest<'_>, out: &Path) -> Result<(), PlotError>;
    fn plot_1d(&self, request: &PlotRequest<'_>, out: &Path) -> Result<(), PlotError>;
}

/// Writes plotly-CDN HTML files next to the result file. When a
/// coordinate converter is attached, the 3D track is projected into
/// the cartesian `plot_coord` system first; otherwise it is drawn in
/// the trajectory's own coordinates.
#[derive(Default)]
pub struct HtmlPlotter {
    converter: Option<Box<dyn CoordConverter>>,
}

impl HtmlPlotter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_converter(converter: Box<dyn CoordConverter>) -> Self {
        Self {
            converter: Some(converter),
        }
    }

    fn document(&self, trace: serde_json::Value, title: String) -> String {
        let layout = serde_json::json!({
            "title": { "text": title },
            "margin": { "l": 40, "r": 20, "t": 60, "b": 40 },
        });
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n\
             <script src=\"https://cdn.plot.ly/plotly-2.32.0.min.js\"></script>\n\
             </head>\n<body>\n<div id=\"plot\"></div>\n<script>\n\
             Plotly.newPlot(\"plot\", [{trace}], {layout});\n\
             </script>\n</body>\n</html>\n"
        )
    }
}

impl FlightPlotter for HtmlPlotter {
    fn plot_3d(&self, request: &PlotRequest<'_>, out: &Path) -> Result<(), PlotError> {
        let from = (request.coord_type, request.coord_grid);
        let to = (request.plot_coord, "car");
        let (x, y, z) = match &self.converter {
            Some(converter) if from != to => {
                converter.convert(request.c1, request.c2, request.c3, request.time, from, to)?
            }
            _ => (
                request.c1.to_vec(),
                request.c2.to_vec(),
                request.c3.to_vec(),
            ),
        };
        let trace = serde_json::json!({
            "type": "scatter3d",
            "mode": "markers",
            "x": x,
            "y": y,
            "z": z,
            "marker": {
                "size": 2,
                "color": request.values,
                "colorscale": "Viridis",
                "colorbar": { "title": request.units },
            },
        });
        let title = format!(
            "{} {} [{}] along track ({}-{}, plotted in {})",
            request.model,
            request.variable,
            request.units,
            request.coord_type,
            request.coord_grid,
            request.plot_coord
        );
        fs::write(out, self.document(trace, title))?;
        log::info!("wrote {}", out.display());
        Ok(())
    }

    fn plot_1d(&self, request: &PlotRequest<'_>, out: &Path) -> Result<(), PlotError> {
        let trace = serde_json::json!({
            "type": "scatter",
            "mode": "lines+markers",
            "x": request.time,
            "y": request.values,
            "marker": { "size": 3 },
        });
        let title = format!(
            "{} {} [{}] vs UTC time [s]",
            request.model, request.variable, request.units
        );
        fs::write(out, self.document(trace, title))?;
        log::info!("wrote {}", out.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_files_embed_the_data() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run_rho_3D.html");
        let request = PlotRequest {
            variable: "rho",
            units: "kg/m^3",
            model: "CTIPe",
            time: &[0.0, 2.0],
            c1: &[-180.0, -179.7],
            c2: &[65.0, 64.9],
            c3: &[425.0, 425.1],
            values: &[1.0e-12, 1.1e-12],
            coord_type: "GDZ",
            coord_grid: "sph",
            plot_coord: "GEO",
        };
        HtmlPlotter::new().plot_3d(&request, &out).unwrap();
        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.contains("scatter3d"));
        assert!(html.contains("-179.7"));

        let out1d = dir.path().join("run_rho_1D.html");
        HtmlPlotter::new().plot_1d(&request, &out1d).unwrap();
        let html = std::fs::read_to_string(&out1d).unwrap();
        assert!(html.contains("\"scatter\""));
    }

    struct Doubler;

    impl CoordConverter for Doubler {
        fn convert(
            &self,
            c1: &[f64],
            c2: &[f64],
            c3: &[f64],
            _time: &[f64],
            _from: (&str, &str),
            _to: (&str, &str),
        ) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>), EngineError> {
            let double = |v: &[f64]| v.iter().map(|x| x * 2.0).collect();
            Ok((double(c1), double(c2), double(c3)))
        }
    }

    #[test]
    fn converter_projects_the_3d_track() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run_rho_3D.html");
        let request = PlotRequest {
            variable: "rho",
            units: "kg/m^3",
            model: "CTIPe",
            time: &[0.0, 2.0],
            c1: &[10.0, 20.0],
            c2: &[1.0, 2.0],
            c3: &[3.0, 4.0],
            values: &[1.0, 2.0],
            coord_type: "GDZ",
            coord_grid: "sph",
            plot_coord: "GEO",
        };
        HtmlPlotter::with_converter(Box::new(Doubler))
            .plot_3d(&request, &out)
            .unwrap();
        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.contains("40.0"));
        assert!(!html.contains("\"x\":[10.0,20.0]"));
    }
}
