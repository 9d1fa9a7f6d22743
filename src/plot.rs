//! GC-content plot rendering.
//!
//! [`SvgPlot`] draws a [`GcSeries`] as a line chart: window start position on
//! the x axis, GC percentage (fixed 0–100 scale) on the y axis.
//!
//! Rendered plots are request-scoped. They are returned inline by default;
//! [`persist`] writes one to a freshly named file inside a directory so two
//! requests never share a path.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use svg::node::element::path::Data;
use svg::node::element::{Line, Path as SvgPath, Rectangle, Text};
use svg::Document;

use crate::gc::GcSeries;

const W: f64 = 1000.0;
const H: f64 = 600.0;
const LEFT: f64 = 80.0;
const RIGHT: f64 = W - 40.0;
const TOP: f64 = 60.0;
const BOTTOM: f64 = H - 70.0;

#[derive(thiserror::Error, Debug)]
pub enum PlotError {
    #[error("cannot write plot: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot render plot: {0}")]
    Render(String),
}

/// The plot-rendering port: series in, image document out.
pub trait PlotRenderer: Send + Sync {
    fn render(&self, series: &GcSeries) -> Result<String, PlotError>;

    /// File extension used by [`persist`].
    fn extension(&self) -> &str { "svg" }
}

/// Where the rendered plot of one request ended up.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlotArtifact {
    Inline { svg: String },
    File { path: PathBuf },
}

/// Static SVG line chart.
#[derive(Clone, Debug)]
pub struct SvgPlot {
    pub title: String,
}

impl Default for SvgPlot {
    fn default() -> Self { Self { title: "GC Content Distribution".to_string() } }
}

fn y_for(gc: f64) -> f64 {
    BOTTOM - (gc.clamp(0.0, 100.0) / 100.0) * (BOTTOM - TOP)
}

fn label(content: String, x: f64, y: f64, size: u32, anchor: &str) -> Text {
    Text::new(content)
        .set("x", x)
        .set("y", y)
        .set("font-family", "sans-serif")
        .set("font-size", size)
        .set("text-anchor", anchor)
        .set("fill", "#111111")
}

impl PlotRenderer for SvgPlot {
    fn render(&self, series: &GcSeries) -> Result<String, PlotError> {
        let mut doc = Document::new()
            .set("viewBox", (0, 0, W, H))
            .set("width", W)
            .set("height", H)
            .add(
                Rectangle::new()
                    .set("x", 0)
                    .set("y", 0)
                    .set("width", W)
                    .set("height", H)
                    .set("fill", "#ffffff"),
            )
            .add(label(self.title.clone(), W / 2.0, 32.0, 20, "middle"))
            .add(label("Sequence Position".to_string(), (LEFT + RIGHT) / 2.0, H - 20.0, 14, "middle"))
            .add(
                label("GC Content (%)".to_string(), 0.0, 0.0, 14, "middle")
                    .set("transform", format!("translate(24 {}) rotate(-90)", (TOP + BOTTOM) / 2.0)),
            );

        // horizontal grid every 20 %
        for tick in (0..=100).step_by(20) {
            let y = y_for(tick as f64);
            doc = doc
                .add(
                    Line::new()
                        .set("x1", LEFT)
                        .set("y1", y)
                        .set("x2", RIGHT)
                        .set("y2", y)
                        .set("stroke", if tick == 0 { "#333333" } else { "#dddddd" })
                        .set("stroke-width", 1),
                )
                .add(label(format!("{tick}"), LEFT - 10.0, y + 4.0, 12, "end"));
        }
        doc = doc.add(
            Line::new()
                .set("x1", LEFT)
                .set("y1", TOP)
                .set("x2", LEFT)
                .set("y2", BOTTOM)
                .set("stroke", "#333333")
                .set("stroke-width", 1),
        );

        let values = series.values();
        if values.is_empty() {
            doc = doc.add(label(
                format!("sequence shorter than the {}-base window", series.window()),
                (LEFT + RIGHT) / 2.0,
                (TOP + BOTTOM) / 2.0,
                14,
                "middle",
            ));
            return Ok(doc.to_string());
        }

        let last = values.len().saturating_sub(1).max(1) as f64;
        let x_for = |i: usize| LEFT + (i as f64 / last) * (RIGHT - LEFT);

        // vertical grid at five evenly spaced positions
        for k in 0..=4 {
            let pos = ((values.len() - 1) as f64 * k as f64 / 4.0).round() as usize;
            let x = x_for(pos);
            doc = doc
                .add(
                    Line::new()
                        .set("x1", x)
                        .set("y1", TOP)
                        .set("x2", x)
                        .set("y2", BOTTOM)
                        .set("stroke", "#eeeeee")
                        .set("stroke-width", 1),
                )
                .add(label(format!("{pos}"), x, BOTTOM + 18.0, 12, "middle"));
        }

        let mut data = Data::new().move_to((x_for(0), y_for(values[0])));
        for (i, &gc) in values.iter().enumerate().skip(1) {
            data = data.line_to((x_for(i), y_for(gc)));
        }
        doc = doc.add(
            SvgPath::new()
                .set("d", data)
                .set("fill", "none")
                .set("stroke", "#1f77b4")
                .set("stroke-width", 1.5),
        );

        Ok(doc.to_string())
    }
}

/// Write a rendered plot to a new, uniquely named file inside `dir`.
pub fn persist(document: &str, dir: &Path, extension: &str) -> Result<PathBuf, PlotError> {
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("gc_plot_")
        .suffix(&format!(".{extension}"))
        .tempfile_in(dir)?;
    file.write_all(document.as_bytes())?;
    let (_, path) = file.keep().map_err(|e| PlotError::Io(e.error))?;
    Ok(path)
}
