//! Visualization delegation: collect figures from every plottable component.
//!
//! The orchestrator walks its plottable sources in order (the model's own
//! diagnostics first, then components in registration order) and drains each
//! source's lazy figure sequence. Figures go either to a [`FigureSink`] or
//! into a single JSON [`FigureDocument`] on disk.
//!
//! A failing plot does not abort the pass. The error is logged, the rest of
//! that source's sequence is skipped, and the next source continues. Only a
//! failure to write the document is fatal.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use metapop_types::{Figure, FigureKind, GeometryLayer, PieSlice, ScatterPoint};
use serde::Serialize;
use tracing::{info, warn};

use crate::component::{FigureIter, ModelView, Plottable};
use crate::state::StateError;

/// Number of bins in the date-of-birth histogram.
pub const DOB_HISTOGRAM_BINS: usize = 100;

/// Errors a single plot can produce.
#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    /// The model has not produced the data this plot needs.
    #[error("missing state: {what}")]
    MissingState {
        /// What is missing.
        what: String,
    },

    /// The figure could not be built or delivered.
    #[error("render failed: {message}")]
    Render {
        /// Description of the failure.
        message: String,
    },

    /// Reading simulation state failed.
    #[error("state error: {source}")]
    State {
        /// The underlying state error.
        #[from]
        source: StateError,
    },
}

/// Errors that abort a visualization pass.
#[derive(Debug, thiserror::Error)]
pub enum VisualizationError {
    /// Writing the figure document failed.
    #[error("failed to write figure document: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Serializing the figure document failed.
    #[error("failed to serialize figure document: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Destination for interactively displayed figures.
pub trait FigureSink {
    /// Show one figure produced by `source`.
    ///
    /// # Errors
    ///
    /// Returns [`PlotError::Render`] if the figure cannot be shown.
    fn show(&mut self, source: &str, figure: &Figure) -> Result<(), PlotError>;
}

/// Writes a text rendering of each figure.
#[derive(Debug)]
pub struct ConsoleSink<W> {
    out: W,
}

impl ConsoleSink<std::io::Stdout> {
    /// A sink writing to standard output.
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> ConsoleSink<W> {
    /// A sink writing to `out`.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FigureSink for ConsoleSink<W> {
    fn show(&mut self, source: &str, figure: &Figure) -> Result<(), PlotError> {
        writeln!(self.out, "[{source}]\n{figure}").map_err(|err| PlotError::Render {
            message: err.to_string(),
        })
    }
}

/// Keeps every figure in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// `(source, figure)` pairs in delivery order.
    pub figures: Vec<(String, Figure)>,
}

impl FigureSink for CollectingSink {
    fn show(&mut self, source: &str, figure: &Figure) -> Result<(), PlotError> {
        self.figures.push((source.to_owned(), figure.clone()));
        Ok(())
    }
}

/// Where figures go.
pub enum VisualizeMode<'s> {
    /// Deliver each figure to a sink as it is produced.
    Interactive(&'s mut dyn FigureSink),
    /// Collect every figure into one JSON document in `directory`.
    Document {
        /// Output directory (created if missing).
        directory: PathBuf,
    },
}

/// One figure tagged with the component that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentEntry {
    /// Producing component.
    pub source: String,
    /// The figure.
    pub figure: Figure,
}

/// All figures of a visualization pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureDocument {
    /// Model name.
    pub model: String,
    /// Run start (or model creation) time.
    pub created: DateTime<Local>,
    /// Figures in production order.
    pub figures: Vec<DocumentEntry>,
}

/// A plot sequence cut short by an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPlot {
    /// Component whose sequence was cut.
    pub component: String,
    /// Position of the failing item in that sequence.
    pub index: usize,
    /// Rendered error.
    pub reason: String,
}

/// Outcome of a visualization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisualizationReport {
    /// Figures delivered or collected.
    pub rendered: usize,
    /// Sequences that stopped early.
    pub skipped: Vec<SkippedPlot>,
    /// Path of the written document, in document mode.
    pub document: Option<PathBuf>,
}

/// File name of the figure document for a model.
pub fn document_file_name(model: &str, stamp: &DateTime<Local>) -> String {
    format!("{model} {}.json", stamp.format("%Y-%m-%d %H%M%S"))
}

/// Drain every source's figures into `mode`.
pub(crate) fn render<'a>(
    sources: &[(&'a str, &'a dyn Plottable)],
    view: ModelView<'a>,
    stamp: DateTime<Local>,
    mut mode: VisualizeMode<'_>,
) -> Result<VisualizationReport, VisualizationError> {
    let mut report = VisualizationReport::default();
    let mut collected = Vec::new();

    for (source, plottable) in sources {
        for (index, item) in plottable.plots(view).enumerate() {
            let delivered = item.and_then(|figure| match &mut mode {
                VisualizeMode::Interactive(sink) => sink.show(source, &figure),
                VisualizeMode::Document { .. } => {
                    collected.push(DocumentEntry {
                        source: (*source).to_owned(),
                        figure,
                    });
                    Ok(())
                }
            });
            match delivered {
                Ok(()) => report.rendered = report.rendered.saturating_add(1),
                Err(err) => {
                    warn!(component = *source, index, %err, "Plot failed, skipping remaining plots");
                    report.skipped.push(SkippedPlot {
                        component: (*source).to_owned(),
                        index,
                        reason: err.to_string(),
                    });
                    break;
                }
            }
        }
    }

    if let VisualizeMode::Document { directory } = mode {
        let document = FigureDocument {
            model: view.name.to_owned(),
            created: stamp,
            figures: collected,
        };
        let path = write_document(&directory, &document)?;
        info!(path = %path.display(), figures = document.figures.len(), "Figure document written");
        report.document = Some(path);
    }

    Ok(report)
}

fn write_document(directory: &Path, document: &FigureDocument) -> Result<PathBuf, VisualizationError> {
    std::fs::create_dir_all(directory)?;
    let path = directory.join(document_file_name(&document.model, &document.created));
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.flush()?;
    Ok(path)
}

/// The orchestrator's own diagnostics: scenario map, initial date-of-birth
/// distribution, and share of run time per phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelPlots;

impl Plottable for ModelPlots {
    fn plots<'a>(&'a self, view: ModelView<'a>) -> FigureIter<'a> {
        Box::new(
            std::iter::once_with(move || Ok(scenario_scatter(view)))
                .chain(std::iter::once_with(move || Ok(dob_histogram(view))))
                .chain(std::iter::once_with(move || phase_pie(view))),
        )
    }
}

#[allow(clippy::cast_precision_loss)]
fn scenario_scatter(view: ModelView<'_>) -> Figure {
    let points = view
        .scenario
        .patches()
        .iter()
        .map(|patch| ScatterPoint {
            x: patch.longitude,
            y: patch.latitude,
            size: patch.population as f64 / 1000.0,
            value: patch.population as f64,
        })
        .collect();
    let layers = if view.scenario.has_geometry() {
        view.scenario
            .patches()
            .iter()
            .filter_map(|patch| {
                patch.geometry.as_ref().map(|geometry| GeometryLayer {
                    label: patch.name.clone(),
                    geometry: geometry.clone(),
                })
            })
            .collect()
    } else {
        Vec::new()
    };
    Figure::new(
        "Scenario Patches and Populations",
        FigureKind::Scatter {
            points,
            color_label: "population".to_owned(),
            layers,
        },
    )
    .with_x_label("Longitude")
    .with_y_label("Latitude")
}

#[allow(clippy::cast_precision_loss)]
fn dob_histogram(view: ModelView<'_>) -> Figure {
    let initial = usize::try_from(view.scenario.total_population()).unwrap_or(usize::MAX);
    let dobs: Vec<f64> = view
        .state
        .population
        .dobs()
        .iter()
        .take(initial)
        .map(|dob| *dob as f64)
        .collect();
    Figure::histogram("Distribution of Day of Birth for Initial Population", &dobs, DOB_HISTOGRAM_BINS)
        .with_x_label("Day of Birth")
        .with_y_label("Count")
}

#[allow(clippy::cast_precision_loss)]
fn phase_pie(view: ModelView<'_>) -> Result<Figure, PlotError> {
    if view.metrics.is_empty() {
        return Err(PlotError::MissingState {
            what: "phase timings (model has not run)".to_owned(),
        });
    }
    let slices = view
        .metrics
        .phase_names()
        .iter()
        .zip(view.metrics.totals())
        .map(|(name, us)| PieSlice {
            label: name.strip_prefix("do_").unwrap_or(name).to_owned(),
            value: us as f64,
        })
        .collect();
    Ok(Figure::new("Update Phase Times", FigureKind::Pie { slices }))
}
