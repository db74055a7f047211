//! Renderable figure artifacts produced by plottable components.
//!
//! A [`Figure`] is backend-neutral data: a title, axis labels, and one of a
//! handful of chart shapes. Sinks decide how to show it (text on a terminal,
//! a page in a document).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single diagnostic figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    /// Figure title.
    pub title: String,
    /// Label of the horizontal axis, when the chart has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,
    /// Label of the vertical axis, when the chart has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,
    /// Chart payload.
    pub kind: FigureKind,
}

/// Chart payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FigureKind {
    /// Points with a marker size and a colour value.
    Scatter {
        /// Plotted points.
        points: Vec<ScatterPoint>,
        /// What the colour value means.
        color_label: String,
        /// Shapes drawn underneath the points.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        layers: Vec<GeometryLayer>,
    },
    /// Binned counts.
    Histogram {
        /// Bins in ascending order.
        bins: Vec<HistogramBin>,
    },
    /// Shares of a whole.
    Pie {
        /// Slices in display order.
        slices: Vec<PieSlice>,
    },
    /// One or more series over a shared x axis.
    Line {
        /// Plotted series.
        series: Vec<Series>,
    },
    /// Labelled bars.
    Bar {
        /// Bars in display order.
        bars: Vec<PieSlice>,
    },
}

/// One point of a scatter chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
    /// Marker size.
    pub size: f64,
    /// Colour value.
    pub value: f64,
}

/// An opaque shape (typically a `GeoJSON` geometry) with its label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryLayer {
    /// Label of the shape, e.g. the patch name.
    pub label: String,
    /// The shape itself.
    pub geometry: serde_json::Value,
}

/// One histogram bin, `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    /// Inclusive lower edge.
    pub lower: f64,
    /// Exclusive upper edge (inclusive for the last bin).
    pub upper: f64,
    /// Number of values in the bin.
    pub count: u64,
}

/// A labelled value (pie slice or bar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
    /// Display label.
    pub label: String,
    /// Value (not normalised).
    pub value: f64,
}

/// A named sequence of `(x, y)` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Legend label.
    pub label: String,
    /// Points in x order.
    pub points: Vec<(f64, f64)>,
}

impl Figure {
    /// Create a figure with no axis labels.
    pub fn new(title: &str, kind: FigureKind) -> Self {
        Self {
            title: title.to_owned(),
            x_label: None,
            y_label: None,
            kind,
        }
    }

    /// Set the horizontal axis label.
    #[must_use]
    pub fn with_x_label(mut self, label: &str) -> Self {
        self.x_label = Some(label.to_owned());
        self
    }

    /// Set the vertical axis label.
    #[must_use]
    pub fn with_y_label(mut self, label: &str) -> Self {
        self.y_label = Some(label.to_owned());
        self
    }

    /// Bin `values` into `nbins` equal-width bins spanning their range.
    ///
    /// An empty input yields no bins. When every value is equal the single
    /// occupied bin is one unit wide.
    pub fn histogram(title: &str, values: &[f64], nbins: usize) -> Self {
        Self::new(
            title,
            FigureKind::Histogram {
                bins: bin_values(values, nbins),
            },
        )
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn bin_values(values: &[f64], nbins: usize) -> Vec<HistogramBin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || nbins == 0 {
        return Vec::new();
    }
    let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if hi > lo { hi - lo } else { 1.0 };
    let width = span / nbins as f64;

    let mut counts = vec![0_u64; nbins];
    let last = nbins.saturating_sub(1);
    for v in finite {
        let idx = (((v - lo) / width).floor() as usize).min(last);
        if let Some(slot) = counts.get_mut(idx) {
            *slot = slot.saturating_add(1);
        }
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + width * i as f64,
            upper: lo + width * (i + 1) as f64,
            count,
        })
        .collect()
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.title)?;
        if let Some(x) = &self.x_label {
            writeln!(f, "x: {x}")?;
        }
        if let Some(y) = &self.y_label {
            writeln!(f, "y: {y}")?;
        }
        match &self.kind {
            FigureKind::Scatter {
                points,
                color_label,
                layers,
            } => {
                writeln!(f, "scatter, {} points (colour: {color_label})", points.len())?;
                if !layers.is_empty() {
                    writeln!(f, "  over {} geometry layers", layers.len())?;
                }
                for p in points {
                    writeln!(f, "  ({:.4}, {:.4}) size={:.2} value={}", p.x, p.y, p.size, p.value)?;
                }
            }
            FigureKind::Histogram { bins } => {
                writeln!(f, "histogram, {} bins", bins.len())?;
                for b in bins.iter().filter(|b| b.count > 0) {
                    writeln!(f, "  [{:.2}, {:.2}) {}", b.lower, b.upper, b.count)?;
                }
            }
            FigureKind::Pie { slices } => {
                let total: f64 = slices.iter().map(|s| s.value).sum();
                for s in slices {
                    let pct = if total > 0.0 { s.value / total * 100.0 } else { 0.0 };
                    writeln!(f, "  {}: {pct:.1}%", s.label)?;
                }
            }
            FigureKind::Line { series } => {
                for s in series {
                    writeln!(f, "  {} ({} points)", s.label, s.points.len())?;
                }
            }
            FigureKind::Bar { bars } => {
                for b in bars {
                    writeln!(f, "  {}: {}", b.label, b.value)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn bins_of(fig: &Figure) -> &[HistogramBin] {
        match &fig.kind {
            FigureKind::Histogram { bins } => bins.as_slice(),
            _ => &[],
        }
    }

    #[test]
    fn histogram_counts_every_value() {
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        let fig = Figure::histogram("dob", &values, 10);
        let bins = bins_of(&fig);
        assert_eq!(bins.len(), 10);
        assert!(bins.iter().all(|b| b.count == 10));
        assert_eq!(bins.first().unwrap().lower, 0.0);
    }

    #[test]
    fn max_value_lands_in_last_bin() {
        let fig = Figure::histogram("h", &[0.0, 5.0, 10.0], 2);
        let bins = bins_of(&fig);
        assert_eq!(bins.iter().map(|b| b.count).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn constant_values_single_bin() {
        let fig = Figure::histogram("h", &[3.0, 3.0, 3.0], 4);
        let total: u64 = bins_of(&fig).iter().map(|b| b.count).sum();
        assert_eq!(total, 3);
        assert_eq!(bins_of(&fig).first().unwrap().count, 3);
    }

    #[test]
    fn empty_values_no_bins() {
        let fig = Figure::histogram("h", &[], 10);
        assert!(bins_of(&fig).is_empty());
    }

    #[test]
    fn serializes_with_type_tag() {
        let fig = Figure::new(
            "phases",
            FigureKind::Pie {
                slices: vec![PieSlice {
                    label: "Model".to_owned(),
                    value: 1.0,
                }],
            },
        );
        let json = serde_json::to_value(&fig).unwrap();
        assert_eq!(json["kind"]["type"], "pie");
    }

    #[test]
    fn text_rendering_shows_percentages() {
        let fig = Figure::new(
            "phases",
            FigureKind::Pie {
                slices: vec![
                    PieSlice {
                        label: "a".to_owned(),
                        value: 1.0,
                    },
                    PieSlice {
                        label: "b".to_owned(),
                        value: 3.0,
                    },
                ],
            },
        );
        let text = fig.to_string();
        assert!(text.contains("a: 25.0%"));
        assert!(text.contains("b: 75.0%"));
    }
}
