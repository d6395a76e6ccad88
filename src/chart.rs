//! Chart specifications for the heatmap and hourly bar views.
//!
//! Figures serialise to the `{data, layout}` structure understood by Plotly.

use crate::labels;
use crate::limits::{Limits, Range};
use crate::models::{MonthFilter, ScaleMode};
use crate::reduction::{HourlyCounts, SpatialCounts};

use serde::Serialize;

const BAR_TITLE: &str = "Pickup hours in zoomed region";
const HOUR_AXIS_LABEL: &str = "Pickup hour";
const COUNT_AXIS_LABEL: &str = "counts";
const ZOOMED_SERIES: &str = "Zoomed region";
const FULL_SERIES: &str = "Full region";

/// A chart: traces plus layout.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

/// A data series.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Heatmap {
        /// Bin centres along x
        x: Vec<f64>,
        /// Bin centres along y
        y: Vec<f64>,
        /// One row per y bin
        z: Vec<Vec<f64>>,
    },
    Bar {
        name: &'static str,
        x: Vec<String>,
        y: Vec<u64>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Layout {
    pub title: String,
    pub xaxis: Axis,
    pub yaxis: Axis,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Axis {
    pub label: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub axis_type: Option<&'static str>,
}

impl Axis {
    fn labelled(label: &str) -> Self {
        Self {
            label: label.to_string(),
            axis_type: None,
        }
    }
}

/// Centres of `shape` equal-width bins spanning `range`.
pub fn bin_centers(range: &Range, shape: usize) -> Vec<f64> {
    let width = range.width() / shape as f64;
    (0..shape)
        .map(|i| range.min + (i as f64 + 0.5) * width)
        .collect()
}

/// Format an integer with comma thousands separators.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(digit);
    }
    formatted
}

/// Build the heatmap of spatial counts.
///
/// Cell values are `ln(1 + count)`. The title reports the in-viewport total for the month.
pub fn heatmap(
    counts: &SpatialCounts,
    limits: &Limits,
    filter: MonthFilter,
    x_label: &str,
    y_label: &str,
) -> Figure {
    let (nx, ny) = counts.0.dim();
    let z = counts
        .0
        .t()
        .outer_iter()
        .map(|row| row.iter().map(|&count| (count as f64).ln_1p()).collect())
        .collect();
    let month = filter.label().unwrap_or("no month");
    Figure {
        data: vec![Trace::Heatmap {
            x: bin_centers(&limits.x, nx),
            y: bin_centers(&limits.y, ny),
            z,
        }],
        layout: Layout {
            title: format!(
                "Taxi pickups for {} (total {})",
                month,
                format_thousands(counts.total())
            ),
            xaxis: Axis::labelled(x_label),
            yaxis: Axis::labelled(y_label),
        },
    }
}

/// Build the bar chart of hourly counts, zoomed region next to full region.
pub fn bar(counts: &HourlyCounts, scale: ScaleMode) -> Figure {
    let series = |name, values: &ndarray::Array1<u64>| Trace::Bar {
        name,
        x: labels::hours(),
        y: values.to_vec(),
    };
    Figure {
        data: vec![
            series(ZOOMED_SERIES, &counts.zoomed),
            series(FULL_SERIES, &counts.full),
        ],
        layout: Layout {
            title: BAR_TITLE.to_string(),
            xaxis: Axis::labelled(HOUR_AXIS_LABEL),
            yaxis: Axis {
                label: COUNT_AXIS_LABEL.to_string(),
                axis_type: Some(scale.axis_type()),
            },
        },
    }
}
