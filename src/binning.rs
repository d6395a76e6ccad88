//! Binning engine: 3-D histogram of (x, y, hour) counts over the filtered dataset.

use crate::dataset::{merge_counts, Columns, ColumnsVisitor, Coordinate, Dataset, ScanOptions};
use crate::derived;
use crate::error::ExplorerError;
use crate::labels::HOURS;
use crate::limits::{Limits, Range};
use crate::metrics::BINNING_DURATION;
use crate::models::MonthFilter;

use ndarray::{s, Array3, ArrayView3, Slice};

/// Binning engine configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinningConfig {
    /// Number of regular bins on each spatial axis
    pub shape: usize,
    /// How the dataset is scanned
    pub scan: ScanOptions,
}

/// Layout of one histogram axis: `edges` bins on each side of `bins` regular bins.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinAxis {
    pub bins: usize,
    pub edges: usize,
}

impl BinAxis {
    /// A spatial axis, with one below-range and one above-range bin.
    pub fn spatial(bins: usize) -> Self {
        Self { bins, edges: 1 }
    }

    /// The hour axis. Hours are bounded so there are no edge bins.
    pub fn hour() -> Self {
        Self {
            bins: HOURS,
            edges: 0,
        }
    }

    /// Total number of bins, edges included.
    pub fn len(&self) -> usize {
        self.bins + 2 * self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slice selecting the regular bins.
    pub fn regular(&self) -> Slice {
        Slice::from(self.edges..self.edges + self.bins)
    }
}

/// Histogram counts indexed by (x bin, y bin, hour bin).
///
/// Bin 0 of a spatial axis counts values below the range, or NaN. The last bin counts values at or
/// above the range maximum.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram3D {
    counts: Array3<u64>,
    axes: [BinAxis; 3],
    limits: Limits,
}

impl Histogram3D {
    /// An all-zero histogram.
    pub fn zeros(shape: usize, limits: Limits) -> Self {
        let axes = axes(shape);
        Self {
            counts: Array3::zeros((axes[0].len(), axes[1].len(), axes[2].len())),
            axes,
            limits,
        }
    }

    pub fn counts(&self) -> ArrayView3<'_, u64> {
        self.counts.view()
    }

    pub fn axes(&self) -> &[BinAxis; 3] {
        &self.axes
    }

    /// Limits the spatial bins were computed for.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Sum over every bin, edges included.
    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    /// Sum over the regular bins of every axis.
    pub fn in_range(&self) -> u64 {
        self.counts
            .slice(s![self.axes[0].regular(), self.axes[1].regular(), self.axes[2].regular()])
            .sum()
    }
}

fn axes(shape: usize) -> [BinAxis; 3] {
    [BinAxis::spatial(shape), BinAxis::spatial(shape), BinAxis::hour()]
}

/// Memory held by a histogram with `shape` regular bins per spatial axis, in bytes.
///
/// Each scan worker holds one such buffer while counting.
pub fn histogram_bytes(shape: usize) -> usize {
    axes(shape).iter().map(BinAxis::len).product::<usize>() * std::mem::size_of::<u64>()
}

/// Maps values of one spatial axis to bin indices, edge bins included.
#[derive(Clone, Copy, Debug)]
struct AxisBinner {
    min: f64,
    max: f64,
    scale: f64,
    bins: usize,
    proper: bool,
}

impl AxisBinner {
    fn new(range: &Range, bins: usize) -> Self {
        Self {
            min: range.min,
            max: range.max,
            scale: bins as f64 / range.width(),
            bins,
            proper: range.is_proper(),
        }
    }

    /// Bin index of a value.
    ///
    /// NaN goes to the lower edge. When the range cannot hold regular bins, every other value goes
    /// to an edge.
    #[inline]
    fn index(&self, value: f64) -> usize {
        if value.is_nan() || value < self.min {
            0
        } else if !self.proper || value >= self.max {
            self.bins + 1
        } else {
            (((value - self.min) * self.scale) as usize).min(self.bins - 1) + 1
        }
    }
}

/// Per-chunk counting into a flat C-order buffer.
struct Binning {
    filter: MonthFilter,
    x: AxisBinner,
    y: AxisBinner,
    /// Length of the flattened histogram
    len: usize,
    scan: ScanOptions,
}

impl Binning {
    fn count_chunk<T: Coordinate>(&self, counts: &mut [u64], chunk: Columns<'_, T>) {
        let y_stride = HOURS;
        let x_stride = (self.y.bins + 2) * y_stride;
        let rows = chunk.x.iter().zip(chunk.y).zip(chunk.timestamps);
        for ((x, y), &timestamp) in rows {
            if !self.filter.matches(timestamp) {
                continue;
            }
            let index = self.x.index(x.as_()) * x_stride
                + self.y.index(y.as_()) * y_stride
                + derived::hour(timestamp);
            counts[index] += 1;
        }
    }
}

impl ColumnsVisitor for Binning {
    type Output = Vec<u64>;

    fn visit<T: Coordinate>(self, columns: Columns<'_, T>) -> Vec<u64> {
        columns.fold_chunks(
            &self.scan,
            || vec![0; self.len],
            |mut counts, chunk| {
                self.count_chunk(&mut counts, chunk);
                counts
            },
            merge_counts,
        )
    }
}

/// Compute the (x, y, hour) histogram of the records passing `filter`.
///
/// The dataset is scanned in chunks. Chunk counts are merged by integer addition, so the result
/// does not depend on chunk size or parallelism. A filter that matches nothing yields an all-zero
/// histogram.
///
/// # Arguments
///
/// * `dataset`: Dataset to scan
/// * `filter`: Month filter
/// * `limits`: Ranges of the regular bins on the spatial axes
/// * `config`: Binning configuration
#[tracing::instrument(level = "DEBUG", skip(dataset, config), fields(shape = config.shape))]
pub fn bin(
    dataset: &Dataset,
    filter: MonthFilter,
    limits: &Limits,
    config: &BinningConfig,
) -> Result<Histogram3D, ExplorerError> {
    let _timer = BINNING_DURATION.start_timer();
    let axes = axes(config.shape);
    let shape = (axes[0].len(), axes[1].len(), axes[2].len());
    let binning = Binning {
        filter,
        x: AxisBinner::new(&limits.x, config.shape),
        y: AxisBinner::new(&limits.y, config.shape),
        len: shape.0 * shape.1 * shape.2,
        scan: config.scan,
    };
    let counts = Array3::from_shape_vec(shape, dataset.scan(binning))?;
    let histogram = Histogram3D {
        counts,
        axes,
        limits: *limits,
    };
    tracing::debug!(
        "Binned {} records, {} in range",
        histogram.total(),
        histogram.in_range()
    );
    Ok(histogram)
}
