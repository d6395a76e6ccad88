//! Column-oriented pickup dataset.
//!
//! The dataset is opened once at startup and is read-only for the lifetime of the process.
//! Aggregations never materialise filtered rows: they scan the columns in fixed-size chunks,
//! fold each chunk into a partial aggregate and merge the partials.

use crate::column::{Column, DType};
use crate::error::ExplorerError;
use crate::limits::{Limits, Range};

use num_traits::AsPrimitive;
use rayon::prelude::*;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Name of the manifest file within a dataset directory.
pub const MANIFEST: &str = "manifest.json";

/// Number of bins used to estimate percentile limits.
const LIMITS_BINS: usize = 16_384;

/// Trait for spatial coordinate values.
pub trait Coordinate: Copy + Send + Sync + AsPrimitive<f64> {}

/// Blanket implementation of Coordinate.
impl<T> Coordinate for T where T: Copy + Send + Sync + AsPrimitive<f64> {}

/// Dataset manifest, read from `manifest.json`.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Number of rows in every column file
    pub rows: usize,
    /// Column descriptions
    pub columns: Vec<ColumnSpec>,
}

/// Description of a single column file.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: DType,
    /// Path of the raw column file, relative to the dataset directory
    pub path: PathBuf,
}

impl Manifest {
    fn column(&self, name: &str) -> Result<&ColumnSpec, ExplorerError> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .ok_or_else(|| ExplorerError::ColumnMissing {
                name: name.to_string(),
            })
    }
}

/// Which columns to load, and how many rows.
#[derive(Clone, Debug)]
pub struct DatasetOptions {
    pub x_column: String,
    pub y_column: String,
    pub time_column: String,
    pub row_limit: Option<usize>,
}

/// How a scan walks the dataset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanOptions {
    /// Rows per chunk
    pub chunk_size: usize,
    /// Whether chunks are folded in parallel on the rayon pool
    pub parallel: bool,
}

/// Spatial coordinate columns. Both axes share a data type.
#[derive(Clone, Debug, PartialEq)]
pub enum Coordinates {
    Float32 { x: Vec<f32>, y: Vec<f32> },
    Float64 { x: Vec<f64>, y: Vec<f64> },
}

/// A spatial axis of the dataset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpatialAxis {
    X,
    Y,
}

/// Borrowed, row-aligned view of the columns used by aggregations.
///
/// A view may cover the whole dataset or a single chunk of it.
#[derive(Clone, Copy, Debug)]
pub struct Columns<'a, T> {
    pub x: &'a [T],
    pub y: &'a [T],
    pub timestamps: &'a [i64],
}

impl<'a, T: Coordinate> Columns<'a, T> {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Values of one spatial axis.
    pub fn axis(&self, axis: SpatialAxis) -> &'a [T] {
        match axis {
            SpatialAxis::X => self.x,
            SpatialAxis::Y => self.y,
        }
    }

    /// Iterate over consecutive chunks of at most `size` rows.
    pub fn chunks(self, size: usize) -> impl Iterator<Item = Columns<'a, T>> {
        let size = size.max(1);
        self.x
            .chunks(size)
            .zip(self.y.chunks(size))
            .zip(self.timestamps.chunks(size))
            .map(|((x, y), timestamps)| Columns { x, y, timestamps })
    }

    /// Parallel iterator over consecutive chunks of at most `size` rows.
    pub fn par_chunks(self, size: usize) -> impl IndexedParallelIterator<Item = Columns<'a, T>> {
        let size = size.max(1);
        self.x
            .par_chunks(size)
            .zip(self.y.par_chunks(size))
            .zip(self.timestamps.par_chunks(size))
            .map(|((x, y), timestamps)| Columns { x, y, timestamps })
    }

    /// Fold every chunk into a partial aggregate and merge the partials.
    ///
    /// `merge` must be associative and commutative for the result to be independent of chunk
    /// size, worker count and completion order.
    ///
    /// # Arguments
    ///
    /// * `options`: Chunk size and parallelism
    /// * `init`: Creates an empty partial aggregate
    /// * `fold`: Adds one chunk to a partial aggregate
    /// * `merge`: Combines two partial aggregates
    pub fn fold_chunks<A, I, F, M>(self, options: &ScanOptions, init: I, fold: F, merge: M) -> A
    where
        A: Send,
        I: Fn() -> A + Send + Sync,
        F: Fn(A, Columns<'a, T>) -> A + Send + Sync,
        M: Fn(A, A) -> A + Send + Sync,
    {
        if options.parallel {
            self.par_chunks(options.chunk_size)
                .fold(&init, &fold)
                .reduce_with(&merge)
                .unwrap_or_else(&init)
        } else {
            self.chunks(options.chunk_size).fold(init(), fold)
        }
    }
}

/// Merge two flat count buffers by element-wise addition.
pub fn merge_counts(mut a: Vec<u64>, b: Vec<u64>) -> Vec<u64> {
    a.iter_mut().zip(b).for_each(|(a, b)| *a += b);
    a
}

/// Trait for computations over the dataset columns.
///
/// This provides an entry point into the type system based on the runtime coordinate data type.
pub trait ColumnsVisitor {
    type Output;

    fn visit<T: Coordinate>(self, columns: Columns<'_, T>) -> Self::Output;
}

/// The pickup dataset.
#[derive(Debug)]
pub struct Dataset {
    x_name: String,
    y_name: String,
    time_name: String,
    coordinates: Coordinates,
    timestamps: Vec<i64>,
}

impl Dataset {
    /// Open a dataset directory.
    ///
    /// Reads `manifest.json` and then at most `row_limit` rows of the spatial and time columns.
    #[tracing::instrument(level = "INFO", skip(options))]
    pub fn open(dir: &Path, options: &DatasetOptions) -> Result<Self, ExplorerError> {
        let manifest_path = dir.join(MANIFEST);
        let file = File::open(&manifest_path).map_err(|source| ExplorerError::DatasetIo {
            path: manifest_path.display().to_string(),
            source,
        })?;
        let manifest: Manifest = serde_json::from_reader(BufReader::new(file))?;
        let rows = options
            .row_limit
            .map_or(manifest.rows, |limit| limit.min(manifest.rows));
        let read = |name: &str| -> Result<Column, ExplorerError> {
            let spec = manifest.column(name)?;
            Column::read(&dir.join(&spec.path), name, spec.dtype, rows)
        };
        let x = read(&options.x_column)?;
        let y = read(&options.y_column)?;
        let time = read(&options.time_column)?;
        tracing::info!("Loaded {} of {} rows from {}", rows, manifest.rows, dir.display());
        Self::from_columns(
            &options.x_column,
            &options.y_column,
            &options.time_column,
            x,
            y,
            time,
        )
    }

    /// Build a dataset from in-memory columns.
    ///
    /// The spatial columns must share a floating point type, the time column must hold `int64`
    /// seconds since the Unix epoch, and all columns must have the same length.
    pub fn from_columns(
        x_name: &str,
        y_name: &str,
        time_name: &str,
        x: Column,
        y: Column,
        time: Column,
    ) -> Result<Self, ExplorerError> {
        let timestamps = match time {
            Column::Int64(timestamps) => timestamps,
            other => {
                return Err(ExplorerError::ColumnType {
                    name: time_name.to_string(),
                    expected: DType::Int64.into(),
                    found: other.dtype(),
                })
            }
        };
        let rows = timestamps.len();
        for (name, column) in [(x_name, &x), (y_name, &y)] {
            if column.len() != rows {
                return Err(ExplorerError::ColumnLength {
                    name: name.to_string(),
                    expected: rows,
                    found: column.len(),
                });
            }
        }
        let coordinates = match (x, y) {
            (Column::Float32(x), Column::Float32(y)) => Coordinates::Float32 { x, y },
            (Column::Float64(x), Column::Float64(y)) => Coordinates::Float64 { x, y },
            (Column::Int64(_), _) => {
                return Err(ExplorerError::ColumnType {
                    name: x_name.to_string(),
                    expected: "float32 or float64",
                    found: DType::Int64,
                })
            }
            (x, y) => {
                return Err(ExplorerError::ColumnType {
                    name: y_name.to_string(),
                    expected: x.dtype().into(),
                    found: y.dtype(),
                })
            }
        };
        Ok(Self {
            x_name: x_name.to_string(),
            y_name: y_name.to_string(),
            time_name: time_name.to_string(),
            coordinates,
            timestamps,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn x_name(&self) -> &str {
        &self.x_name
    }

    pub fn y_name(&self) -> &str {
        &self.y_name
    }

    pub fn time_name(&self) -> &str {
        &self.time_name
    }

    /// Run a computation over the columns, dispatching on the coordinate data type.
    pub fn scan<V: ColumnsVisitor>(&self, visitor: V) -> V::Output {
        match &self.coordinates {
            Coordinates::Float32 { x, y } => visitor.visit(Columns {
                x,
                y,
                timestamps: &self.timestamps,
            }),
            Coordinates::Float64 { x, y } => visitor.visit(Columns {
                x,
                y,
                timestamps: &self.timestamps,
            }),
        }
    }

    /// Estimate the central `percentage` mass range of both spatial columns.
    ///
    /// Non-finite values are ignored. For example, a percentage of 96 returns the 2nd and 98th
    /// percentiles of each column.
    #[tracing::instrument(level = "DEBUG", skip(self))]
    pub fn limits(
        &self,
        percentage: f64,
        options: &ScanOptions,
    ) -> Result<Limits, ExplorerError> {
        self.scan(PercentileLimits {
            percentage,
            options: *options,
        })
    }
}

/// Percentile limits estimation for both spatial axes.
struct PercentileLimits {
    percentage: f64,
    options: ScanOptions,
}

impl ColumnsVisitor for PercentileLimits {
    type Output = Result<Limits, ExplorerError>;

    fn visit<T: Coordinate>(self, columns: Columns<'_, T>) -> Self::Output {
        let x = percentile_range(columns, SpatialAxis::X, self.percentage, &self.options)?;
        let y = percentile_range(columns, SpatialAxis::Y, self.percentage, &self.options)?;
        Ok(Limits::new(x, y))
    }
}

fn merge_bounds(a: Option<Range>, b: Option<Range>) -> Option<Range> {
    match (a, b) {
        (Some(a), Some(b)) => Some(Range::new(a.min.min(b.min), a.max.max(b.max))),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Estimate a central percentile range of one axis.
///
/// A first pass finds the finite minimum and maximum. A second pass builds a fine histogram over
/// that interval, from which both quantiles are interpolated.
fn percentile_range<T: Coordinate>(
    columns: Columns<'_, T>,
    axis: SpatialAxis,
    percentage: f64,
    options: &ScanOptions,
) -> Result<Range, ExplorerError> {
    let bounds = columns.fold_chunks(
        options,
        || None,
        |bounds, chunk| {
            chunk
                .axis(axis)
                .iter()
                .map(|value| value.as_())
                .filter(|value: &f64| value.is_finite())
                .fold(bounds, |bounds, value| {
                    merge_bounds(bounds, Some(Range::new(value, value)))
                })
        },
        merge_bounds,
    );
    let Some(bounds) = bounds else {
        return Err(ExplorerError::EmptyDataset);
    };
    if !bounds.is_proper() {
        return Ok(bounds);
    }

    let bin_width = bounds.width() / LIMITS_BINS as f64;
    let counts = columns.fold_chunks(
        options,
        || vec![0_u64; LIMITS_BINS],
        |mut counts, chunk| {
            for value in chunk.axis(axis) {
                let value: f64 = value.as_();
                if value.is_finite() {
                    let index = ((value - bounds.min) / bin_width) as usize;
                    counts[index.min(LIMITS_BINS - 1)] += 1;
                }
            }
            counts
        },
        merge_counts,
    );
    let total: u64 = counts.iter().sum();
    let tail = (1.0 - percentage / 100.0) / 2.0;
    Ok(Range::new(
        quantile(&counts, total, tail, bounds.min, bin_width),
        quantile(&counts, total, 1.0 - tail, bounds.min, bin_width),
    ))
}

/// Interpolate the quantile `q` from histogram counts.
fn quantile(counts: &[u64], total: u64, q: f64, min: f64, bin_width: f64) -> f64 {
    let target = q * total as f64;
    let mut cumulative = 0_u64;
    for (index, &count) in counts.iter().enumerate() {
        let next = cumulative + count;
        if count > 0 && next as f64 >= target {
            let fraction = (target - cumulative as f64) / count as f64;
            return min + (index as f64 + fraction.clamp(0.0, 1.0)) * bin_width;
        }
        cumulative = next;
    }
    min + counts.len() as f64 * bin_width
}
