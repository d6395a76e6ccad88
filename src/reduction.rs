//! Reduction of a [Histogram3D] into the counts consumed by the two views.

use crate::binning::Histogram3D;

use ndarray::{Array1, Array2, Axis};

/// Counts per regular spatial bin, summed over hours. Shape is `(shape, shape)`.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialCounts(pub Array2<u64>);

/// Counts per hour of day.
#[derive(Clone, Debug, PartialEq)]
pub struct HourlyCounts {
    /// Records inside the spatial viewport
    pub zoomed: Array1<u64>,
    /// Every record passing the filter, wherever it lies
    pub full: Array1<u64>,
}

impl SpatialCounts {
    pub fn total(&self) -> u64 {
        self.0.sum()
    }
}

/// Reduce a histogram to spatial and hourly counts.
pub fn reduce(histogram: &Histogram3D) -> (SpatialCounts, HourlyCounts) {
    let [x_axis, y_axis, hour_axis] = *histogram.axes();
    let counts = histogram.counts();

    let mut spatial = counts.sum_axis(Axis(2));
    spatial.slice_axis_inplace(Axis(0), x_axis.regular());
    spatial.slice_axis_inplace(Axis(1), y_axis.regular());

    let mut viewport = counts;
    viewport.slice_axis_inplace(Axis(0), x_axis.regular());
    viewport.slice_axis_inplace(Axis(1), y_axis.regular());
    let mut zoomed = viewport.sum_axis(Axis(0)).sum_axis(Axis(0));
    zoomed.slice_axis_inplace(Axis(0), hour_axis.regular());

    let mut full = counts.sum_axis(Axis(0)).sum_axis(Axis(0));
    full.slice_axis_inplace(Axis(0), hour_axis.regular());

    (
        SpatialCounts(spatial.to_owned()),
        HourlyCounts {
            zoomed: zoomed.to_owned(),
            full: full.to_owned(),
        },
    )
}
