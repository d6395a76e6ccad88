//! This crate provides a server for interactively exploring millions of geolocated, timestamped
//! taxi pickups through two linked views: a spatial heatmap and an hourly bar chart.
//!
//! Both views are derived from a 3-D histogram of pickups over (longitude, latitude, hour of
//! day), computed over the whole dataset restricted to a month and a zoomed viewport. The
//! histogram is built by a chunked, optionally parallel scan, so dataset size is decoupled from
//! the memory needed for aggregation.
//!
//! Interactions flow through a reactive graph of memoized nodes (see [pipeline]):
//!
//! * [limits] resolves the active viewport from a render event or the default limits
//! * [binning] computes the histogram, including out-of-range edge bins
//! * [reduction] collapses the histogram into spatial and hourly counts
//! * [chart] builds Plotly-compatible figures from the counts
//!
//! A node recomputes only when its inputs change, so toggling the bar chart scale never rescans
//! the dataset. Overlapping interactions are ordered when accepted and their results are applied
//! in that order.
//!
//! The server is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built on top of the hyper HTTP library.
//! * [Serde](serde) performs (de)serialisation of JSON request and response data.
//! * [ndarray] provides n-dimensional arrays for the histogram reductions.
//! * [Rayon](rayon) scans dataset chunks in parallel.

pub mod app;
pub mod app_state;
pub mod binning;
pub mod chart;
pub mod cli;
pub mod column;
pub mod dataset;
pub mod derived;
pub mod error;
pub mod labels;
pub mod limits;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod reactive;
pub mod reduction;
pub mod resource_manager;
pub mod server;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod validated_json;
