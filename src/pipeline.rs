//! The reactive aggregation pipeline.
//!
//! Four memoized nodes are evaluated in dependency order for each interaction:
//!
//! * `limits` from the viewport event
//! * `counts` from the month filter and the limits, running the binning engine and the reduction
//! * `heatmap` from the counts, the limits and the month filter
//! * `bar` from the counts and the scale mode
//!
//! A node recomputes only when its own inputs change. Toggling the scale mode therefore rebuilds
//! the bar chart alone.

use crate::binning::{self, BinningConfig};
use crate::chart::{self, Figure};
use crate::dataset::Dataset;
use crate::error::ExplorerError;
use crate::limits::{self, Limits, ViewportEvent};
use crate::models::{MonthFilter, ScaleMode, UpdateRequest};
use crate::reactive::{Node, Sequence, Shared};
use crate::reduction::{self, HourlyCounts, SpatialCounts};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Read-only state shared by every interaction.
#[derive(Debug)]
pub struct Context {
    pub dataset: Arc<Dataset>,
    /// Limits used when no user zoom applies
    pub default_limits: Limits,
    pub binning: BinningConfig,
}

impl Context {
    /// Create a context, estimating the default limits from the dataset.
    ///
    /// # Arguments
    ///
    /// * `dataset`: The dataset
    /// * `percentage`: Central mass of the spatial columns covered by the default limits
    /// * `binning`: Binning configuration
    pub fn new(
        dataset: Arc<Dataset>,
        percentage: f64,
        binning: BinningConfig,
    ) -> Result<Self, ExplorerError> {
        let default_limits = dataset.limits(percentage, &binning.scan)?;
        tracing::info!(
            "Default limits for {}% of {} rows: {:?}",
            percentage,
            dataset.len(),
            default_limits.to_array()
        );
        Ok(Self::with_limits(dataset, default_limits, binning))
    }

    pub fn with_limits(
        dataset: Arc<Dataset>,
        default_limits: Limits,
        binning: BinningConfig,
    ) -> Self {
        Self {
            dataset,
            default_limits,
            binning,
        }
    }
}

/// Reduced counts for one (filter, limits) pair.
#[derive(Debug, PartialEq)]
pub struct Aggregation {
    pub spatial: SpatialCounts,
    pub hourly: HourlyCounts,
    /// Records passing the filter
    pub total: u64,
}

type CountsInput = (MonthFilter, Limits);
type HeatmapInput = (Shared<Aggregation>, Limits, MonthFilter);
type BarInput = (Shared<Aggregation>, ScaleMode);

/// Result of an interaction.
#[derive(Clone, Debug)]
pub struct Update {
    pub sequence: Sequence,
    pub filter: MonthFilter,
    pub limits: Limits,
    pub scale: ScaleMode,
    pub aggregation: Arc<Aggregation>,
    pub heatmap: Arc<Figure>,
    pub bar: Arc<Figure>,
}

/// The reactive state graph.
#[derive(Debug)]
pub struct Pipeline {
    context: Context,
    sequence: AtomicU64,
    limits: Node<ViewportEvent, Limits>,
    counts: Node<CountsInput, Aggregation>,
    heatmap: Node<HeatmapInput, Figure>,
    bar: Node<BarInput, Figure>,
}

impl Pipeline {
    /// Create the pipeline and compute the initial state: default limits, every month, linear
    /// scale.
    pub fn new(context: Context) -> Result<Self, ExplorerError> {
        let pipeline = Self {
            context,
            sequence: AtomicU64::new(0),
            limits: Node::new("limits"),
            counts: Node::new("counts"),
            heatmap: Node::new("heatmap"),
            bar: Node::new("bar"),
        };
        let sequence = pipeline.next_sequence();
        pipeline.apply(
            sequence,
            &ViewportEvent::NoOverride,
            MonthFilter::ALL,
            ScaleMode::Linear,
        )?;
        Ok(pipeline)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Accept a new interaction, returning its position in request order.
    pub fn next_sequence(&self) -> Sequence {
        Sequence::new(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Accept and apply an update request.
    pub fn update(&self, request: &UpdateRequest) -> Result<Update, ExplorerError> {
        let sequence = self.next_sequence();
        let event = ViewportEvent::from_relayout(request.relayout_data.as_ref());
        self.apply(sequence, &event, request.filter(), request.yaxis_type)
    }

    /// Propagate an accepted interaction through the graph.
    ///
    /// Returns the result for these inputs even if a later interaction has superseded it, in
    /// which case the nodes keep the later state.
    pub fn apply(
        &self,
        sequence: Sequence,
        event: &ViewportEvent,
        filter: MonthFilter,
        scale: ScaleMode,
    ) -> Result<Update, ExplorerError> {
        self.apply_with(sequence, event, filter, scale, || Ok(()))
    }

    /// As [Pipeline::apply], calling `reserve` before the dataset is scanned.
    ///
    /// `reserve` runs only when the counts must be recomputed, and its result is held until the
    /// scan completes. Interactions answered from cached counts never call it.
    #[tracing::instrument(
        level = "DEBUG",
        skip(self, reserve),
        fields(sequence = sequence.get())
    )]
    pub fn apply_with<R, F>(
        &self,
        sequence: Sequence,
        event: &ViewportEvent,
        filter: MonthFilter,
        scale: ScaleMode,
        reserve: F,
    ) -> Result<Update, ExplorerError>
    where
        F: FnOnce() -> Result<R, ExplorerError>,
    {
        let context = &self.context;
        let limits = self.limits.get_or_compute(sequence, event, |event| {
            Ok::<_, ExplorerError>(limits::resolve(event, &context.default_limits))
        })?;

        let aggregation =
            self.counts
                .get_or_compute(sequence, &(filter, *limits), |(filter, limits)| {
                    let _reservation = reserve()?;
                    aggregate(context, *filter, limits)
                })?;

        let heatmap_input = (Shared(Arc::clone(&aggregation)), *limits, filter);
        let heatmap = self.heatmap.get_or_compute(
            sequence,
            &heatmap_input,
            |(aggregation, limits, filter)| {
                Ok::<_, ExplorerError>(chart::heatmap(
                    &aggregation.spatial,
                    limits,
                    *filter,
                    context.dataset.x_name(),
                    context.dataset.y_name(),
                ))
            },
        )?;

        let bar_input = (Shared(Arc::clone(&aggregation)), scale);
        let bar = self
            .bar
            .get_or_compute(sequence, &bar_input, |(aggregation, scale)| {
                Ok::<_, ExplorerError>(chart::bar(&aggregation.hourly, *scale))
            })?;

        Ok(Update {
            sequence,
            filter,
            limits: *limits,
            scale,
            aggregation,
            heatmap,
            bar,
        })
    }

    /// The observable state: the figures currently held by the graph and their inputs.
    pub fn current(&self) -> Option<Update> {
        let ((aggregation, limits, filter), heatmap, heatmap_sequence) = self.heatmap.current()?;
        let ((_, scale), bar, bar_sequence) = self.bar.current()?;
        Some(Update {
            sequence: heatmap_sequence.max(bar_sequence),
            filter,
            limits,
            scale,
            aggregation: aggregation.0,
            heatmap,
            bar,
        })
    }
}

/// Bin the dataset and reduce the histogram.
fn aggregate(
    context: &Context,
    filter: MonthFilter,
    limits: &Limits,
) -> Result<Aggregation, ExplorerError> {
    let histogram = binning::bin(&context.dataset, filter, limits, &context.binning)?;
    let (spatial, hourly) = reduction::reduce(&histogram);
    Ok(Aggregation {
        spatial,
        hourly,
        total: histogram.total(),
    })
}
