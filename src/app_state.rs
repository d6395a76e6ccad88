use crate::binning::{histogram_bytes, BinningConfig};
use crate::cli::CommandLineArgs;
use crate::dataset::{Dataset, DatasetOptions, ScanOptions};
use crate::error::ExplorerError;
use crate::pipeline::{Context, Pipeline};
use crate::resource_manager::ResourceManager;

use std::sync::Arc;

/// Shared application state passed to each request handler.
#[derive(Debug)]
pub struct AppState {
    /// Command line arguments.
    pub args: CommandLineArgs,

    /// Resource manager.
    pub resource_manager: ResourceManager,

    /// Reactive aggregation pipeline.
    pub pipeline: Pipeline,

    /// Histogram memory held by one aggregation, in bytes.
    pub aggregation_bytes: usize,
}

impl AppState {
    /// Load the dataset, estimate the default limits and compute the initial state.
    pub fn new(args: &CommandLineArgs) -> Result<Self, ExplorerError> {
        aggregation_bytes(args)?;
        let options = DatasetOptions {
            x_column: args.x_column.clone(),
            y_column: args.y_column.clone(),
            time_column: args.time_column.clone(),
            row_limit: args.row_limit,
        };
        let dataset = Arc::new(Dataset::open(&args.data_dir, &options)?);
        let context = Context::new(dataset, args.limits_percentage, binning_config(args))?;
        let pipeline = Pipeline::new(context)?;
        Self::with_pipeline(args, pipeline)
    }

    /// Create and return an [AppState] around an existing pipeline.
    pub fn with_pipeline(
        args: &CommandLineArgs,
        pipeline: Pipeline,
    ) -> Result<Self, ExplorerError> {
        let aggregation_bytes = aggregation_bytes(args)?;
        let task_limit = args.thread_limit.or_else(|| Some(default_thread_limit()));
        let resource_manager = ResourceManager::new(args.memory_limit, task_limit);

        Ok(Self {
            args: args.clone(),
            resource_manager,
            pipeline,
            aggregation_bytes,
        })
    }
}

/// Histogram memory held by one aggregation, checked against the memory limit.
///
/// Each scan worker holds its own histogram.
fn aggregation_bytes(args: &CommandLineArgs) -> Result<usize, ExplorerError> {
    let workers = if args.use_rayon {
        rayon::current_num_threads()
    } else {
        1
    };
    let bytes = histogram_bytes(args.shape) * workers;
    match args.memory_limit {
        Some(limit) if limit < bytes => Err(ExplorerError::InvalidConfiguration {
            reason: format!(
                "memory limit of {} bytes is below the {} bytes needed by one aggregation",
                limit, bytes
            ),
        }),
        _ => Ok(bytes),
    }
}

/// Binning configuration from command line arguments.
pub fn binning_config(args: &CommandLineArgs) -> BinningConfig {
    BinningConfig {
        shape: args.shape,
        scan: ScanOptions {
            chunk_size: args.chunk_size,
            parallel: args.use_rayon,
        },
    }
}

/// One less than the number of CPUs, and at least one.
pub fn default_thread_limit() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// AppState wrapped in an Atomic Reference Count (Arc) to allow multiple references.
pub type SharedAppState = Arc<AppState>;
