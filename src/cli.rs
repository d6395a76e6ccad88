//! Command Line Interface (CLI) arguments.

use crate::error::ExplorerError;

use byte_unit::Byte;
use clap::Parser;
use std::path::PathBuf;

/// Pickup explorer command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "PICKUP_EXPLORER_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8080, env = "PICKUP_EXPLORER_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "PICKUP_EXPLORER_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/pickup-explorer/certs/cert.pem",
        env = "PICKUP_EXPLORER_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/pickup-explorer/certs/key.pem",
        env = "PICKUP_EXPLORER_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for requests to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "PICKUP_EXPLORER_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Directory containing the dataset manifest and column files
    #[arg(long, env = "PICKUP_EXPLORER_DATA_DIR")]
    pub data_dir: PathBuf,
    /// Column holding the spatial x coordinate
    #[arg(long, default_value = "pickup_longitude", env = "PICKUP_EXPLORER_X_COLUMN")]
    pub x_column: String,
    /// Column holding the spatial y coordinate
    #[arg(long, default_value = "pickup_latitude", env = "PICKUP_EXPLORER_Y_COLUMN")]
    pub y_column: String,
    /// Column holding the pickup time in seconds since the Unix epoch
    #[arg(long, default_value = "pickup_datetime", env = "PICKUP_EXPLORER_TIME_COLUMN")]
    pub time_column: String,
    /// Maximum number of rows to load from the dataset
    #[arg(long, env = "PICKUP_EXPLORER_ROW_LIMIT")]
    pub row_limit: Option<usize>,
    /// Number of regular bins on each spatial axis
    #[arg(long, default_value_t = 256, env = "PICKUP_EXPLORER_SHAPE")]
    pub shape: usize,
    /// Central mass of the spatial columns covered by the default limits, in percent
    #[arg(long, default_value_t = 96.0, env = "PICKUP_EXPLORER_LIMITS_PERCENTAGE")]
    pub limits_percentage: f64,
    /// Number of rows per scan chunk
    #[arg(long, default_value_t = 1_048_576, env = "PICKUP_EXPLORER_CHUNK_SIZE")]
    pub chunk_size: usize,
    /// Whether to use Rayon for execution of CPU-bound tasks.
    #[arg(long, default_value_t = false, env = "PICKUP_EXPLORER_USE_RAYON")]
    pub use_rayon: bool,
    /// Maximum number of threads to use for CPU-bound tasks.
    /// Defaults to one less than the number of CPUs.
    #[arg(long, env = "PICKUP_EXPLORER_THREAD_LIMIT")]
    pub thread_limit: Option<usize>,
    /// Memory limit for histograms of in-flight aggregations, e.g. `2GiB`.
    #[arg(long, value_parser = parse_memory_limit, env = "PICKUP_EXPLORER_MEMORY_LIMIT")]
    pub memory_limit: Option<usize>,
}

impl CommandLineArgs {
    /// Check values that clap cannot check on its own.
    pub fn validate(&self) -> Result<(), ExplorerError> {
        let invalid = |reason: &str| {
            Err(ExplorerError::InvalidConfiguration {
                reason: reason.to_string(),
            })
        };
        if self.shape == 0 {
            return invalid("shape must be greater than 0");
        }
        if self.chunk_size == 0 {
            return invalid("chunk size must be greater than 0");
        }
        if !(self.limits_percentage > 0.0 && self.limits_percentage <= 100.0) {
            return invalid("limits percentage must be in the range (0, 100]");
        }
        if self.thread_limit == Some(0) {
            return invalid("thread limit must be greater than 0");
        }
        Ok(())
    }
}

/// Parse a human-readable byte size.
fn parse_memory_limit(value: &str) -> Result<usize, String> {
    let bytes = Byte::parse_str(value, true).map_err(|err| err.to_string())?;
    usize::try_from(bytes.as_u64()).map_err(|err| err.to_string())
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
