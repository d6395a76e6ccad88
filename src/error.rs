//! Error handling.

use axum::{
    extract::rejection::JsonRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ndarray::ShapeError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tokio::sync::AcquireError;
use tokio::task::JoinError;
use tracing::{event, Level};

use crate::column::DType;

/// Pickup explorer error type
///
/// Dataset and configuration errors are only produced at startup. Request errors are produced
/// at the HTTP boundary. Aggregation only fails on internal
/// shape errors or when a worker task is lost.
#[derive(Debug, Error)]
pub enum ExplorerError {
    /// A required column is absent from the dataset manifest
    #[error("column {name} not found in dataset")]
    ColumnMissing { name: String },

    /// Column has a different number of rows to the rest of the dataset
    #[error("column {name} has {found} rows, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Column data type cannot be used for its role
    #[error("column {name} has data type {found}, expected {expected}")]
    ColumnType {
        name: String,
        expected: &'static str,
        found: DType,
    },

    /// Error reading a dataset file
    #[error("failed to read dataset file {path}")]
    DatasetIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Dataset has no usable spatial values
    #[error("cannot compute limits of an empty dataset")]
    EmptyDataset,

    /// Invalid startup configuration
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// Insufficient memory to process request
    #[error("Insufficient memory to process request ({requested} > {total})")]
    InsufficientMemory { requested: usize, total: usize },

    /// Error parsing the dataset manifest
    #[error("dataset manifest is not valid")]
    Manifest(#[from] serde_json::Error),

    /// Error deserialising request data
    #[error("request data is not valid")]
    RequestDataJsonRejection(#[from] JsonRejection),

    /// Error validating request data
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),

    /// Error acquiring a semaphore
    #[error("error acquiring resources")]
    SemaphoreAcquireError(#[from] AcquireError),

    /// Error creating an ndarray array from a shape
    #[error("failed to create array from shape")]
    ShapeInvalid(#[from] ShapeError),

    /// Background aggregation task failed to complete
    #[error("aggregation task failed")]
    TaskJoin(#[from] JoinError),

    /// Error converting between integer types
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),
}

impl IntoResponse for ExplorerError {
    /// Convert from an `ExplorerError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Log an error and each of its sources at error level.
pub fn log_error_chain(error: &(dyn Error + 'static)) {
    event!(Level::ERROR, "{}", error);
    let mut current = error.source();
    while let Some(source) = current {
        event!(Level::ERROR, "Caused by: {}", source);
        current = source.source();
    }
}

/// Body of error response
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut causes = Vec::new();
        let mut current = error.source();
        while let Some(source) = current {
            causes.push(source.to_string());
            current = source.source();
        }
        causes.dedup();
        let caused_by = if causes.is_empty() { None } else { Some(causes) };
        ErrorBody { message, caused_by }
    }
}

/// A response to send in error cases
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<ExplorerError> for ErrorResponse {
    /// Convert from an `ExplorerError` into an `ErrorResponse`.
    fn from(error: ExplorerError) -> Self {
        let response = match &error {
            // Bad request
            ExplorerError::RequestDataJsonRejection(_)
            | ExplorerError::RequestDataValidation(_) => Self::bad_request(&error),

            // Internal server error
            ExplorerError::ColumnMissing { .. }
            | ExplorerError::ColumnLength { .. }
            | ExplorerError::ColumnType { .. }
            | ExplorerError::DatasetIo { .. }
            | ExplorerError::EmptyDataset
            | ExplorerError::InvalidConfiguration { .. }
            | ExplorerError::InsufficientMemory { .. }
            | ExplorerError::Manifest(_)
            | ExplorerError::SemaphoreAcquireError(_)
            | ExplorerError::ShapeInvalid(_)
            | ExplorerError::TaskJoin(_)
            | ExplorerError::TryFromInt(_) => Self::internal_server_error(&error),
        };

        if response.status.is_server_error() {
            log_error_chain(&error);
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}
