use crate::app_state::{default_thread_limit, AppState, SharedAppState};
use crate::cli::CommandLineArgs;
use crate::error::ExplorerError;
use crate::limits::ViewportEvent;
use crate::metrics;
use crate::models::{FiguresResponse, OptionsResponse, UpdateRequest};
use crate::validated_json::ValidatedJson;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower::{Layer, ServiceBuilder};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

/// Application service, with paths normalised before routing.
pub type Service = NormalizePath<Router>;

/// Initialise the application
///
/// Sizes the global rayon pool when aggregations run on it.
pub fn init(args: &CommandLineArgs) -> Result<(), ExplorerError> {
    if args.use_rayon {
        let threads = args.thread_limit.unwrap_or_else(default_thread_limit);
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("aggregation-{index}"))
            .build_global()
            .map_err(|err| ExplorerError::InvalidConfiguration {
                reason: err.to_string(),
            })?;
        tracing::info!("Using rayon pool with {} threads", threads);
    }
    Ok(())
}

/// Returns a [axum::Router] for the pickup explorer API
///
/// The router is populated with all routes as well as the following middleware:
///
/// * a [tower_http::trace::TraceLayer] for tracing requests and responses
/// * prometheus request and response metrics
fn router(state: SharedAppState) -> Router {
    fn v1(state: SharedAppState) -> Router {
        Router::new()
            .route("/figures", get(current_figures).post(update_figures))
            .route("/options", get(options))
            .layer(
                ServiceBuilder::new().layer(
                    TraceLayer::new_for_http()
                        .on_request(metrics::request_counter)
                        .on_response(metrics::record_response_metrics),
                ),
            )
            .with_state(state)
    }

    Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/v1", v1(state))
}

/// Returns a [crate::app::Service] for the pickup explorer
///
/// Loads the dataset and computes the initial state before returning.
pub fn service(args: &CommandLineArgs) -> Result<Service, ExplorerError> {
    let state = AppState::new(args)?;
    Ok(service_with_state(Arc::new(state)))
}

fn service_with_state(state: SharedAppState) -> Service {
    // Trailing slashes must be removed before routing, so the layer wraps the router.
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// Options for the month and scale controls
async fn options() -> Json<OptionsResponse> {
    Json(OptionsResponse::new())
}

/// The figures currently held by the pipeline
async fn current_figures(State(state): State<SharedAppState>) -> Response {
    match state.pipeline.current() {
        Some(update) => Json(FiguresResponse::from(update)).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Apply an interaction and return the resulting figures
///
/// The interaction is ordered when the request is accepted. Task and memory permits are only
/// taken when the dataset must be rescanned, so interactions answered from cached counts never
/// wait for an aggregation in flight.
async fn update_figures(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<UpdateRequest>,
) -> Result<Json<FiguresResponse>, ExplorerError> {
    let sequence = state.pipeline.next_sequence();
    let event = ViewportEvent::from_relayout(request.relayout_data.as_ref());
    let filter = request.filter();
    let scale = request.yaxis_type;
    let runtime = tokio::runtime::Handle::current();

    let update = run_blocking(&state, move |state| {
        state
            .pipeline
            .apply_with(sequence, &event, filter, scale, || {
                runtime.block_on(async {
                    let task = state.resource_manager.task().await?;
                    let memory = state
                        .resource_manager
                        .memory(state.aggregation_bytes)
                        .await?;
                    Ok::<_, ExplorerError>((task, memory))
                })
            })
    })
    .await?;
    Ok(Json(update.into()))
}

/// Run a CPU-bound function off the async runtime
///
/// Uses the rayon pool if enabled, otherwise tokio's blocking pool.
async fn run_blocking<T, F>(state: &SharedAppState, f: F) -> Result<T, ExplorerError>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T, ExplorerError> + Send + 'static,
{
    let state = Arc::clone(state);
    if state.args.use_rayon {
        tokio_rayon::spawn(move || f(&state)).await
    } else {
        tokio::task::spawn_blocking(move || f(&state)).await?
    }
}
