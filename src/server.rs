use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::condition::Conditions;
use crate::engine::{FilteredTables, TableFilter};
use crate::error::{RelfilterError, Result};
use crate::persist::{DataQueryService, Store};
use crate::query::{FilterArgument, QueryGenerator, SqliteQueryBuilder};
use crate::table::Table;

/// Shared by every request.
pub struct AppState {
    filter: TableFilter,
    store: Mutex<Store>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(filter: TableFilter, store: Store, request_timeout: Duration) -> Self {
        Self {
            filter,
            store: Mutex::new(store),
            request_timeout,
        }
    }
}

#[derive(Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub conditions: Conditions,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub filters: Vec<FilterArgument>,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Serialize)]
pub struct FilterResponse {
    pub status: String,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<FilteredTables>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub status: String,
    pub elapsed_ms: f64,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub table: Option<Table>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A failed request: the status to answer with and the message to report.
pub struct Failure(StatusCode, String);

impl From<RelfilterError> for Failure {
    fn from(e: RelfilterError) -> Self {
        let status = match e {
            RelfilterError::InvalidArgument(_)
            | RelfilterError::InvalidIdentifier(_)
            | RelfilterError::UnknownTable(_) => StatusCode::BAD_REQUEST,
            RelfilterError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Failure(status, e.to_string())
    }
}

impl From<JsonRejection> for Failure {
    fn from(e: JsonRejection) -> Self {
        Failure(StatusCode::BAD_REQUEST, e.body_text())
    }
}

// The work is synchronous, so it runs on a blocking thread under the request timeout.
async fn run_blocking<T, F>(timeout: Duration, work: F) -> std::result::Result<T, Failure>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(work)).await {
        Ok(Ok(result)) => result.map_err(Failure::from),
        Ok(Err(e)) => {
            warn!(error=%e, "Join error");
            Err(Failure(StatusCode::INTERNAL_SERVER_ERROR, "Join error".into()))
        }
        Err(_) => Err(RelfilterError::Timeout(timeout.as_millis() as u64).into()),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

async fn filter(
    State(state): State<Arc<AppState>>,
    request: std::result::Result<Json<FilterRequest>, JsonRejection>,
) -> (StatusCode, Json<FilterResponse>) {
    let started = Instant::now();
    let outcome = match request {
        Ok(Json(request)) => {
            let filter = state.filter.clone();
            run_blocking(state.request_timeout, move || Ok(filter.filter(&request.conditions))).await
        }
        Err(rejection) => Err(rejection.into()),
    };
    let elapsed_ms = elapsed_ms(started);
    match outcome {
        Ok(tables) => {
            let passes = tables.propagation().passes;
            info!(ms = elapsed_ms, passes, "filter complete");
            let body = FilterResponse {
                status: "ok".into(),
                elapsed_ms,
                passes: Some(passes),
                tables: Some(tables),
                error: None,
            };
            (StatusCode::OK, Json(body))
        }
        Err(Failure(status, msg)) => {
            warn!(%msg, code = %status.as_u16(), "filter error");
            let body = FilterResponse {
                status: "error".into(),
                elapsed_ms,
                passes: None,
                tables: None,
                error: Some(msg),
            };
            (status, Json(body))
        }
    }
}

async fn query(
    State(state): State<Arc<AppState>>,
    request: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> (StatusCode, Json<QueryResponse>) {
    let started = Instant::now();
    let outcome = match request {
        Ok(Json(request)) => {
            let shared = Arc::clone(&state);
            run_blocking(state.request_timeout, move || {
                let store = shared
                    .store
                    .lock()
                    .map_err(|_| RelfilterError::Persistence("store lock poisoned".into()))?;
                let service = DataQueryService::new(QueryGenerator::new(SqliteQueryBuilder), &store);
                service.query_data(&request.filters, &request.columns)
            })
            .await
        }
        Err(rejection) => Err(rejection.into()),
    };
    let elapsed_ms = elapsed_ms(started);
    match outcome {
        Ok(table) => {
            info!(ms = elapsed_ms, rows = table.row_count(), "query complete");
            let body = QueryResponse {
                status: "ok".into(),
                elapsed_ms,
                table: Some(table),
                error: None,
            };
            (StatusCode::OK, Json(body))
        }
        Err(Failure(status, msg)) => {
            warn!(%msg, code = %status.as_u16(), "query error");
            let body = QueryResponse {
                status: "error".into(),
                elapsed_ms,
                table: None,
                error: Some(msg),
            };
            (status, Json(body))
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::POST])
        .allow_headers(Any);
    Router::new()
        .route("/v1/filter", post(filter))
        .route("/v1/query", post(query))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "listening");
    axum::serve(listener, router(state)).await
}
