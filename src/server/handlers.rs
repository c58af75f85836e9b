use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::geocoding::{
    AutocompleteResult, CancelToken, ErrorKind, GeocodeError, GeocodingClient, GeocodingResult,
    DEFAULT_AUTOCOMPLETE_LIMIT,
};

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    kind: ErrorKind,
    code: u16,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: ErrorKind,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
            kind: self.kind,
            code: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<GeocodeError> for ApiError {
    fn from(e: GeocodeError) -> Self {
        let kind = e.kind();
        Self {
            status: status_for(kind),
            kind,
            message: e.to_string(),
        }
    }
}

/// HTTP status the facade answers with for each failure kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Configuration | ErrorKind::Unauthorized => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Upstream | ErrorKind::Network | ErrorKind::MalformedResponse => StatusCode::BAD_GATEWAY,
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

// ─── Blocking bridge ─────────────────────────────────────────────

/// Cancels the in-flight lookup when the handler future is dropped,
/// e.g. because the client disconnected.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

async fn run_blocking<T, F>(client: Arc<GeocodingClient>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&GeocodingClient, &CancelToken) -> Result<T, GeocodeError> + Send + 'static,
{
    let token = CancelToken::new();
    let guard = CancelOnDrop(token.clone());

    let joined = tokio::task::spawn_blocking(move || f(&client, &token)).await;
    drop(guard);

    match joined {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: ErrorKind::Network,
            message: format!("lookup task failed: {}", e),
        }),
    }
}

fn log_failure(route: &str, err: &ApiError) {
    warn!(route, kind = %err.kind, status = err.status.as_u16(), error = %err.message, "request failed");
}

// ─── GET /api/geocode ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct GeocodeQuery {
    pub address: Option<String>,
}

pub async fn geocode(
    State(client): State<Arc<GeocodingClient>>,
    Query(params): Query<GeocodeQuery>,
) -> Result<Json<GeocodingResult>, ApiError> {
    let start = Instant::now();
    let address = params.address.unwrap_or_default();

    let result = run_blocking(client, move |c, cancel| c.geocode_address_with_cancel(&address, cancel))
        .await
        .inspect_err(|e| log_failure("/api/geocode", e))?;

    info!(
        display_name = %result.display_name,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/geocode"
    );
    Ok(Json(result))
}

// ─── GET /api/reverse ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ReverseQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

pub async fn reverse(
    State(client): State<Arc<GeocodingClient>>,
    Query(params): Query<ReverseQuery>,
) -> Result<Json<GeocodingResult>, ApiError> {
    let start = Instant::now();
    let (Some(lat), Some(lon)) = (params.lat, params.lon) else {
        let err = ApiError::from(GeocodeError::InvalidInput("both 'lat' and 'lon' are required".into()));
        log_failure("/api/reverse", &err);
        return Err(err);
    };

    let result = run_blocking(client, move |c, cancel| c.reverse_geocode_with_cancel(lat, lon, cancel))
        .await
        .inspect_err(|e| log_failure("/api/reverse", e))?;

    info!(
        lat,
        lon,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/reverse"
    );
    Ok(Json(result))
}

// ─── GET /api/autocomplete ───────────────────────────────────────

#[derive(Deserialize)]
pub struct AutocompleteQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

pub async fn autocomplete(
    State(client): State<Arc<GeocodingClient>>,
    Query(params): Query<AutocompleteQuery>,
) -> Result<Json<Vec<AutocompleteResult>>, ApiError> {
    let query = params.q.unwrap_or_default();
    let limit = params.limit.unwrap_or(DEFAULT_AUTOCOMPLETE_LIMIT);

    let items = run_blocking(client, move |c, cancel| {
        c.address_autocomplete_with_cancel(&query, limit, cancel)
    })
    .await
    .inspect_err(|e| log_failure("/api/autocomplete", e))?;

    Ok(Json(items))
}
