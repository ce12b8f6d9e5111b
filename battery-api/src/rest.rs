use crate::db::PoolState;
use crate::errors::{Error, ErrorKind};
use crate::field::Field;
use crate::model::{FieldValue, NewSample, TelemetrySample};
use crate::store::BatteryStore;
use crate::validate::{parse_numeric_bound, require_bound};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
struct AppState {
    store: BatteryStore,
}

#[derive(Debug, Deserialize)]
pub struct TemperatureQuery {
    #[serde(rename = "minTemp")]
    min_temp: Option<String>,
    #[serde(rename = "maxTemp")]
    max_temp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TimeRangeQuery {
    start: Option<String>,
    end: Option<String>,
}

pub fn create_router(store: BatteryStore) -> Router {
    let state = AppState { store };

    Router::new()
        .route("/api/battery/data", post(post_sample))
        .route("/api/battery/:id", get(get_battery))
        .route("/api/battery/:id/:field", get(get_battery_field))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn post_sample(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewSample>, JsonRejection>,
) -> Result<(StatusCode, Json<TelemetrySample>), AppError> {
    let Json(sample) = payload.map_err(|rejection| Error::Validation(rejection.body_text()))?;
    let stored = state.store.insert_sample(&sample).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// All samples for a battery, or only those within `minTemp..=maxTemp` when
/// either bound is given.
async fn get_battery(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<TemperatureQuery>,
) -> Result<Json<Vec<TelemetrySample>>, AppError> {
    if params.min_temp.is_none() && params.max_temp.is_none() {
        let samples = state.store.get_all_samples(&id).await?;
        info!("Retrieved all data for battery ID: {}", id);
        return Ok(Json(samples));
    }

    let min_temp = parse_numeric_bound("minTemp", params.min_temp.as_deref())?;
    let max_temp = parse_numeric_bound("maxTemp", params.max_temp.as_deref())?;

    let samples = state
        .store
        .get_by_temperature_range(&id, min_temp, max_temp)
        .await?;
    info!(
        "Retrieved data for battery ID: {} with temperature between {} and {}",
        id, min_temp, max_temp
    );
    Ok(Json(samples))
}

/// One measurement column for a battery, optionally bounded by `start`/`end`.
async fn get_battery_field(
    State(state): State<AppState>,
    Path((id, field)): Path<(String, String)>,
    Query(params): Query<TimeRangeQuery>,
) -> Result<Json<Vec<FieldValue>>, AppError> {
    let field: Field = field.parse()?;

    if params.start.is_none() && params.end.is_none() {
        let values = state.store.get_field(&id, field).await?;
        info!("Retrieved {} data for battery ID: {}", field, id);
        return Ok(Json(values));
    }

    let start = require_bound("start", params.start.as_deref())?;
    let end = require_bound("end", params.end.as_deref())?;

    let values = state
        .store
        .get_field_in_range(&id, field, start, end)
        .await?;
    info!(
        "Retrieved {} data for battery ID: {} between {} and {}",
        field, id, start, end
    );
    Ok(Json(values))
}

async fn live() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready(State(state): State<AppState>) -> Response {
    let database = state.store.pool().state();
    let status = if database == PoolState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if status == StatusCode::OK { "ready" } else { "not_ready" },
        "database": database,
    });
    (status, Json(body)).into_response()
}

#[derive(Debug)]
struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0.kind() {
            ErrorKind::ClientInput => {
                warn!("Bad request: {}", self.0);
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            ErrorKind::Unavailable => {
                warn!("Storage unavailable: {}", self.0);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Storage temporarily unavailable".to_string(),
                )
            }
            ErrorKind::Storage => {
                error!("API error: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}
