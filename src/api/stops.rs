use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::cache::{self, keys, Cache};
use crate::models::Stop;

use super::error::{ApiError, ErrorResponse};

#[derive(Clone)]
pub struct StopsState {
    pub pool: PgPool,
    pub cache: Cache,
}

/// List all stops
#[utoipa::path(
    get,
    path = "/stops",
    responses(
        (status = 200, description = "All stops in the schedule", body = Vec<Stop>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn list_stops(State(state): State<StopsState>) -> Result<Json<Vec<Stop>>, ApiError> {
    let stops = sqlx::query_as::<_, Stop>(
        "SELECT stop_id, stop_name, stop_lat AS lat, stop_lon AS lon FROM stops",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(stops))
}

/// Get a single stop by id
#[utoipa::path(
    get,
    path = "/stops/{stop_id}",
    params(("stop_id" = String, Path, description = "GTFS stop identifier")),
    responses(
        (status = 200, description = "The stop", body = Stop),
        (status = 404, description = "Stop not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn get_stop(
    State(state): State<StopsState>,
    Path(stop_id): Path<String>,
) -> Result<Json<Stop>, ApiError> {
    let stop = sqlx::query_as::<_, Stop>(
        "SELECT stop_id, stop_name, stop_lat AS lat, stop_lon AS lon \
         FROM stops WHERE stop_id = $1",
    )
    .bind(&stop_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("Stop not found".into()))?;

    Ok(Json(stop))
}

#[derive(Debug, Deserialize)]
pub struct ConnectivityParams {
    pub from_stop: Option<String>,
    pub to_stop: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RouteConnectivity {
    pub route_id: String,
    pub from_stop_id: String,
    pub to_stop_id: String,
    pub is_connected: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectivityResponse {
    pub connecting_routes: Vec<RouteConnectivity>,
}

/// Find routes connecting two stops in order
///
/// A route connects `from_stop` to `to_stop` when some of its trips visit
/// `from_stop` at a lower stop sequence than `to_stop`. Direction matters.
#[utoipa::path(
    get,
    path = "/stops/connectivity",
    params(
        ("from_stop" = String, Query, description = "Origin stop identifier"),
        ("to_stop" = String, Query, description = "Destination stop identifier")
    ),
    responses(
        (status = 200, description = "Routes connecting the stops in order", body = ConnectivityResponse),
        (status = 400, description = "Missing parameter", body = ErrorResponse),
        (status = 404, description = "Unknown stop", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn stop_connectivity(
    State(state): State<StopsState>,
    Query(params): Query<ConnectivityParams>,
) -> Result<Json<ConnectivityResponse>, ApiError> {
    let (from_stop, to_stop) = match (params.from_stop, params.to_stop) {
        (Some(f), Some(t)) if !f.is_empty() && !t.is_empty() => (f, t),
        _ => {
            return Err(ApiError::Validation(
                "Both from_stop and to_stop parameters are required".into(),
            ))
        }
    };

    let connecting_routes = cache::read_through(
        &state.cache,
        &keys::connectivity(&from_stop, &to_stop),
        cache::TTL_CONNECTIVITY,
        || async {
            // Validate both stops before paying for the join.
            let from_exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stops WHERE stop_id = $1)")
                    .bind(&from_stop)
                    .fetch_one(&state.pool)
                    .await?;
            if !from_exists {
                return Err(ApiError::NotFound("From stop not found".into()));
            }

            let to_exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stops WHERE stop_id = $1)")
                    .bind(&to_stop)
                    .fetch_one(&state.pool)
                    .await?;
            if !to_exists {
                return Err(ApiError::NotFound("To stop not found".into()));
            }

            let route_ids: Vec<String> = sqlx::query_scalar(
                "SELECT t.route_id \
                 FROM trips t \
                 JOIN stop_times st1 ON t.trip_id = st1.trip_id AND st1.stop_id = $1 \
                 JOIN stop_times st2 ON t.trip_id = st2.trip_id AND st2.stop_id = $2 \
                 GROUP BY t.route_id \
                 HAVING MIN(st1.stop_sequence) < MIN(st2.stop_sequence) \
                 ORDER BY t.route_id",
            )
            .bind(&from_stop)
            .bind(&to_stop)
            .fetch_all(&state.pool)
            .await?;

            Ok::<_, ApiError>(
                route_ids
                    .into_iter()
                    .map(|route_id| RouteConnectivity {
                        route_id,
                        from_stop_id: from_stop.clone(),
                        to_stop_id: to_stop.clone(),
                        is_connected: true,
                    })
                    .collect::<Vec<_>>(),
            )
        },
    )
    .await?;

    Ok(Json(ConnectivityResponse { connecting_routes }))
}

pub fn router(pool: PgPool, cache: Cache) -> Router {
    let state = StopsState { pool, cache };
    Router::new()
        .route("/stops", get(list_stops))
        .route("/stops/connectivity", get(stop_connectivity))
        .route("/stops/{stop_id}", get(get_stop))
        .with_state(state)
}
