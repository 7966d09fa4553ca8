use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::cache::{self, keys, Cache};
use crate::providers::mbta::{AlertEntity, FeedClient, LiveVehicle, TripUpdateEntity};

use super::error::{ApiError, ErrorResponse};

#[derive(Clone)]
pub struct RealtimeState {
    pub cache: Cache,
    pub feeds: FeedClient,
}

/// Live vehicles on a route
#[utoipa::path(
    get,
    path = "/live/{route_id}",
    params(("route_id" = String, Path, description = "GTFS route identifier")),
    responses(
        (status = 200, description = "Vehicles currently on the route", body = Vec<LiveVehicle>),
        (status = 500, description = "Feed unavailable", body = ErrorResponse)
    ),
    tag = "realtime"
)]
pub async fn live_vehicles(
    State(state): State<RealtimeState>,
    Path(route_id): Path<String>,
) -> Result<Json<Vec<LiveVehicle>>, ApiError> {
    let vehicles = cache::read_through(
        &state.cache,
        &keys::live_vehicles(&route_id),
        cache::TTL_LIVE_VEHICLES,
        || async { Ok::<_, ApiError>(state.feeds.vehicle_positions(&route_id).await?) },
    )
    .await?;

    Ok(Json(vehicles))
}

/// All current service alerts
#[utoipa::path(
    get,
    path = "/alerts",
    responses(
        (status = 200, description = "Full alert list from the agency feed", body = Vec<AlertEntity>),
        (status = 500, description = "Feed unavailable", body = ErrorResponse)
    ),
    tag = "realtime"
)]
pub async fn alerts(
    State(state): State<RealtimeState>,
) -> Result<Json<Vec<AlertEntity>>, ApiError> {
    let alerts = cache::read_through(&state.cache, &keys::alerts(), cache::TTL_ALERTS, || async {
        Ok::<_, ApiError>(state.feeds.alerts().await?)
    })
    .await?;

    Ok(Json(alerts))
}

/// Trip updates for a route
#[utoipa::path(
    get,
    path = "/trip-updates/{route_id}",
    params(("route_id" = String, Path, description = "GTFS route identifier")),
    responses(
        (status = 200, description = "Trip updates for the route", body = Vec<TripUpdateEntity>),
        (status = 500, description = "Feed unavailable", body = ErrorResponse)
    ),
    tag = "realtime"
)]
pub async fn trip_updates(
    State(state): State<RealtimeState>,
    Path(route_id): Path<String>,
) -> Result<Json<Vec<TripUpdateEntity>>, ApiError> {
    let updates = cache::read_through(
        &state.cache,
        &keys::trip_updates(&route_id),
        cache::TTL_TRIP_UPDATES,
        || async { Ok::<_, ApiError>(state.feeds.trip_updates(&route_id).await?) },
    )
    .await?;

    Ok(Json(updates))
}

pub fn router(cache: Cache, feeds: FeedClient) -> Router {
    let state = RealtimeState { cache, feeds };
    Router::new()
        .route("/live/{route_id}", get(live_vehicles))
        .route("/alerts", get(alerts))
        .route("/trip-updates/{route_id}", get(trip_updates))
        .with_state(state)
}
