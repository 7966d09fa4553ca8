use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use sqlx::PgPool;

use crate::cache::{self, keys, Cache};
use crate::models::{Route, Stop, Trip};

use super::error::{ApiError, ErrorResponse};

#[derive(Clone)]
pub struct RoutesState {
    pub pool: PgPool,
    pub cache: Cache,
}

/// List all routes
#[utoipa::path(
    get,
    path = "/routes",
    responses(
        (status = 200, description = "All routes in the schedule", body = Vec<Route>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn list_routes(State(state): State<RoutesState>) -> Result<Json<Vec<Route>>, ApiError> {
    let routes = cache::read_through(
        &state.cache,
        &keys::route_list(),
        cache::TTL_ROUTE_LIST,
        || async {
            let routes = sqlx::query_as::<_, Route>(
                "SELECT route_id, route_short_name AS short_name, \
                 route_long_name AS long_name, route_type FROM routes",
            )
            .fetch_all(&state.pool)
            .await?;
            Ok::<_, ApiError>(routes)
        },
    )
    .await?;

    Ok(Json(routes))
}

/// List the trips serving a route
#[utoipa::path(
    get,
    path = "/routes/{route_id}/trips",
    params(("route_id" = String, Path, description = "GTFS route identifier")),
    responses(
        (status = 200, description = "Trips for the route (empty if unknown)", body = Vec<Trip>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn trips_by_route(
    State(state): State<RoutesState>,
    Path(route_id): Path<String>,
) -> Result<Json<Vec<Trip>>, ApiError> {
    let trips = cache::read_through(
        &state.cache,
        &keys::route_trips(&route_id),
        cache::TTL_ROUTE_TRIPS,
        || async {
            let trips = sqlx::query_as::<_, Trip>(
                "SELECT trip_id, route_id, service_id, trip_headsign \
                 FROM trips WHERE route_id = $1",
            )
            .bind(&route_id)
            .fetch_all(&state.pool)
            .await?;
            Ok::<_, ApiError>(trips)
        },
    )
    .await?;

    Ok(Json(trips))
}

/// List the stops a route visits
///
/// Stops are deduplicated by name: platforms sharing a name collapse to one
/// entry carrying the minimum stop id and coordinates of the group.
#[utoipa::path(
    get,
    path = "/routes/{route_id}/stops",
    params(("route_id" = String, Path, description = "GTFS route identifier")),
    responses(
        (status = 200, description = "Stops visited by the route, in trip order", body = Vec<Stop>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn stops_by_route(
    State(state): State<RoutesState>,
    Path(route_id): Path<String>,
) -> Result<Json<Vec<Stop>>, ApiError> {
    let stops = cache::read_through(
        &state.cache,
        &keys::route_stops(&route_id),
        cache::TTL_ROUTE_STOPS,
        || async {
            let stops = sqlx::query_as::<_, Stop>(
                "SELECT MIN(s.stop_id) AS stop_id, s.stop_name, \
                 MIN(s.stop_lat) AS lat, MIN(s.stop_lon) AS lon \
                 FROM stops s \
                 JOIN stop_times st ON st.stop_id = s.stop_id \
                 JOIN trips t ON t.trip_id = st.trip_id \
                 WHERE t.route_id = $1 \
                 GROUP BY s.stop_name \
                 ORDER BY MIN(st.stop_sequence) NULLS LAST, s.stop_name",
            )
            .bind(&route_id)
            .fetch_all(&state.pool)
            .await?;
            Ok::<_, ApiError>(stops)
        },
    )
    .await?;

    Ok(Json(stops))
}

pub fn router(pool: PgPool, cache: Cache) -> Router {
    let state = RoutesState { pool, cache };
    Router::new()
        .route("/routes", get(list_routes))
        .route("/routes/{route_id}/trips", get(trips_by_route))
        .route("/routes/{route_id}/stops", get(stops_by_route))
        .with_state(state)
}
