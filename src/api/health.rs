use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::cache::{Cache, KeyValueStore};

#[derive(Clone)]
pub struct HealthState {
    pub pool: PgPool,
    pub cache: Cache,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Whether the service is running
    pub healthy: bool,
    /// Whether the relational store answers queries
    pub database: bool,
    /// Whether the cache backend answers pings
    pub cache: bool,
    /// Number of routes in the loaded schedule
    pub routes: i64,
    /// Number of stops in the loaded schedule
    pub stops: i64,
    /// Number of trips in the loaded schedule
    pub trips: i64,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    let (routes, stops, trips) = if database {
        let routes = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM routes")
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);
        let stops = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM stops")
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);
        let trips = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM trips")
            .fetch_one(&state.pool)
            .await
            .unwrap_or(0);
        (routes, stops, trips)
    } else {
        (0, 0, 0)
    };

    let cache = state.cache.health().await.is_ok();

    Json(HealthResponse {
        healthy: true,
        database,
        cache,
        routes,
        stops,
        trips,
    })
}

pub fn router(pool: PgPool, cache: Cache) -> Router {
    let state = HealthState { pool, cache };
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}
