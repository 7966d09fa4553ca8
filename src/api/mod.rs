pub mod error;
pub mod favorites;
pub mod health;
pub mod realtime;
pub mod routes;
pub mod stops;
pub mod users;

pub use error::{ApiError, ErrorResponse};

use axum::Router;
use sqlx::PgPool;

use crate::cache::Cache;
use crate::providers::mbta::FeedClient;

pub fn router(pool: PgPool, cache: Cache, feeds: FeedClient) -> Router {
    Router::new()
        .merge(routes::router(pool.clone(), cache.clone()))
        .merge(stops::router(pool.clone(), cache.clone()))
        .merge(realtime::router(cache.clone(), feeds))
        .merge(users::router(pool.clone()))
        .merge(favorites::router(pool.clone()))
        .merge(health::router(pool, cache))
}
