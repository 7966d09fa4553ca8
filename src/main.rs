pub mod api;
mod cache;
mod config;
mod ingest;
mod models;
mod providers;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use cache::Cache;
use config::Config;
use providers::mbta::FeedClient;

#[derive(OpenApi)]
#[openapi(
    info(title = "Transit Tracker API", version = "0.2.0"),
    paths(
        api::routes::list_routes,
        api::routes::trips_by_route,
        api::routes::stops_by_route,
        api::stops::list_stops,
        api::stops::get_stop,
        api::stops::stop_connectivity,
        api::realtime::live_vehicles,
        api::realtime::alerts,
        api::realtime::trip_updates,
        api::users::create_user,
        api::users::get_user,
        api::users::get_user_by_username,
        api::favorites::add_favorite,
        api::favorites::list_favorites,
        api::favorites::delete_favorite,
        api::health::health_check,
    ),
    components(schemas(
        api::ErrorResponse,
        models::Route,
        models::Stop,
        models::Trip,
        models::User,
        models::Favorite,
        models::FavoriteKind,
        api::stops::ConnectivityResponse,
        api::stops::RouteConnectivity,
        api::users::CreateUserRequest,
        api::favorites::AddFavoriteRequest,
        api::favorites::MessageResponse,
        api::health::HealthResponse,
        providers::mbta::types::LiveVehicle,
        providers::mbta::types::AlertEntity,
        providers::mbta::types::TripUpdateEntity,
    )),
    tags(
        (name = "routes", description = "Static route and trip data"),
        (name = "stops", description = "Stop data and stop-to-stop connectivity"),
        (name = "realtime", description = "Cached pass-through of the agency real-time feeds"),
        (name = "users", description = "User management"),
        (name = "favorites", description = "Per-user favorite routes and stops"),
        (name = "health", description = "Service health check")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // A .env file is optional; real environment variables win.
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info,sqlx=warn".into()),
        )
        .init();

    // Load config
    let config = Config::from_env().expect("Failed to load configuration");

    // Build CORS layer based on config
    let cors_layer = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode explicitly enabled (all origins allowed) - DO NOT USE IN PRODUCTION");
        CorsLayer::permissive()
    } else if !config.cors_origins.is_empty() {
        tracing::info!(origins = ?config.cors_origins, "CORS: Restricting to configured origins");
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        tracing::info!("CORS: No origins configured, cross-origin requests disabled");
        CorsLayer::new()
    };

    // Connect to Postgres
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url())
        .await
        .expect("Failed to connect to Postgres");

    // Run migrations
    let migrator = sqlx::migrate!("./migrations");
    tracing::info!(migrations = migrator.migrations.len(), "Found migrations");
    migrator.run(&pool).await.expect("Failed to run migrations");
    tracing::info!("Database migrations completed");

    // Connect to Redis; a failure here only disables caching.
    let cache = Cache::connect(&config.redis).await;

    // Ingest the static GTFS schedule.
    let report = ingest::load_gtfs(&pool, &config.gtfs_dir)
        .await
        .expect("Failed to load GTFS data");
    if report.total_failed() > 0 {
        tracing::warn!(failed = report.total_failed(), "GTFS load finished with failed rows");
    }
    ingest::verify_references(&pool)
        .await
        .expect("Failed to verify GTFS references");

    let feeds = FeedClient::new(config.feeds.clone()).expect("Failed to build feed client");

    // Build the app
    let app = Router::new()
        .merge(api::router(pool, cache, feeds))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listen address");

    tracing::info!(addr = %config.bind_addr, "Server running");
    tracing::info!("Swagger UI: /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
