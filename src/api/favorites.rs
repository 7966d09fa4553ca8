use axum::extract::{Path, State};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::models::{Favorite, FavoriteKind};

use super::error::{ApiError, ErrorResponse};

#[derive(Clone)]
pub struct FavoritesState {
    pub pool: PgPool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddFavoriteRequest {
    pub item_id: String,
    /// Either "route" or "stop".
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn parse_kind(raw: &str) -> Result<FavoriteKind, ApiError> {
    FavoriteKind::parse(raw)
        .ok_or_else(|| ApiError::Validation("Type must be 'route' or 'stop'".into()))
}

/// Add a favorite for a user
#[utoipa::path(
    post,
    path = "/users/{id}/favorites",
    params(("id" = i32, Path, description = "User id")),
    request_body = AddFavoriteRequest,
    responses(
        (status = 200, description = "The created favorite", body = Favorite),
        (status = 400, description = "Invalid type", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "favorites"
)]
pub async fn add_favorite(
    State(state): State<FavoritesState>,
    Path(user_id): Path<i32>,
    Json(request): Json<AddFavoriteRequest>,
) -> Result<Json<Favorite>, ApiError> {
    let kind = parse_kind(&request.kind)?;

    let favorite = sqlx::query_as::<_, Favorite>(
        "INSERT INTO favorites (user_id, item_id, type) VALUES ($1, $2, $3) \
         RETURNING id, type, item_id, NULL::TEXT AS item_name",
    )
    .bind(user_id)
    .bind(&request.item_id)
    .bind(kind.as_str())
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(favorite))
}

/// List a user's favorites
#[utoipa::path(
    get,
    path = "/users/{id}/favorites",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "Favorites, newest first", body = Vec<Favorite>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "favorites"
)]
pub async fn list_favorites(
    State(state): State<FavoritesState>,
    Path(user_id): Path<i32>,
) -> Result<Json<Vec<Favorite>>, ApiError> {
    let favorites = sqlx::query_as::<_, Favorite>(
        "SELECT f.id, f.type, f.item_id, \
         COALESCE(r.route_long_name, r.route_short_name) AS item_name \
         FROM favorites f \
         LEFT JOIN routes r ON f.item_id = r.route_id AND f.type = 'route' \
         WHERE f.user_id = $1 \
         ORDER BY f.id DESC",
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(favorites))
}

/// Remove a favorite
#[utoipa::path(
    delete,
    path = "/users/{id}/favorites/{type}/{item_id}",
    params(
        ("id" = i32, Path, description = "User id"),
        ("type" = String, Path, description = "\"route\" or \"stop\""),
        ("item_id" = String, Path, description = "Favorited item identifier")
    ),
    responses(
        (status = 200, description = "Deletion confirmation", body = MessageResponse),
        (status = 400, description = "Invalid type", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "favorites"
)]
pub async fn delete_favorite(
    State(state): State<FavoritesState>,
    Path((user_id, kind, item_id)): Path<(i32, String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let kind = parse_kind(&kind)?;

    sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND item_id = $2 AND type = $3")
        .bind(user_id)
        .bind(&item_id)
        .bind(kind.as_str())
        .execute(&state.pool)
        .await?;

    Ok(Json(MessageResponse {
        message: "Favorite deleted successfully".into(),
    }))
}

pub fn router(pool: PgPool) -> Router {
    let state = FavoritesState { pool };
    Router::new()
        .route("/users/{id}/favorites", post(add_favorite).get(list_favorites))
        .route("/users/{id}/favorites/{type}/{item_id}", delete(delete_favorite))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_validation_rejects_unknown_types() {
        assert!(parse_kind("route").is_ok());
        assert!(parse_kind("stop").is_ok());

        let err = parse_kind("bus").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(err.to_string(), "Type must be 'route' or 'stop'");
    }

    #[test]
    fn add_favorite_request_accepts_type_field() {
        let request: AddFavoriteRequest =
            serde_json::from_str(r#"{"item_id": "Red", "type": "route"}"#).unwrap();
        assert_eq!(request.item_id, "Red");
        assert_eq!(request.kind, "route");
    }
}
