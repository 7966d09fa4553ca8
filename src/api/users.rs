use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::models::User;

use super::error::{ApiError, ErrorResponse};

#[derive(Clone)]
pub struct UsersState {
    pub pool: PgPool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
}

/// Create a user
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "The created user", body = User),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<UsersState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<User>, ApiError> {
    if request.username.is_empty() {
        return Err(ApiError::Validation("username must not be empty".into()));
    }

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username) VALUES ($1) RETURNING id, username, created_at",
    )
    .bind(&request.username)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(user))
}

/// Get a user by id
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = User),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<UsersState>,
    Path(id): Path<i32>,
) -> Result<Json<User>, ApiError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, created_at FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(user))
}

/// Get a user by username
#[utoipa::path(
    get,
    path = "/users/username/{username}",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "The user", body = User),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user_by_username(
    State(state): State<UsersState>,
    Path(username): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, created_at FROM users WHERE username = $1",
    )
    .bind(&username)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(user))
}

pub fn router(pool: PgPool) -> Router {
    let state = UsersState { pool };
    Router::new()
        .route("/users", post(create_user))
        .route("/users/{id}", get(get_user))
        .route("/users/username/{username}", get(get_user_by_username))
        .with_state(state)
}
