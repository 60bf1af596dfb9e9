use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::{
        dto::{MessageResponse, PublicUser, TokenResponse, UserCredentials},
        extractors::{AuthUser, CurrentToken},
        jwt::JwtKeys,
        services,
    },
    db,
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/users/:user_id", get(get_user).delete(delete_user))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<UserCredentials>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let payload = payload.validate()?;

    let mut tx = db::begin_write(&state.db).await?;
    services::register(&mut tx, &payload.username, &payload.password).await?;
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User has been created successfully")),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<UserCredentials>,
) -> Result<Json<TokenResponse>, AppError> {
    // malformed usernames can never match, answer like any other miss
    let payload = payload.validate().map_err(|_| AppError::InvalidCredentials)?;

    let keys = JwtKeys::from_ref(&state);
    let mut conn = state.db.acquire().await?;
    let access_token =
        services::login(&mut conn, &keys, &payload.username, &payload.password).await?;

    Ok(Json(TokenResponse { access_token }))
}

#[instrument(skip(state, token))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentToken(token): CurrentToken,
) -> Result<Json<MessageResponse>, AppError> {
    services::logout(state.ledger.as_ref(), &token, OffsetDateTime::now_utc()).await?;
    Ok(Json(MessageResponse::new("Logout successful")))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<PublicUser>, AppError> {
    let mut conn = state.db.acquire().await?;
    let user = services::get_user(&mut conn, user_id).await?;
    Ok(Json(PublicUser {
        id: user.id,
        username: user.username,
    }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let mut tx = db::begin_write(&state.db).await?;
    services::delete_user(&mut tx, user_id).await?;
    tx.commit().await?;
    tracing::info!(caller, user_id, "user removed");
    Ok(StatusCode::NO_CONTENT)
}
