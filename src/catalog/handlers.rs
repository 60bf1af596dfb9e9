use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    catalog::{
        dto::{
            validate_name, CreateItemRequest, CreateStoreRequest, CreateTagRequest, ItemDetails,
            LinkTagRequest, StoreDetails, TagDetails, UpdateItemRequest, UpdateTagRequest,
        },
        services,
    },
    db,
    error::AppError,
    state::AppState,
};

pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/stores", get(list_stores).post(create_store))
        .route("/stores/:id", get(get_store).delete(delete_store))
        .route("/stores/:id/tags", get(list_store_tags).post(create_tag))
}

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
        // matchit wants the same param name as /items/:id at this position
        .route("/items/:id/tags/:tag_id", post(link_tag).delete(unlink_tag))
}

pub fn tag_routes() -> Router<AppState> {
    Router::new().route("/tags/:id", get(get_tag).put(update_tag).delete(delete_tag))
}

// ---- stores ----

#[instrument(skip(state))]
pub async fn list_stores(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoreDetails>>, AppError> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(services::list_stores(&mut conn).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_store(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Json(payload): Json<CreateStoreRequest>,
) -> Result<(StatusCode, Json<StoreDetails>), AppError> {
    let name = validate_name("name", &payload.name)?;

    let mut tx = db::begin_write(&state.db).await?;
    let store = services::create_store(&mut tx, &name).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(store)))
}

#[instrument(skip(state))]
pub async fn get_store(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StoreDetails>, AppError> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(services::get_store(&mut conn, id).await?))
}

#[instrument(skip(state))]
pub async fn delete_store(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let mut tx = db::begin_write(&state.db).await?;
    services::delete_store(&mut tx, id).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_store_tags(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TagDetails>>, AppError> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(services::list_store_tags(&mut conn, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_tag(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<TagDetails>), AppError> {
    let name = validate_name("name", &payload.name)?;

    let mut tx = db::begin_write(&state.db).await?;
    let tag = services::create_tag(&mut tx, id, &name).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(tag)))
}

// ---- items ----

#[instrument(skip(state))]
pub async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<ItemDetails>>, AppError> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(services::list_items(&mut conn).await?))
}

/// Open to anonymous callers.
#[instrument(skip(state, payload))]
pub async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemDetails>), AppError> {
    let payload = payload.validate()?;

    let mut tx = db::begin_write(&state.db).await?;
    let item =
        services::create_item(&mut tx, payload.store_id, &payload.name, payload.price).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ItemDetails>, AppError> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(services::get_item(&mut conn, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Json<ItemDetails>, AppError> {
    let payload = payload.validate()?;

    let mut tx = db::begin_write(&state.db).await?;
    let item = services::update_item(
        &mut tx,
        id,
        &payload.name,
        payload.price,
        payload.store_id,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(item))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let mut tx = db::begin_write(&state.db).await?;
    services::delete_item(&mut tx, id).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn link_tag(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path((item_id, tag_id)): Path<(i64, i64)>,
    Json(payload): Json<LinkTagRequest>,
) -> Result<(StatusCode, Json<ItemDetails>), AppError> {
    let mut tx = db::begin_write(&state.db).await?;
    let item = services::link_item_tag(&mut tx, item_id, tag_id, payload.store_id).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state))]
pub async fn unlink_tag(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path((item_id, tag_id)): Path<(i64, i64)>,
) -> Result<Json<ItemDetails>, AppError> {
    let mut tx = db::begin_write(&state.db).await?;
    let item = services::unlink_item_tag(&mut tx, item_id, tag_id).await?;
    tx.commit().await?;
    Ok(Json(item))
}

// ---- tags ----

#[instrument(skip(state))]
pub async fn get_tag(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<TagDetails>, AppError> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(services::get_tag(&mut conn, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_tag(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTagRequest>,
) -> Result<Json<TagDetails>, AppError> {
    let name = validate_name("name", &payload.name)?;

    let mut tx = db::begin_write(&state.db).await?;
    let tag = services::update_tag(&mut tx, id, &name, payload.store_id).await?;
    tx.commit().await?;

    Ok(Json(tag))
}

#[instrument(skip(state))]
pub async fn delete_tag(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let mut tx = db::begin_write(&state.db).await?;
    services::delete_tag(&mut tx, id).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
