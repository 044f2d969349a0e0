use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::middleware::ValidJson;
use crate::models::genre::{Genre, GenrePatch, GenrePayload};
use crate::AppState;

const NAME_TAKEN: &str = "genre with this name already exists.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/genres", get(list_genres).post(create_genre))
        .route(
            "/genres/{id}",
            get(get_genre).put(update_genre).patch(partial_update_genre).delete(delete_genre),
        )
}

// GET /api/genres
async fn list_genres(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let genres = Genre::list(&state.db.pool).await?;
    Ok((StatusCode::OK, Json(genres)))
}

// GET /api/genres/{id}
async fn get_genre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let genre = Genre::find(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("genre"))?;
    Ok((StatusCode::OK, Json(genre)))
}

// POST /api/genres
async fn create_genre(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<GenrePayload>,
) -> ApiResult<impl IntoResponse> {
    let genre = Genre::create(&state.db.pool, &payload)
        .await
        .map_err(|e| ApiError::unique_or(e, "name", NAME_TAKEN))?;

    tracing::info!("Genre {} created: {}", genre.id, genre.name);
    Ok((StatusCode::CREATED, Json(genre)))
}

// PUT /api/genres/{id}
async fn update_genre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<GenrePayload>,
) -> ApiResult<impl IntoResponse> {
    apply_update(&state, id, payload.into()).await
}

// PATCH /api/genres/{id}
async fn partial_update_genre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidJson(patch): ValidJson<GenrePatch>,
) -> ApiResult<impl IntoResponse> {
    apply_update(&state, id, patch).await
}

async fn apply_update(state: &AppState, id: i64, patch: GenrePatch) -> ApiResult<(StatusCode, Json<Genre>)> {
    let genre = Genre::update(&state.db.pool, id, &patch)
        .await
        .map_err(|e| ApiError::unique_or(e, "name", NAME_TAKEN))?
        .ok_or(ApiError::NotFound("genre"))?;
    Ok((StatusCode::OK, Json(genre)))
}

// DELETE /api/genres/{id}
async fn delete_genre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !Genre::delete(&state.db.pool, id).await? {
        return Err(ApiError::NotFound("genre"));
    }
    tracing::info!("Genre {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}
