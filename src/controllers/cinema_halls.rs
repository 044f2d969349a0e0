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
use crate::models::cinema_hall::{CinemaHall, CinemaHallPatch, CinemaHallPayload, CinemaHallResponse};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cinema_halls", get(list_halls).post(create_hall))
        .route(
            "/cinema_halls/{id}",
            get(get_hall).put(update_hall).patch(partial_update_hall).delete(delete_hall),
        )
}

// GET /api/cinema_halls
async fn list_halls(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let halls: Vec<CinemaHallResponse> = CinemaHall::list(&state.db.pool)
        .await?
        .into_iter()
        .map(CinemaHallResponse::from)
        .collect();
    Ok((StatusCode::OK, Json(halls)))
}

// GET /api/cinema_halls/{id}
async fn get_hall(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let hall = CinemaHall::find(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("cinema hall"))?;
    Ok((StatusCode::OK, Json(CinemaHallResponse::from(hall))))
}

// POST /api/cinema_halls
async fn create_hall(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<CinemaHallPayload>,
) -> ApiResult<impl IntoResponse> {
    let hall = CinemaHall::create(&state.db.pool, &payload).await?;
    tracing::info!("Cinema hall {} created with {} seats", hall.id, hall.capacity());
    Ok((StatusCode::CREATED, Json(CinemaHallResponse::from(hall))))
}

// PUT /api/cinema_halls/{id}
async fn update_hall(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<CinemaHallPayload>,
) -> ApiResult<impl IntoResponse> {
    apply_update(&state, id, payload.into()).await
}

// PATCH /api/cinema_halls/{id}
async fn partial_update_hall(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidJson(patch): ValidJson<CinemaHallPatch>,
) -> ApiResult<impl IntoResponse> {
    apply_update(&state, id, patch).await
}

async fn apply_update(
    state: &AppState,
    id: i64,
    patch: CinemaHallPatch,
) -> ApiResult<(StatusCode, Json<CinemaHallResponse>)> {
    let hall = CinemaHall::update(&state.db.pool, id, &patch).await?;
    Ok((StatusCode::OK, Json(hall.into())))
}

// DELETE /api/cinema_halls/{id}
async fn delete_hall(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !CinemaHall::delete(&state.db.pool, id).await? {
        return Err(ApiError::NotFound("cinema hall"));
    }
    tracing::info!("Cinema hall {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}
