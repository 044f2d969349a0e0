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
use crate::models::actor::{Actor, ActorPatch, ActorPayload, ActorResponse};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/actors", get(list_actors).post(create_actor))
        .route(
            "/actors/{id}",
            get(get_actor).put(update_actor).patch(partial_update_actor).delete(delete_actor),
        )
}

// GET /api/actors
async fn list_actors(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let actors: Vec<ActorResponse> = Actor::list(&state.db.pool)
        .await?
        .into_iter()
        .map(ActorResponse::from)
        .collect();
    Ok((StatusCode::OK, Json(actors)))
}

// GET /api/actors/{id}
async fn get_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let actor = Actor::find(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("actor"))?;
    Ok((StatusCode::OK, Json(ActorResponse::from(actor))))
}

// POST /api/actors
async fn create_actor(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<ActorPayload>,
) -> ApiResult<impl IntoResponse> {
    let actor = Actor::create(&state.db.pool, &payload).await?;
    tracing::info!("Actor {} created: {}", actor.id, actor.full_name());
    Ok((StatusCode::CREATED, Json(ActorResponse::from(actor))))
}

// PUT /api/actors/{id}
async fn update_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<ActorPayload>,
) -> ApiResult<impl IntoResponse> {
    apply_update(&state, id, payload.into()).await
}

// PATCH /api/actors/{id}
async fn partial_update_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidJson(patch): ValidJson<ActorPatch>,
) -> ApiResult<impl IntoResponse> {
    apply_update(&state, id, patch).await
}

async fn apply_update(
    state: &AppState,
    id: i64,
    patch: ActorPatch,
) -> ApiResult<(StatusCode, Json<ActorResponse>)> {
    let actor = Actor::update(&state.db.pool, id, &patch)
        .await?
        .ok_or(ApiError::NotFound("actor"))?;
    Ok((StatusCode::OK, Json(actor.into())))
}

// DELETE /api/actors/{id}
async fn delete_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !Actor::delete(&state.db.pool, id).await? {
        return Err(ApiError::NotFound("actor"));
    }
    tracing::info!("Actor {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}
