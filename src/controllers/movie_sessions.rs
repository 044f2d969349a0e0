use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::controllers::query_pairs;
use crate::error::{ApiError, ApiResult};
use crate::middleware::ValidJson;
use crate::models::movie_session::{
    MovieSession, MovieSessionPatch, MovieSessionPayload, MovieSessionResponse, SessionFilter,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movie_sessions", get(list_sessions).post(create_session))
        .route(
            "/movie_sessions/{id}",
            get(get_session)
                .put(update_session)
                .patch(partial_update_session)
                .delete(delete_session),
        )
}

// GET /api/movie_sessions?movie=1&date=2024-05-01
async fn list_sessions(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> ApiResult<impl IntoResponse> {
    let filter = SessionFilter::from_pairs(&query_pairs(query.as_deref()));
    let sessions = MovieSession::list(&state.db.pool, &filter).await?;
    Ok((StatusCode::OK, Json(sessions)))
}

// GET /api/movie_sessions/{id}
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let session = MovieSession::detail(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("movie session"))?;
    Ok((StatusCode::OK, Json(session)))
}

// POST /api/movie_sessions
async fn create_session(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<MovieSessionPayload>,
) -> ApiResult<impl IntoResponse> {
    let session = MovieSession::create(&state.db.pool, &payload).await?;
    tracing::info!(
        "Movie session {} created: movie {} in hall {} at {}",
        session.id, session.movie_id, session.cinema_hall_id, session.show_time
    );
    Ok((StatusCode::CREATED, Json(MovieSessionResponse::from(session))))
}

// PUT /api/movie_sessions/{id}
async fn update_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<MovieSessionPayload>,
) -> ApiResult<impl IntoResponse> {
    apply_update(&state, id, payload.into()).await
}

// PATCH /api/movie_sessions/{id}
async fn partial_update_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidJson(patch): ValidJson<MovieSessionPatch>,
) -> ApiResult<impl IntoResponse> {
    apply_update(&state, id, patch).await
}

async fn apply_update(
    state: &AppState,
    id: i64,
    patch: MovieSessionPatch,
) -> ApiResult<(StatusCode, Json<MovieSessionResponse>)> {
    let session = MovieSession::update(&state.db.pool, id, &patch).await?;
    Ok((StatusCode::OK, Json(session.into())))
}

// DELETE /api/movie_sessions/{id}
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !MovieSession::delete(&state.db.pool, id).await? {
        return Err(ApiError::NotFound("movie session"));
    }
    tracing::info!("Movie session {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}
