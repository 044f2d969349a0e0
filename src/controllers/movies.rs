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
use crate::models::movie::{Movie, MovieFilter, MovieListItem, MoviePatch, MoviePayload, MovieResponse};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route(
            "/movies/{id}",
            get(get_movie).put(update_movie).patch(partial_update_movie).delete(delete_movie),
        )
}

// GET /api/movies?title=..&genres=1&genres=2&actors=3
async fn list_movies(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> ApiResult<impl IntoResponse> {
    let filter = MovieFilter::from_pairs(&query_pairs(query.as_deref()));
    tracing::debug!("list_movies filter: {:?}", filter);

    let movies: Vec<MovieListItem> = Movie::list(&state.db.pool, &filter)
        .await?
        .into_iter()
        .map(|m| m.into_list_item())
        .collect();

    Ok((StatusCode::OK, Json(movies)))
}

// GET /api/movies/{id}
async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let movie = Movie::find(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("movie"))?;
    Ok((StatusCode::OK, Json(movie.into_detail())))
}

// POST /api/movies
async fn create_movie(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<MoviePayload>,
) -> ApiResult<impl IntoResponse> {
    let movie = Movie::create(&state.db.pool, &payload).await?;
    tracing::info!("Movie {} created: {}", movie.movie.id, movie.movie.title);
    Ok((StatusCode::CREATED, Json(movie.into_response())))
}

// PUT /api/movies/{id}
async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<MoviePayload>,
) -> ApiResult<impl IntoResponse> {
    apply_update(&state, id, payload.into()).await
}

// PATCH /api/movies/{id}
async fn partial_update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ValidJson(patch): ValidJson<MoviePatch>,
) -> ApiResult<impl IntoResponse> {
    apply_update(&state, id, patch).await
}

async fn apply_update(
    state: &AppState,
    id: i64,
    patch: MoviePatch,
) -> ApiResult<(StatusCode, Json<MovieResponse>)> {
    let movie = Movie::update(&state.db.pool, id, &patch).await?;
    Ok((StatusCode::OK, Json(movie.into_response())))
}

// DELETE /api/movies/{id}
async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !Movie::delete(&state.db.pool, id).await? {
        return Err(ApiError::NotFound("movie"));
    }
    tracing::info!("Movie {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}
