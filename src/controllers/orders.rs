use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthUser, ValidJson};
use crate::models::Order;
use crate::services::booking::{self, CreateOrderRequest};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(get_order))
}

// GET /api/orders
async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let orders = Order::list_for_user(&state.db.pool, user.user_id).await?;
    Ok((StatusCode::OK, Json(orders)))
}

// GET /api/orders/{id}
async fn get_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    // Someone else's order looks exactly like a missing one
    let order = Order::find_for_user(&state.db.pool, user.user_id, id)
        .await?
        .ok_or(ApiError::NotFound("order"))?;
    Ok((StatusCode::OK, Json(order)))
}

// POST /api/orders
async fn create_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidJson(request): ValidJson<CreateOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    let order = booking::create_order(&state.db.pool, user.user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
