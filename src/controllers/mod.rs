pub mod genres;
pub mod actors;
pub mod cinema_halls;
pub mod movies;
pub mod movie_sessions;
pub mod orders;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(genres::routes())
        .merge(actors::routes())
        .merge(cinema_halls::routes())
        .merge(movies::routes())
        .merge(movie_sessions::routes())
        .merge(orders::routes())
}

/// Decodes a raw query string into key/value pairs, keeping repeated keys.
///
/// A query that cannot be decoded is treated as empty.
pub fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default()
}
