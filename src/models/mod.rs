pub mod user;
pub mod genre;
pub mod actor;
pub mod cinema_hall;
pub mod movie;
pub mod movie_session;
pub mod order;

pub use user::User;
pub use genre::Genre;
pub use actor::Actor;
pub use cinema_hall::CinemaHall;
pub use movie::Movie;
pub use movie_session::MovieSession;
pub use order::Order;

use sqlx::{PgConnection, Row};
use std::collections::BTreeSet;

/// Parses a comma-separated id list, silently skipping anything that is not an integer.
pub fn parse_ids(raw: &str) -> impl Iterator<Item = i64> + '_ {
    raw.split(',').filter_map(|part| part.trim().parse::<i64>().ok())
}

/// Sorted, de-duplicated copy of `ids`.
pub fn unique_ids(ids: &[i64]) -> Vec<i64> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Message for a body field pointing at a row that does not exist.
pub fn invalid_pk(id: i64) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}

/// Ids from `ids` that have no row in `table`.
pub async fn missing_ids(
    conn: &mut PgConnection,
    table: &'static str,
    ids: &[i64],
) -> Result<Vec<i64>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let query = format!("SELECT id FROM {} WHERE id = ANY($1)", table);
    let found: BTreeSet<i64> = sqlx::query(&query)
        .bind(ids)
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(|row| row.get::<i64, _>("id"))
        .collect();

    Ok(unique_ids(ids).into_iter().filter(|id| !found.contains(id)).collect())
}
