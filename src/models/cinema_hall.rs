use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use validator::Validate;

use crate::error::{ApiError, ApiResult, FieldErrors};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CinemaHall {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
}

/// Hall as rendered by the API; `capacity` is always derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CinemaHallResponse {
    pub id: i64,
    pub name: String,
    pub rows: i32,
    pub seats_in_row: i32,
    pub capacity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CinemaHallPayload {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,
    #[validate(range(min = 1, message = "rows must be a positive number"))]
    pub rows: i32,
    #[validate(range(min = 1, message = "seats_in_row must be a positive number"))]
    pub seats_in_row: i32,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CinemaHallPatch {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 1, message = "rows must be a positive number"))]
    pub rows: Option<i32>,
    #[validate(range(min = 1, message = "seats_in_row must be a positive number"))]
    pub seats_in_row: Option<i32>,
}

impl From<CinemaHallPayload> for CinemaHallPatch {
    fn from(payload: CinemaHallPayload) -> Self {
        CinemaHallPatch {
            name: Some(payload.name),
            rows: Some(payload.rows),
            seats_in_row: Some(payload.seats_in_row),
        }
    }
}

pub fn capacity(rows: i32, seats_in_row: i32) -> i64 {
    i64::from(rows) * i64::from(seats_in_row)
}

/// Highest row and seat number among tickets already sold.
///
/// Both are `None` when nothing has been sold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct SoldExtent {
    pub max_row: Option<i32>,
    pub max_seat: Option<i32>,
}

impl SoldExtent {
    /// Sold seats across every session played in `hall_id`.
    pub async fn for_hall(conn: &mut PgConnection, hall_id: i64) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SoldExtent>(
            "SELECT MAX(t.row) AS max_row, MAX(t.seat) AS max_seat
             FROM tickets t
             JOIN movie_sessions ms ON ms.id = t.movie_session_id
             WHERE ms.cinema_hall_id = $1"
        )
        .bind(hall_id)
        .fetch_one(conn)
        .await
    }

    pub async fn for_session(conn: &mut PgConnection, session_id: i64) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SoldExtent>(
            "SELECT MAX(t.row) AS max_row, MAX(t.seat) AS max_seat
             FROM tickets t
             WHERE t.movie_session_id = $1"
        )
        .bind(session_id)
        .fetch_one(conn)
        .await
    }

    pub fn fits(&self, rows: i32, seats_in_row: i32) -> bool {
        self.max_row.map_or(true, |r| r <= rows) && self.max_seat.map_or(true, |s| s <= seats_in_row)
    }

    /// Errors for resizing a hall to `rows` x `seats_in_row`, keyed by the field that is too small.
    pub fn resize_errors(&self, rows: i32, seats_in_row: i32) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Some(max_row) = self.max_row.filter(|&r| r > rows) {
            errors.insert(
                "rows".to_string(),
                vec![format!("tickets are already sold in row {}; rows cannot be less than that", max_row)],
            );
        }
        if let Some(max_seat) = self.max_seat.filter(|&s| s > seats_in_row) {
            errors.insert(
                "seats_in_row".to_string(),
                vec![format!(
                    "tickets are already sold for seat {}; seats_in_row cannot be less than that",
                    max_seat
                )],
            );
        }
        errors
    }
}

impl CinemaHall {
    pub fn capacity(&self) -> i64 {
        capacity(self.rows, self.seats_in_row)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<CinemaHall>, sqlx::Error> {
        sqlx::query_as::<_, CinemaHall>(
            "SELECT id, name, rows, seats_in_row FROM cinema_halls ORDER BY id"
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<CinemaHall>, sqlx::Error> {
        sqlx::query_as::<_, CinemaHall>(
            "SELECT id, name, rows, seats_in_row FROM cinema_halls WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &PgPool, payload: &CinemaHallPayload) -> Result<CinemaHall, sqlx::Error> {
        sqlx::query_as::<_, CinemaHall>(
            "INSERT INTO cinema_halls (name, rows, seats_in_row) VALUES ($1, $2, $3)
             RETURNING id, name, rows, seats_in_row"
        )
        .bind(&payload.name)
        .bind(payload.rows)
        .bind(payload.seats_in_row)
        .fetch_one(pool)
        .await
    }

    /// Applies `patch`, refusing to shrink the grid below any seat already sold.
    ///
    /// The hall row stays locked until commit so a concurrent booking cannot
    /// slip a ticket in between the check and the update.
    pub async fn update(pool: &PgPool, id: i64, patch: &CinemaHallPatch) -> ApiResult<CinemaHall> {
        let mut tx = pool.begin().await?;

        let current = sqlx::query_as::<_, CinemaHall>(
            "SELECT id, name, rows, seats_in_row FROM cinema_halls WHERE id = $1 FOR UPDATE"
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("cinema hall"))?;

        let rows = patch.rows.unwrap_or(current.rows);
        let seats_in_row = patch.seats_in_row.unwrap_or(current.seats_in_row);

        if rows < current.rows || seats_in_row < current.seats_in_row {
            let errors = SoldExtent::for_hall(&mut tx, id).await?.resize_errors(rows, seats_in_row);
            if !errors.is_empty() {
                return Err(ApiError::Validation(errors));
            }
        }

        let hall = sqlx::query_as::<_, CinemaHall>(
            "UPDATE cinema_halls
             SET name = COALESCE($2, name),
                 rows = $3,
                 seats_in_row = $4
             WHERE id = $1
             RETURNING id, name, rows, seats_in_row"
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(rows)
        .bind(seats_in_row)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(hall)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM cinema_halls WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}

impl From<CinemaHall> for CinemaHallResponse {
    fn from(hall: CinemaHall) -> Self {
        CinemaHallResponse {
            capacity: hall.capacity(),
            id: hall.id,
            name: hall.name,
            rows: hall.rows,
            seats_in_row: hall.seats_in_row,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_rows_times_seats() {
        let hall = CinemaHall { id: 1, name: "Blue".into(), rows: 5, seats_in_row: 10 };
        assert_eq!(hall.capacity(), 50);
        assert_eq!(CinemaHallResponse::from(hall).capacity, 50);
    }

    #[test]
    fn capacity_does_not_overflow_i32() {
        assert_eq!(capacity(i32::MAX, 2), i64::from(i32::MAX) * 2);
    }

    #[test]
    fn nothing_sold_fits_any_grid() {
        let sold = SoldExtent::default();
        assert!(sold.fits(1, 1));
        assert!(sold.resize_errors(1, 1).is_empty());
    }

    #[test]
    fn shrinking_below_a_sold_seat_names_the_field() {
        let sold = SoldExtent { max_row: Some(5), max_seat: Some(10) };
        assert!(sold.fits(5, 10));
        assert!(!sold.fits(4, 10));

        let errors = sold.resize_errors(1, 5);
        assert!(errors["rows"][0].contains("row 5"));
        assert!(errors["seats_in_row"][0].contains("seat 10"));

        let errors = sold.resize_errors(5, 9);
        assert!(!errors.contains_key("rows"));
        assert!(errors.contains_key("seats_in_row"));
    }

    #[test]
    fn zero_rows_are_rejected() {
        let payload = CinemaHallPayload { name: "Red".into(), rows: 0, seats_in_row: 12 };
        assert!(payload.validate().is_err());
    }
}
