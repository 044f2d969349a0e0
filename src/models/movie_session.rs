use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::models::cinema_hall::{self, CinemaHallResponse, SoldExtent};
use crate::models::movie::MovieListItem;
use crate::models::{invalid_pk, missing_ids, CinemaHall, Movie};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct MovieSession {
    pub id: i64,
    pub show_time: DateTime<Utc>,
    pub movie_id: i64,
    pub cinema_hall_id: i64,
}

/// Write shape: related entities as ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieSessionResponse {
    pub id: i64,
    pub show_time: DateTime<Utc>,
    pub movie: i64,
    pub cinema_hall: i64,
}

/// List shape, carrying the live seat count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieSessionListItem {
    pub id: i64,
    pub show_time: DateTime<Utc>,
    pub movie_title: String,
    pub cinema_hall_name: String,
    pub cinema_hall_capacity: i64,
    pub tickets_available: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromRow, Serialize, Deserialize)]
pub struct TakenPlace {
    pub row: i32,
    pub seat: i32,
}

/// Detail shape: movie and hall expanded, plus every booked seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSessionDetail {
    pub id: i64,
    pub show_time: DateTime<Utc>,
    pub movie: MovieListItem,
    pub cinema_hall: CinemaHallResponse,
    pub taken_places: Vec<TakenPlace>,
}

#[derive(Debug, FromRow)]
struct SessionListRow {
    id: i64,
    show_time: DateTime<Utc>,
    movie_title: String,
    cinema_hall_name: String,
    rows: i32,
    seats_in_row: i32,
    tickets_taken: i64,
}

/// Seats still bookable in a hall of `capacity` with `taken` tickets sold.
pub fn tickets_available(capacity: i64, taken: i64) -> i64 {
    capacity - taken
}

impl From<SessionListRow> for MovieSessionListItem {
    fn from(row: SessionListRow) -> Self {
        let capacity = cinema_hall::capacity(row.rows, row.seats_in_row);
        MovieSessionListItem {
            id: row.id,
            show_time: row.show_time,
            movie_title: row.movie_title,
            cinema_hall_name: row.cinema_hall_name,
            cinema_hall_capacity: capacity,
            tickets_available: tickets_available(capacity, row.tickets_taken),
        }
    }
}

impl From<MovieSession> for MovieSessionResponse {
    fn from(session: MovieSession) -> Self {
        MovieSessionResponse {
            id: session.id,
            show_time: session.show_time,
            movie: session.movie_id,
            cinema_hall: session.cinema_hall_id,
        }
    }
}

/// Show time accepted in bodies: RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM[:SS]` read as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowTime(pub DateTime<Utc>);

impl ShowTime {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(ShowTime(dt.with_timezone(&Utc)));
        }
        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| ShowTime(naive.and_utc()))
    }
}

impl<'de> Deserialize<'de> for ShowTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ShowTime::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid show_time {:?}, expected YYYY-MM-DDThh:mm[:ss][+HH:MM|Z]",
                raw
            ))
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct MovieSessionPayload {
    pub show_time: ShowTime,
    #[validate(range(min = 1, message = "movie must be a valid id"))]
    pub movie: i64,
    #[validate(range(min = 1, message = "cinema_hall must be a valid id"))]
    pub cinema_hall: i64,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct MovieSessionPatch {
    pub show_time: Option<ShowTime>,
    #[validate(range(min = 1, message = "movie must be a valid id"))]
    pub movie: Option<i64>,
    #[validate(range(min = 1, message = "cinema_hall must be a valid id"))]
    pub cinema_hall: Option<i64>,
}

impl From<MovieSessionPayload> for MovieSessionPatch {
    fn from(payload: MovieSessionPayload) -> Self {
        MovieSessionPatch {
            show_time: Some(payload.show_time),
            movie: Some(payload.movie),
            cinema_hall: Some(payload.cinema_hall),
        }
    }
}

/// Query-string filters for the session list. Values that do not parse are ignored.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionFilter {
    pub movie: Option<i64>,
    pub date: Option<NaiveDate>,
}

impl SessionFilter {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut filter = SessionFilter::default();

        for (key, value) in pairs {
            match key.as_str() {
                "movie" => filter.movie = value.trim().parse().ok(),
                "date" => filter.date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok(),
                _ => {}
            }
        }

        filter
    }
}

const LIST_SELECT: &str = "
    SELECT ms.id, ms.show_time,
           m.title AS movie_title,
           ch.name AS cinema_hall_name,
           ch.rows, ch.seats_in_row,
           (SELECT COUNT(*) FROM tickets t WHERE t.movie_session_id = ms.id) AS tickets_taken
    FROM movie_sessions ms
    JOIN movies m ON m.id = ms.movie_id
    JOIN cinema_halls ch ON ch.id = ms.cinema_hall_id
    WHERE TRUE";

impl MovieSession {
    pub async fn list(pool: &PgPool, filter: &SessionFilter) -> Result<Vec<MovieSessionListItem>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(LIST_SELECT);

        if let Some(movie_id) = filter.movie {
            query.push(" AND ms.movie_id = ").push_bind(movie_id);
        }
        if let Some(date) = filter.date {
            query
                .push(" AND (ms.show_time AT TIME ZONE 'UTC')::date = ")
                .push_bind(date);
        }
        query.push(" ORDER BY ms.id");

        let rows = query.build_query_as::<SessionListRow>().fetch_all(pool).await?;
        Ok(rows.into_iter().map(MovieSessionListItem::from).collect())
    }

    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<MovieSession>, sqlx::Error> {
        sqlx::query_as::<_, MovieSession>(
            "SELECT id, show_time, movie_id, cinema_hall_id FROM movie_sessions WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn detail(pool: &PgPool, id: i64) -> Result<Option<MovieSessionDetail>, sqlx::Error> {
        let Some(session) = Self::find(pool, id).await? else {
            return Ok(None);
        };

        let movie = Movie::find(pool, session.movie_id).await?;
        let hall = CinemaHall::find(pool, session.cinema_hall_id).await?;
        let (Some(movie), Some(hall)) = (movie, hall) else {
            // Cascading deletes remove the session together with its movie or hall.
            return Ok(None);
        };

        let taken_places = Self::taken_places(pool, id).await?;

        Ok(Some(MovieSessionDetail {
            id: session.id,
            show_time: session.show_time,
            movie: movie.into_list_item(),
            cinema_hall: hall.into(),
            taken_places,
        }))
    }

    pub async fn taken_places(pool: &PgPool, id: i64) -> Result<Vec<TakenPlace>, sqlx::Error> {
        sqlx::query_as::<_, TakenPlace>(
            "SELECT row, seat FROM tickets WHERE movie_session_id = $1 ORDER BY row, seat"
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &PgPool, payload: &MovieSessionPayload) -> ApiResult<MovieSession> {
        let mut conn = pool.acquire().await?;
        check_related(&mut conn, Some(payload.movie), Some(payload.cinema_hall)).await?;

        let session = sqlx::query_as::<_, MovieSession>(
            "INSERT INTO movie_sessions (show_time, movie_id, cinema_hall_id) VALUES ($1, $2, $3)
             RETURNING id, show_time, movie_id, cinema_hall_id"
        )
        .bind(payload.show_time.0)
        .bind(payload.movie)
        .bind(payload.cinema_hall)
        .fetch_one(&mut *conn)
        .await?;

        Ok(session)
    }

    /// Applies `patch`. Moving to another hall is refused when a sold seat
    /// would fall outside the new hall's grid.
    pub async fn update(pool: &PgPool, id: i64, patch: &MovieSessionPatch) -> ApiResult<MovieSession> {
        let mut tx = pool.begin().await?;

        // Same lock order as order creation: session first, then its hall
        let current = sqlx::query_as::<_, MovieSession>(
            "SELECT id, show_time, movie_id, cinema_hall_id FROM movie_sessions WHERE id = $1 FOR UPDATE"
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("movie session"))?;

        check_related(&mut tx, patch.movie, patch.cinema_hall).await?;

        if let Some(hall_id) = patch.cinema_hall.filter(|&h| h != current.cinema_hall_id) {
            let hall = sqlx::query_as::<_, CinemaHall>(
                "SELECT id, name, rows, seats_in_row FROM cinema_halls WHERE id = $1 FOR SHARE"
            )
            .bind(hall_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::field("cinema_hall", invalid_pk(hall_id)))?;

            let sold = SoldExtent::for_session(&mut tx, id).await?;
            if !sold.fits(hall.rows, hall.seats_in_row) {
                return Err(ApiError::field(
                    "cinema_hall",
                    format!(
                        "cinema hall {} ({} rows x {} seats) cannot hold the tickets already sold for this session",
                        hall.name, hall.rows, hall.seats_in_row
                    ),
                ));
            }
        }

        let session = sqlx::query_as::<_, MovieSession>(
            "UPDATE movie_sessions
             SET show_time = COALESCE($2, show_time),
                 movie_id = COALESCE($3, movie_id),
                 cinema_hall_id = COALESCE($4, cinema_hall_id)
             WHERE id = $1
             RETURNING id, show_time, movie_id, cinema_hall_id"
        )
        .bind(id)
        .bind(patch.show_time.map(|t| t.0))
        .bind(patch.movie)
        .bind(patch.cinema_hall)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(session)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM movie_sessions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}

async fn check_related(
    conn: &mut sqlx::PgConnection,
    movie: Option<i64>,
    cinema_hall: Option<i64>,
) -> ApiResult<()> {
    let mut errors = FieldErrors::new();

    for (field, table, id) in [("movie", "movies", movie), ("cinema_hall", "cinema_halls", cinema_hall)] {
        let Some(id) = id else { continue };
        if !missing_ids(&mut *conn, table, &[id]).await?.is_empty() {
            errors.insert(field.to_string(), vec![invalid_pk(id)]);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}
