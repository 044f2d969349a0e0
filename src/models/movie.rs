use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use validator::Validate;

use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::models::{invalid_pk, missing_ids, parse_ids, unique_ids, Actor, Genre};
use crate::models::actor::ActorResponse;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration: i32,
}

/// A movie together with its genres and actors, both ordered by id.
#[derive(Debug, Clone)]
pub struct MovieWithRelations {
    pub movie: Movie,
    pub genres: Vec<Genre>,
    pub actors: Vec<Actor>,
}

/// List shape: related entities as plain strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieListItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration: i32,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
}

/// Detail shape: related entities fully expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetail {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration: i32,
    pub genres: Vec<Genre>,
    pub actors: Vec<ActorResponse>,
}

/// Write shape: related entities as ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub duration: i32,
    pub genres: Vec<i64>,
    pub actors: Vec<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MoviePayload {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1, message = "duration must be a positive number of minutes"))]
    pub duration: i32,
    #[serde(default)]
    pub genres: Vec<i64>,
    #[serde(default)]
    pub actors: Vec<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct MoviePatch {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "duration must be a positive number of minutes"))]
    pub duration: Option<i32>,
    pub genres: Option<Vec<i64>>,
    pub actors: Option<Vec<i64>>,
}

impl From<MoviePayload> for MoviePatch {
    fn from(payload: MoviePayload) -> Self {
        MoviePatch {
            title: Some(payload.title),
            description: Some(payload.description),
            duration: Some(payload.duration),
            genres: Some(payload.genres),
            actors: Some(payload.actors),
        }
    }
}

/// Query-string filters for the movie list.
///
/// Unparsable ids are dropped; a filter whose ids were all dropped is absent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MovieFilter {
    pub title: Option<String>,
    pub genres: Vec<i64>,
    pub actors: Vec<i64>,
}

impl MovieFilter {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut filter = MovieFilter::default();

        for (key, value) in pairs {
            match key.as_str() {
                "title" => {
                    let title = value.trim();
                    if !title.is_empty() {
                        filter.title = Some(title.to_string());
                    }
                }
                "genres" => filter.genres.extend(parse_ids(value)),
                "actors" => filter.actors.extend(parse_ids(value)),
                _ => {}
            }
        }

        filter.genres = unique_ids(&filter.genres);
        filter.actors = unique_ids(&filter.actors);
        filter
    }
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards in it escaped.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl MovieWithRelations {
    pub fn into_list_item(self) -> MovieListItem {
        MovieListItem {
            genres: self.genres.into_iter().map(|g| g.name).collect(),
            actors: self.actors.iter().map(Actor::full_name).collect(),
            id: self.movie.id,
            title: self.movie.title,
            description: self.movie.description,
            duration: self.movie.duration,
        }
    }

    pub fn into_detail(self) -> MovieDetail {
        MovieDetail {
            genres: self.genres,
            actors: self.actors.into_iter().map(ActorResponse::from).collect(),
            id: self.movie.id,
            title: self.movie.title,
            description: self.movie.description,
            duration: self.movie.duration,
        }
    }

    pub fn into_response(self) -> MovieResponse {
        MovieResponse {
            genres: self.genres.iter().map(|g| g.id).collect(),
            actors: self.actors.iter().map(|a| a.id).collect(),
            id: self.movie.id,
            title: self.movie.title,
            description: self.movie.description,
            duration: self.movie.duration,
        }
    }
}

impl Movie {
    pub async fn list(pool: &PgPool, filter: &MovieFilter) -> Result<Vec<MovieWithRelations>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT m.id, m.title, m.description, m.duration FROM movies m WHERE TRUE"
        );

        if let Some(title) = &filter.title {
            query
                .push(" AND m.title ILIKE ")
                .push_bind(contains_pattern(title))
                .push(" ESCAPE '\\'");
        }
        // EXISTS keeps each movie once no matter how many of its genres/actors match.
        if !filter.genres.is_empty() {
            query
                .push(" AND EXISTS (SELECT 1 FROM movie_genres mg WHERE mg.movie_id = m.id AND mg.genre_id = ANY(")
                .push_bind(filter.genres.clone())
                .push("))");
        }
        if !filter.actors.is_empty() {
            query
                .push(" AND EXISTS (SELECT 1 FROM movie_actors ma WHERE ma.movie_id = m.id AND ma.actor_id = ANY(")
                .push_bind(filter.actors.clone())
                .push("))");
        }
        query.push(" ORDER BY m.id");

        let movies = query.build_query_as::<Movie>().fetch_all(pool).await?;

        let mut conn = pool.acquire().await?;
        Self::attach_relations(&mut conn, movies).await
    }

    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<MovieWithRelations>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::find_with(&mut conn, id).await
    }

    async fn find_with(conn: &mut PgConnection, id: i64) -> Result<Option<MovieWithRelations>, sqlx::Error> {
        let movie = sqlx::query_as::<_, Movie>(
            "SELECT id, title, description, duration FROM movies WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match movie {
            Some(movie) => Ok(Self::attach_relations(conn, vec![movie]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn attach_relations(
        conn: &mut PgConnection,
        movies: Vec<Movie>,
    ) -> Result<Vec<MovieWithRelations>, sqlx::Error> {
        if movies.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = movies.iter().map(|m| m.id).collect();

        let genre_rows = sqlx::query_as::<_, (i64, i64, String)>(
            "SELECT mg.movie_id, g.id, g.name
             FROM movie_genres mg
             JOIN genres g ON g.id = mg.genre_id
             WHERE mg.movie_id = ANY($1)
             ORDER BY g.id"
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let actor_rows = sqlx::query_as::<_, (i64, i64, String, String)>(
            "SELECT ma.movie_id, a.id, a.first_name, a.last_name
             FROM movie_actors ma
             JOIN actors a ON a.id = ma.actor_id
             WHERE ma.movie_id = ANY($1)
             ORDER BY a.id"
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut genres: HashMap<i64, Vec<Genre>> = HashMap::new();
        for (movie_id, id, name) in genre_rows {
            genres.entry(movie_id).or_default().push(Genre { id, name });
        }

        let mut actors: HashMap<i64, Vec<Actor>> = HashMap::new();
        for (movie_id, id, first_name, last_name) in actor_rows {
            actors
                .entry(movie_id)
                .or_default()
                .push(Actor { id, first_name, last_name });
        }

        Ok(movies
            .into_iter()
            .map(|movie| MovieWithRelations {
                genres: genres.remove(&movie.id).unwrap_or_default(),
                actors: actors.remove(&movie.id).unwrap_or_default(),
                movie,
            })
            .collect())
    }

    pub async fn create(pool: &PgPool, payload: &MoviePayload) -> ApiResult<MovieWithRelations> {
        let mut tx = pool.begin().await?;

        check_related(&mut tx, Some(&payload.genres), Some(&payload.actors)).await?;

        let movie = sqlx::query_as::<_, Movie>(
            "INSERT INTO movies (title, description, duration) VALUES ($1, $2, $3)
             RETURNING id, title, description, duration"
        )
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(payload.duration)
        .fetch_one(&mut *tx)
        .await?;

        replace_links(&mut tx, movie.id, Some(&payload.genres), Some(&payload.actors)).await?;

        let created = Self::attach_relations(&mut tx, vec![movie]).await?.pop();
        tx.commit().await?;

        created.ok_or(ApiError::NotFound("movie"))
    }

    pub async fn update(pool: &PgPool, id: i64, patch: &MoviePatch) -> ApiResult<MovieWithRelations> {
        let mut tx = pool.begin().await?;

        let updated = sqlx::query_scalar::<_, i64>(
            "UPDATE movies
             SET title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 duration = COALESCE($4, duration)
             WHERE id = $1
             RETURNING id"
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.duration)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Err(ApiError::NotFound("movie"));
        }

        check_related(&mut tx, patch.genres.as_deref(), patch.actors.as_deref()).await?;
        replace_links(&mut tx, id, patch.genres.as_deref(), patch.actors.as_deref()).await?;

        let movie = Self::find_with(&mut tx, id).await?;
        tx.commit().await?;

        movie.ok_or(ApiError::NotFound("movie"))
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}

async fn check_related(
    conn: &mut PgConnection,
    genres: Option<&[i64]>,
    actors: Option<&[i64]>,
) -> ApiResult<()> {
    let mut errors = FieldErrors::new();

    for (field, table, ids) in [("genres", "genres", genres), ("actors", "actors", actors)] {
        let Some(ids) = ids else { continue };
        let missing = missing_ids(&mut *conn, table, ids).await?;
        if !missing.is_empty() {
            errors.insert(field.to_string(), missing.into_iter().map(invalid_pk).collect());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Replaces the genre/actor links of a movie; `None` leaves that side untouched.
async fn replace_links(
    conn: &mut PgConnection,
    movie_id: i64,
    genres: Option<&[i64]>,
    actors: Option<&[i64]>,
) -> Result<(), sqlx::Error> {
    if let Some(genres) = genres {
        sqlx::query("DELETE FROM movie_genres WHERE movie_id = $1")
            .bind(movie_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query(
            "INSERT INTO movie_genres (movie_id, genre_id)
             SELECT $1, UNNEST($2::bigint[])"
        )
        .bind(movie_id)
        .bind(unique_ids(genres))
        .execute(&mut *conn)
        .await?;
    }

    if let Some(actors) = actors {
        sqlx::query("DELETE FROM movie_actors WHERE movie_id = $1")
            .bind(movie_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query(
            "INSERT INTO movie_actors (movie_id, actor_id)
             SELECT $1, UNNEST($2::bigint[])"
        )
        .bind(movie_id)
        .bind(unique_ids(actors))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
