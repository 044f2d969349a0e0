use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Actor {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

/// Actor as rendered by the API, with the derived `full_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ActorPayload {
    #[validate(length(min = 1, max = 255, message = "first_name must be 1-255 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255, message = "last_name must be 1-255 characters"))]
    pub last_name: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ActorPatch {
    #[validate(length(min = 1, max = 255, message = "first_name must be 1-255 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 255, message = "last_name must be 1-255 characters"))]
    pub last_name: Option<String>,
}

impl From<ActorPayload> for ActorPatch {
    fn from(payload: ActorPayload) -> Self {
        ActorPatch {
            first_name: Some(payload.first_name),
            last_name: Some(payload.last_name),
        }
    }
}

impl Actor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Actor>, sqlx::Error> {
        sqlx::query_as::<_, Actor>("SELECT id, first_name, last_name FROM actors ORDER BY id")
            .fetch_all(pool)
            .await
    }

    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<Actor>, sqlx::Error> {
        sqlx::query_as::<_, Actor>("SELECT id, first_name, last_name FROM actors WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &PgPool, payload: &ActorPayload) -> Result<Actor, sqlx::Error> {
        sqlx::query_as::<_, Actor>(
            "INSERT INTO actors (first_name, last_name) VALUES ($1, $2)
             RETURNING id, first_name, last_name"
        )
        .bind(&payload.first_name)
        .bind(&payload.last_name)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &PgPool, id: i64, patch: &ActorPatch) -> Result<Option<Actor>, sqlx::Error> {
        sqlx::query_as::<_, Actor>(
            "UPDATE actors
             SET first_name = COALESCE($2, first_name),
                 last_name = COALESCE($3, last_name)
             WHERE id = $1
             RETURNING id, first_name, last_name"
        )
        .bind(id)
        .bind(patch.first_name.as_deref())
        .bind(patch.last_name.as_deref())
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query("DELETE FROM actors WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected() > 0)
    }
}

impl From<Actor> for ActorResponse {
    fn from(actor: Actor) -> Self {
        let full_name = actor.full_name();
        ActorResponse {
            id: actor.id,
            first_name: actor.first_name,
            last_name: actor.last_name,
            full_name,
        }
    }
}
