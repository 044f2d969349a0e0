use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub registered_at: DateTime<Utc>,
}

impl User {
    // Active account with this email, if any
    pub async fn find_active_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, is_active, registered_at
             FROM users
             WHERE email = $1 AND is_active = true"
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Inserts a user, hashing `password` with bcrypt at `cost`.
    pub async fn create(
        pool: &PgPool,
        email: &str,
        password: &str,
        cost: u32,
    ) -> anyhow::Result<User> {
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, password_hash) VALUES ($1, $2)
             RETURNING id, email, password_hash, is_active, registered_at"
        )
        .bind(email.trim())
        .bind(password_hash)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    // bcrypt verification; a malformed stored hash counts as a mismatch
    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}
