#![allow(dead_code)]

use cinema_booking::{
    build_router,
    config::{AppConfig, Config, DatabaseConfig, LogFormat},
    database::Database,
    models::User,
    AppState,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{json, Value};
use sqlx::PgPool;

pub const PASSWORD: &str = "popcorn-and-nachos";

pub struct TestApp {
    pub address: String,
    pub pool: PgPool,
    pub client: Client,
}

fn test_config() -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            environment: "test".into(),
            rust_log: "cinema_booking=debug".into(),
            log_format: LogFormat::Pretty,
        },
        database: DatabaseConfig {
            url: String::new(),
            pool_size: 5,
            acquire_timeout_seconds: 5,
            run_migrations: false,
        },
    }
}

/// Serves the app on a random local port against an already migrated pool.
pub async fn spawn_app(pool: PgPool) -> TestApp {
    let state = AppState::new(Database::from_pool(pool.clone()), test_config());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server crashed");
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client: Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    pub async fn create_user(&self, email: &str) -> User {
        User::create(&self.pool, email, PASSWORD, 4)
            .await
            .expect("Failed to create user")
    }

    pub fn as_user(&self, request: RequestBuilder, email: &str) -> RequestBuilder {
        request.basic_auth(email, Some(PASSWORD))
    }

    pub async fn post(&self, path: &str, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn send(&self, method: Method, path: &str, body: Value) -> Response {
        self.client
            .request(method, self.url(path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, body: Value) -> Response {
        self.send(Method::PUT, path, body).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Response {
        self.send(Method::PATCH, path, body).await
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn status_of(&self, path: &str) -> u16 {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
            .status()
            .as_u16()
    }

    pub async fn get_json(&self, path: &str) -> Value {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request");
        assert!(res.status().is_success(), "GET {} -> {}", path, res.status());
        res.json().await.expect("Failed to parse body")
    }

    /// POSTs and returns the new object's id, asserting 201.
    pub async fn create(&self, path: &str, body: Value) -> i64 {
        let res = self.post(path, body).await;
        assert_eq!(res.status().as_u16(), 201, "POST {}", path);
        let body: Value = res.json().await.expect("Failed to parse body");
        body["id"].as_i64().expect("id in response")
    }

    pub async fn create_genre(&self, name: &str) -> i64 {
        self.create("/genres", json!({ "name": name })).await
    }

    pub async fn create_actor(&self, first_name: &str, last_name: &str) -> i64 {
        self.create("/actors", json!({ "first_name": first_name, "last_name": last_name }))
            .await
    }

    pub async fn create_hall(&self, name: &str, rows: i32, seats_in_row: i32) -> i64 {
        self.create(
            "/cinema_halls",
            json!({ "name": name, "rows": rows, "seats_in_row": seats_in_row }),
        )
        .await
    }

    pub async fn create_movie(&self, title: &str, genres: &[i64], actors: &[i64]) -> i64 {
        self.create(
            "/movies",
            json!({
                "title": title,
                "description": "",
                "duration": 120,
                "genres": genres,
                "actors": actors,
            }),
        )
        .await
    }

    pub async fn create_session(&self, movie: i64, hall: i64, show_time: &str) -> i64 {
        self.create(
            "/movie_sessions",
            json!({ "show_time": show_time, "movie": movie, "cinema_hall": hall }),
        )
        .await
    }

    pub async fn order(&self, email: &str, tickets: Value) -> Response {
        self.as_user(self.client.post(self.url("/orders")), email)
            .json(&json!({ "tickets": tickets }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Books `seats` of `session` for `email`, asserting 201, and returns the order body.
    pub async fn book(&self, email: &str, session: i64, seats: &[(i32, i32)]) -> Value {
        let tickets: Vec<Value> = seats
            .iter()
            .map(|&(row, seat)| json!({ "row": row, "seat": seat, "movie_session": session }))
            .collect();
        let res = self.order(email, json!(tickets)).await;
        assert_eq!(res.status().as_u16(), 201, "booking {:?}", seats);
        res.json().await.expect("Failed to parse body")
    }

    pub async fn ticket_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tickets")
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count tickets")
    }
}
