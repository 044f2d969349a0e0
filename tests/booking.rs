mod common;

use common::spawn_app;
use serde_json::{json, Value};
use sqlx::PgPool;

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn booking_reduces_available_tickets(pool: PgPool) {
    let app = spawn_app(pool).await;
    app.create_user("viewer@example.com").await;
    let hall = app.create_hall("Blue", 5, 10).await;
    let movie = app.create_movie("Alien", &[], &[]).await;
    let session = app.create_session(movie, hall, "2024-05-01T19:00:00Z").await;

    let res = app
        .order(
            "viewer@example.com",
            json!([
                { "row": 1, "seat": 1, "movie_session": session },
                { "row": 1, "seat": 2, "movie_session": session },
            ]),
        )
        .await;
    assert_eq!(res.status().as_u16(), 201);
    let order: Value = res.json().await.unwrap();
    assert_eq!(order["tickets"].as_array().unwrap().len(), 2);
    assert_eq!(order["tickets"][0]["movie_session"]["movie_title"], "Alien");

    let sessions = app.get_json("/movie_sessions").await;
    assert_eq!(sessions[0]["tickets_available"], 48);

    let detail = app.get_json(&format!("/movie_sessions/{}", session)).await;
    assert_eq!(
        detail["taken_places"],
        json!([{ "row": 1, "seat": 1 }, { "row": 1, "seat": 2 }])
    );
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn taken_seat_cannot_be_booked_again(pool: PgPool) {
    let app = spawn_app(pool).await;
    app.create_user("first@example.com").await;
    app.create_user("second@example.com").await;
    let hall = app.create_hall("Blue", 5, 10).await;
    let movie = app.create_movie("Alien", &[], &[]).await;
    let session = app.create_session(movie, hall, "2024-05-01T19:00:00Z").await;

    let seat = json!([{ "row": 3, "seat": 4, "movie_session": session }]);
    assert_eq!(app.order("first@example.com", seat.clone()).await.status().as_u16(), 201);

    let res = app.order("second@example.com", seat).await;
    assert_eq!(res.status().as_u16(), 409);
    assert_eq!(app.ticket_count().await, 1);
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn one_bad_ticket_books_nothing(pool: PgPool) {
    let app = spawn_app(pool).await;
    app.create_user("viewer@example.com").await;
    let hall = app.create_hall("Blue", 5, 10).await;
    let movie = app.create_movie("Alien", &[], &[]).await;
    let session = app.create_session(movie, hall, "2024-05-01T19:00:00Z").await;

    let res = app
        .order(
            "viewer@example.com",
            json!([
                { "row": 1, "seat": 1, "movie_session": session },
                { "row": 6, "seat": 1, "movie_session": session },
            ]),
        )
        .await;
    assert_eq!(res.status().as_u16(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["errors"]["tickets[1].row"].is_array());

    assert_eq!(app.ticket_count().await, 0);
    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(orders, 0);
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_orders_for_one_seat_succeed_once(pool: PgPool) {
    let app = spawn_app(pool).await;
    let emails: Vec<String> = (0..8).map(|i| format!("viewer{}@example.com", i)).collect();
    for email in &emails {
        app.create_user(email).await;
    }
    let hall = app.create_hall("Blue", 5, 10).await;
    let movie = app.create_movie("Alien", &[], &[]).await;
    let session = app.create_session(movie, hall, "2024-05-01T19:00:00Z").await;

    let attempts = emails.iter().map(|email| {
        app.order(email, json!([{ "row": 2, "seat": 5, "movie_session": session }]))
    });
    let statuses: Vec<u16> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|res| res.status().as_u16())
        .collect();

    assert_eq!(statuses.iter().filter(|&&s| s == 201).count(), 1);
    assert!(statuses.iter().all(|&s| s == 201 || s == 409));
    assert_eq!(app.ticket_count().await, 1);
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn orders_require_credentials(pool: PgPool) {
    let app = spawn_app(pool).await;
    app.create_user("viewer@example.com").await;

    let res = app.client.get(app.url("/orders")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 401);
    assert!(res.headers().contains_key("www-authenticate"));

    let res = app
        .client
        .get(app.url("/orders"))
        .basic_auth("viewer@example.com", Some("wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn users_only_see_their_own_orders(pool: PgPool) {
    let app = spawn_app(pool).await;
    app.create_user("alice@example.com").await;
    app.create_user("bob@example.com").await;
    let hall = app.create_hall("Blue", 5, 10).await;
    let movie = app.create_movie("Alien", &[], &[]).await;
    let session = app.create_session(movie, hall, "2024-05-01T19:00:00Z").await;

    let res = app
        .order("alice@example.com", json!([{ "row": 1, "seat": 1, "movie_session": session }]))
        .await;
    let order: Value = res.json().await.unwrap();
    let order_id = order["id"].as_i64().unwrap();

    let bob_orders: Value = app
        .as_user(app.client.get(app.url("/orders")), "bob@example.com")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(bob_orders, json!([]));

    let res = app
        .as_user(app.client.get(app.url(&format!("/orders/{}", order_id))), "bob@example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 404);

    let alice_orders: Value = app
        .as_user(app.client.get(app.url("/orders")), "alice@example.com")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alice_orders[0]["id"], order_id);
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn own_order_can_be_fetched_by_id(pool: PgPool) {
    let app = spawn_app(pool).await;
    app.create_user("viewer@example.com").await;
    let hall = app.create_hall("Blue", 5, 10).await;
    let movie = app.create_movie("Alien", &[], &[]).await;
    let session = app.create_session(movie, hall, "2024-05-01T19:00:00Z").await;

    let created = app.book("viewer@example.com", session, &[(2, 3), (2, 4)]).await;
    let order_id = created["id"].as_i64().unwrap();

    let res = app
        .as_user(app.client.get(app.url(&format!("/orders/{}", order_id))), "viewer@example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let order: Value = res.json().await.unwrap();
    assert_eq!(order, created);
    assert_eq!(order["tickets"][1]["seat"], 4);
    assert_eq!(order["tickets"][0]["movie_session"]["cinema_hall_capacity"], 50);
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn hall_cannot_shrink_below_sold_seats(pool: PgPool) {
    let app = spawn_app(pool).await;
    app.create_user("viewer@example.com").await;
    let hall = app.create_hall("Blue", 5, 10).await;
    let movie = app.create_movie("Alien", &[], &[]).await;
    let session = app.create_session(movie, hall, "2024-05-01T19:00:00Z").await;
    let row_five: Vec<(i32, i32)> = (1..=10).map(|seat| (5, seat)).collect();
    app.book("viewer@example.com", session, &row_five).await;

    let path = format!("/cinema_halls/{}", hall);
    let res = app.patch(&path, json!({ "rows": 1, "seats_in_row": 5 })).await;
    assert_eq!(res.status().as_u16(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["errors"]["rows"].is_array());
    assert!(body["errors"]["seats_in_row"].is_array());

    let res = app.put(&path, json!({ "name": "Blue", "rows": 5, "seats_in_row": 9 })).await;
    assert_eq!(res.status().as_u16(), 400);

    let unchanged = app.get_json(&path).await;
    assert_eq!(unchanged["capacity"], 50);
    let sessions = app.get_json("/movie_sessions").await;
    assert_eq!(sessions[0]["tickets_available"], 40);

    // Growing, or shrinking down to the last sold seat, is fine
    let res = app.patch(&path, json!({ "rows": 6 })).await;
    assert_eq!(res.status().as_u16(), 200);
    let res = app.patch(&path, json!({ "rows": 5, "seats_in_row": 10 })).await;
    assert_eq!(res.status().as_u16(), 200);
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn session_cannot_move_to_a_hall_too_small_for_sold_seats(pool: PgPool) {
    let app = spawn_app(pool).await;
    app.create_user("viewer@example.com").await;
    let blue = app.create_hall("Blue", 5, 10).await;
    let small = app.create_hall("Small", 2, 2).await;
    let wide = app.create_hall("Wide", 4, 20).await;
    let movie = app.create_movie("Alien", &[], &[]).await;
    let session = app.create_session(movie, blue, "2024-05-01T19:00:00Z").await;
    app.book("viewer@example.com", session, &[(4, 8)]).await;

    let path = format!("/movie_sessions/{}", session);
    let res = app.patch(&path, json!({ "cinema_hall": small })).await;
    assert_eq!(res.status().as_u16(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["errors"]["cinema_hall"].is_array());
    assert_eq!(app.get_json(&path).await["cinema_hall"]["id"], blue);

    let res = app.patch(&path, json!({ "cinema_hall": wide })).await;
    assert_eq!(res.status().as_u16(), 200);
    let sessions = app.get_json("/movie_sessions").await;
    assert_eq!(sessions[0]["tickets_available"], 79);
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn deleting_a_hall_removes_its_sessions_and_tickets(pool: PgPool) {
    let app = spawn_app(pool).await;
    app.create_user("viewer@example.com").await;
    let doomed = app.create_hall("Blue", 5, 10).await;
    let kept = app.create_hall("Red", 3, 3).await;
    let movie = app.create_movie("Alien", &[], &[]).await;
    let gone = app.create_session(movie, doomed, "2024-05-01T19:00:00Z").await;
    let stays = app.create_session(movie, kept, "2024-05-01T21:00:00Z").await;
    app.book("viewer@example.com", gone, &[(1, 1), (1, 2)]).await;
    app.book("viewer@example.com", stays, &[(1, 1)]).await;

    let res = app.delete(&format!("/cinema_halls/{}", doomed)).await;
    assert_eq!(res.status().as_u16(), 204);

    assert_eq!(app.status_of(&format!("/movie_sessions/{}", gone)).await, 404);
    assert_eq!(app.status_of(&format!("/movie_sessions/{}", stays)).await, 200);
    assert_eq!(app.ticket_count().await, 1);

    // Deleting the movie takes its remaining session with it
    assert_eq!(app.delete(&format!("/movies/{}", movie)).await.status().as_u16(), 204);
    assert_eq!(app.status_of(&format!("/movie_sessions/{}", stays)).await, 404);
    assert_eq!(app.ticket_count().await, 0);
}
