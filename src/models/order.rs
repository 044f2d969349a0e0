use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;

use crate::models::cinema_hall;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Session summary embedded in every ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: i64,
    pub show_time: DateTime<Utc>,
    pub movie_title: String,
    pub cinema_hall_name: String,
    pub cinema_hall_capacity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketResponse {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub movie_session: SessionSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: i64,
    pub tickets: Vec<TicketResponse>,
    pub created_at: DateTime<Utc>,
}

/// One joined row per ticket; ticket columns are NULL for an order without tickets.
#[derive(Debug, FromRow)]
struct OrderTicketRow {
    order_id: i64,
    created_at: DateTime<Utc>,
    ticket_id: Option<i64>,
    row: Option<i32>,
    seat: Option<i32>,
    session_id: Option<i64>,
    show_time: Option<DateTime<Utc>>,
    movie_title: Option<String>,
    cinema_hall_name: Option<String>,
    hall_rows: Option<i32>,
    hall_seats_in_row: Option<i32>,
}

const ORDER_SELECT: &str = "
    SELECT o.id AS order_id, o.created_at,
           t.id AS ticket_id, t.row, t.seat,
           ms.id AS session_id, ms.show_time,
           m.title AS movie_title,
           ch.name AS cinema_hall_name,
           ch.rows AS hall_rows, ch.seats_in_row AS hall_seats_in_row
    FROM orders o
    LEFT JOIN tickets t ON t.order_id = o.id
    LEFT JOIN movie_sessions ms ON ms.id = t.movie_session_id
    LEFT JOIN movies m ON m.id = ms.movie_id
    LEFT JOIN cinema_halls ch ON ch.id = ms.cinema_hall_id";

impl OrderTicketRow {
    fn ticket(&self) -> Option<TicketResponse> {
        Some(TicketResponse {
            id: self.ticket_id?,
            row: self.row?,
            seat: self.seat?,
            movie_session: SessionSummary {
                id: self.session_id?,
                show_time: self.show_time?,
                movie_title: self.movie_title.clone()?,
                cinema_hall_name: self.cinema_hall_name.clone()?,
                cinema_hall_capacity: cinema_hall::capacity(self.hall_rows?, self.hall_seats_in_row?),
            },
        })
    }
}

/// Folds joined rows (ordered by order id, ticket id) into nested orders.
fn group_orders(rows: Vec<OrderTicketRow>) -> Vec<OrderResponse> {
    let mut orders: BTreeMap<i64, OrderResponse> = BTreeMap::new();

    for row in rows {
        let ticket = row.ticket();
        let order = orders.entry(row.order_id).or_insert_with(|| OrderResponse {
            id: row.order_id,
            tickets: Vec::new(),
            created_at: row.created_at,
        });
        if let Some(ticket) = ticket {
            order.tickets.push(ticket);
        }
    }

    orders.into_values().collect()
}

impl Order {
    /// Orders of `user_id` in insertion order.
    pub async fn list_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<OrderResponse>, sqlx::Error> {
        let query = format!("{} WHERE o.user_id = $1 ORDER BY o.id, t.id", ORDER_SELECT);
        let rows = sqlx::query_as::<_, OrderTicketRow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await?;

        Ok(group_orders(rows))
    }

    /// A single order, only if it belongs to `user_id`.
    pub async fn find_for_user(
        pool: &PgPool,
        user_id: i64,
        order_id: i64,
    ) -> Result<Option<OrderResponse>, sqlx::Error> {
        let query = format!(
            "{} WHERE o.user_id = $1 AND o.id = $2 ORDER BY t.id",
            ORDER_SELECT
        );
        let rows = sqlx::query_as::<_, OrderTicketRow>(&query)
            .bind(user_id)
            .bind(order_id)
            .fetch_all(pool)
            .await?;

        Ok(group_orders(rows).pop())
    }
}
