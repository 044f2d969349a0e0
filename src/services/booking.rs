//! booking.rs
//!
//! Order creation: one order, many tickets, all or nothing.
//!
//! Flow inside a single transaction:
//! 1. Lock the referenced `movie_sessions` rows (`FOR UPDATE`) so concurrent
//!    orders for the same session queue up behind each other. Their halls
//!    are share-locked so a resize waits until the order is done.
//! 2. Check every requested seat against its hall bounds, against tickets
//!    already sold, and against the other seats of the same request.
//! 3. Insert the order and all tickets with one statement.
//!
//! The `UNIQUE (movie_session_id, row, seat)` constraint on `tickets` is the
//! final guard: if it fires anyway the transaction is rolled back and the
//! caller gets a 409.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use validator::Validate;

use crate::database::{violated_constraint, UNIQUE_VIOLATION};
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::models::order::OrderResponse;
use crate::models::{invalid_pk, unique_ids, Order};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TicketRequest {
    #[validate(range(min = 1, message = "row must be a positive number"))]
    pub row: i32,
    #[validate(range(min = 1, message = "seat must be a positive number"))]
    pub seat: i32,
    pub movie_session: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "an order needs at least one ticket"), nested)]
    pub tickets: Vec<TicketRequest>,
}

/// Seat grid of the hall a session plays in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HallBounds {
    pub rows: i32,
    pub seats_in_row: i32,
}

/// A (session, row, seat) triple.
pub type Place = (i64, i32, i32);

/// Checks a ticket batch against hall bounds and occupied places.
///
/// Unknown sessions and out-of-range coordinates are reported as
/// [`ApiError::Validation`]; if the batch is otherwise well-formed but asks for
/// an occupied place (or the same place twice) it is an [`ApiError::Conflict`].
pub fn check_tickets(
    tickets: &[TicketRequest],
    halls: &HashMap<i64, HallBounds>,
    taken: &HashSet<Place>,
) -> ApiResult<()> {
    let mut invalid = FieldErrors::new();
    let mut conflicts = FieldErrors::new();
    let mut requested: HashSet<Place> = HashSet::with_capacity(tickets.len());

    for (index, ticket) in tickets.iter().enumerate() {
        let field = |name: &str| format!("tickets[{}].{}", index, name);

        let Some(hall) = halls.get(&ticket.movie_session) else {
            invalid.insert(field("movie_session"), vec![invalid_pk(ticket.movie_session)]);
            continue;
        };

        let mut in_range = true;
        if !(1..=hall.rows).contains(&ticket.row) {
            invalid.insert(
                field("row"),
                vec![format!(
                    "row number must be in available range: (1, rows): (1, {})",
                    hall.rows
                )],
            );
            in_range = false;
        }
        if !(1..=hall.seats_in_row).contains(&ticket.seat) {
            invalid.insert(
                field("seat"),
                vec![format!(
                    "seat number must be in available range: (1, seats_in_row): (1, {})",
                    hall.seats_in_row
                )],
            );
            in_range = false;
        }
        if !in_range {
            continue;
        }

        let place = (ticket.movie_session, ticket.row, ticket.seat);
        if taken.contains(&place) {
            conflicts.insert(
                format!("tickets[{}]", index),
                vec![format!(
                    "row {} seat {} is already taken for movie session {}",
                    ticket.row, ticket.seat, ticket.movie_session
                )],
            );
        } else if !requested.insert(place) {
            conflicts.insert(
                format!("tickets[{}]", index),
                vec![format!(
                    "row {} seat {} for movie session {} appears more than once in this order",
                    ticket.row, ticket.seat, ticket.movie_session
                )],
            );
        }
    }

    if !invalid.is_empty() {
        invalid.extend(conflicts);
        return Err(ApiError::Validation(invalid));
    }
    if !conflicts.is_empty() {
        return Err(ApiError::Conflict(conflicts));
    }
    Ok(())
}

/// Creates an order with all of its tickets for `user_id`, or nothing at all.
pub async fn create_order(
    pool: &PgPool,
    user_id: i64,
    request: &CreateOrderRequest,
) -> ApiResult<OrderResponse> {
    let session_ids = unique_ids(
        &request.tickets.iter().map(|t| t.movie_session).collect::<Vec<_>>(),
    );

    let mut tx = pool.begin().await?;

    // 1) Lock the sessions in id order and hold their halls' sizes steady
    let halls: HashMap<i64, HallBounds> = sqlx::query_as::<_, (i64, i32, i32)>(
        r#"
        SELECT ms.id, ch.rows, ch.seats_in_row
        FROM movie_sessions ms
        JOIN cinema_halls ch ON ch.id = ms.cinema_hall_id
        WHERE ms.id = ANY($1)
        ORDER BY ms.id
        FOR UPDATE OF ms
        FOR SHARE OF ch
        "#
    )
    .bind(&session_ids)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(|(id, rows, seats_in_row)| (id, HallBounds { rows, seats_in_row }))
    .collect();

    // 2) Which of the requested places are already sold
    let sessions: Vec<i64> = request.tickets.iter().map(|t| t.movie_session).collect();
    let rows: Vec<i32> = request.tickets.iter().map(|t| t.row).collect();
    let seats: Vec<i32> = request.tickets.iter().map(|t| t.seat).collect();

    let taken: HashSet<Place> = sqlx::query_as::<_, Place>(
        r#"
        SELECT t.movie_session_id, t.row, t.seat
        FROM tickets t
        JOIN UNNEST($1::bigint[], $2::int[], $3::int[]) AS wanted(session_id, seat_row, seat_no)
          ON t.movie_session_id = wanted.session_id
         AND t.row = wanted.seat_row
         AND t.seat = wanted.seat_no
        "#
    )
    .bind(&sessions)
    .bind(&rows)
    .bind(&seats)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();

    if let Err(rejection) = check_tickets(&request.tickets, &halls, &taken) {
        warn!("Order rejected for user {}: {}", user_id, rejection);
        tx.rollback().await?;
        return Err(rejection);
    }

    // 3) Order row, then every ticket in one statement
    let order_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO orders (user_id) VALUES ($1) RETURNING id"
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO tickets (order_id, movie_session_id, row, seat)
        SELECT $1, wanted.session_id, wanted.seat_row, wanted.seat_no
        FROM UNNEST($2::bigint[], $3::int[], $4::int[]) AS wanted(session_id, seat_row, seat_no)
        "#
    )
    .bind(order_id)
    .bind(&sessions)
    .bind(&rows)
    .bind(&seats)
    .execute(&mut *tx)
    .await;

    if let Err(e) = inserted {
        tx.rollback().await?;
        if violated_constraint(&e, UNIQUE_VIOLATION).is_some() {
            warn!("Concurrent booking won the race for user {}'s order", user_id);
            let mut errors = FieldErrors::new();
            errors.insert(
                "tickets".to_string(),
                vec!["one or more seats were booked by another order; please choose again".to_string()],
            );
            return Err(ApiError::Conflict(errors));
        }
        return Err(e.into());
    }

    tx.commit().await?;

    info!(
        "Order {} created for user {} with {} tickets",
        order_id,
        user_id,
        request.tickets.len()
    );

    committed_order(order_id, Order::find_for_user(pool, user_id, order_id).await?)
}

/// The read-back of an order that was just committed; it must exist.
fn committed_order(order_id: i64, found: Option<OrderResponse>) -> ApiResult<OrderResponse> {
    found.ok_or_else(|| {
        tracing::error!("Order {} vanished right after commit", order_id);
        ApiError::Database(sqlx::Error::RowNotFound)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ticket(row: i32, seat: i32, movie_session: i64) -> TicketRequest {
        TicketRequest { row, seat, movie_session }
    }

    fn hall_5x10() -> HashMap<i64, HallBounds> {
        HashMap::from([(1, HallBounds { rows: 5, seats_in_row: 10 })])
    }

    #[test]
    fn free_seats_in_range_pass() {
        let tickets = [ticket(1, 1, 1), ticket(1, 2, 1), ticket(5, 10, 1)];
        assert!(check_tickets(&tickets, &hall_5x10(), &HashSet::new()).is_ok());
    }

    #[test]
    fn taken_seat_is_a_conflict() {
        let taken = HashSet::from([(1, 1, 1)]);
        let err = check_tickets(&[ticket(1, 2, 1), ticket(1, 1, 1)], &hall_5x10(), &taken).unwrap_err();

        let ApiError::Conflict(fields) = err else {
            panic!("expected a conflict");
        };
        assert!(fields.contains_key("tickets[1]"));
        assert!(!fields.contains_key("tickets[0]"));
    }

    #[test]
    fn duplicate_seat_within_request_is_a_conflict() {
        let err = check_tickets(&[ticket(2, 3, 1), ticket(2, 3, 1)], &hall_5x10(), &HashSet::new())
            .unwrap_err();
        let ApiError::Conflict(fields) = err else {
            panic!("expected a conflict");
        };
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("tickets[1]"));
    }

    #[test]
    fn same_seat_in_different_sessions_is_fine() {
        let mut halls = hall_5x10();
        halls.insert(2, HallBounds { rows: 3, seats_in_row: 3 });
        assert!(check_tickets(&[ticket(1, 1, 1), ticket(1, 1, 2)], &halls, &HashSet::new()).is_ok());
    }

    #[test]
    fn out_of_range_coordinates_are_field_errors() {
        let err = check_tickets(&[ticket(6, 11, 1)], &hall_5x10(), &HashSet::new()).unwrap_err();
        let ApiError::Validation(fields) = err else {
            panic!("expected a validation error");
        };
        assert_eq!(
            fields["tickets[0].row"],
            vec!["row number must be in available range: (1, rows): (1, 5)".to_string()]
        );
        assert!(fields["tickets[0].seat"][0].contains("(1, 10)"));
    }

    #[test]
    fn unknown_session_is_a_field_error() {
        let err = check_tickets(&[ticket(1, 1, 99)], &hall_5x10(), &HashSet::new()).unwrap_err();
        let ApiError::Validation(fields) = err else {
            panic!("expected a validation error");
        };
        assert_eq!(fields["tickets[0].movie_session"], vec![invalid_pk(99)]);
    }

    #[test]
    fn invalid_ticket_outranks_conflicts() {
        let taken = HashSet::from([(1, 1, 1)]);
        let err = check_tickets(&[ticket(1, 1, 1), ticket(0, 1, 1)], &hall_5x10(), &taken).unwrap_err();
        let ApiError::Validation(fields) = err else {
            panic!("expected a validation error");
        };
        assert!(fields.contains_key("tickets[1].row"));
        assert!(fields.contains_key("tickets[0]"));
    }

    #[test]
    fn empty_order_fails_validation() {
        let request = CreateOrderRequest { tickets: Vec::new() };
        let ApiError::Validation(fields) = ApiError::from(request.validate().unwrap_err()) else {
            panic!("expected a validation error");
        };
        assert_eq!(fields["tickets"], vec!["an order needs at least one ticket".to_string()]);
    }

    #[test]
    fn nested_ticket_rules_report_indexed_paths() {
        let request = CreateOrderRequest { tickets: vec![ticket(1, 1, 1), ticket(0, 1, 1)] };
        let ApiError::Validation(fields) = ApiError::from(request.validate().unwrap_err()) else {
            panic!("expected a validation error");
        };
        assert!(fields.contains_key("tickets[1].row"));
        assert!(!fields.contains_key("tickets[0].row"));
    }

    #[test]
    fn missing_read_back_is_a_server_error() {
        let err = committed_order(42, None).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    proptest! {
        #[test]
        fn accepted_batches_never_double_book(
            picks in proptest::collection::vec((1i32..=5, 1i32..=10), 1..20),
            taken_picks in proptest::collection::vec((1i32..=5, 1i32..=10), 0..20),
        ) {
            let tickets: Vec<TicketRequest> = picks.iter().map(|&(r, s)| ticket(r, s, 1)).collect();
            let taken: HashSet<Place> = taken_picks.iter().map(|&(r, s)| (1, r, s)).collect();

            let requested: Vec<Place> = picks.iter().map(|&(r, s)| (1, r, s)).collect();
            let distinct: HashSet<Place> = requested.iter().copied().collect();
            let clean = distinct.len() == requested.len() && distinct.is_disjoint(&taken);

            let result = check_tickets(&tickets, &hall_5x10(), &taken);
            prop_assert_eq!(result.is_ok(), clean);
        }
    }
}
