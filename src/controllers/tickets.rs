use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::booking::{BookingError, BookingRequest};
use crate::models::Ticket;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets", get(get_my_tickets).post(book_tickets))
        .route("/tickets/cancel", patch(cancel_ticket))
        .route("/tickets/{ticket_id}", get(get_ticket))
}

/* ---------- helpers ---------- */

fn parse_body<T: Validate>(body: Result<Json<T>, JsonRejection>) -> Result<T, BookingError> {
    let Json(req) = body.map_err(|e| BookingError::InvalidRequest(e.body_text()))?;
    req.validate()
        .map_err(|e| BookingError::InvalidRequest(e.to_string()))?;
    Ok(req)
}

/* ---------- BOOKING ---------- */

// POST /api/tickets
#[derive(Debug, Deserialize, Validate)]
struct BookTicketsRequest {
    #[validate(range(min = 1, message = "session_id должен быть > 0"))]
    session_id: i64,
    #[validate(length(min = 1, message = "нужно указать хотя бы одно место"))]
    seat_numbers: Vec<i32>,
    #[validate(range(exclusive_min = 0.0, message = "total_price должен быть > 0"))]
    total_price: Option<f64>,
}

async fn book_tickets(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
    body: Result<Json<BookTicketsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let req = parse_body(body)?;
    let request = BookingRequest {
        session_id: req.session_id,
        seat_numbers: req.seat_numbers,
        total_price: req.total_price,
    };

    let result = state.engine.book(user.user_id, &request).await?;
    state.cache.invalidate_availability_after_write(request.session_id).await;

    Ok((StatusCode::CREATED, Json(result)))
}

// GET /api/tickets
async fn get_my_tickets(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
) -> Result<impl IntoResponse, BookingError> {
    let tickets = state.engine.tickets_for_user(user.user_id).await?;
    Ok((StatusCode::OK, Json(tickets)))
}

// GET /api/tickets/{ticket_id}
async fn get_ticket(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
    Path(ticket_id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    let ticket = state.engine.ticket(ticket_id).await?;
    if ticket.user_id != user.user_id {
        return Err(BookingError::NotTicketOwner(ticket_id));
    }
    Ok((StatusCode::OK, Json(ticket)))
}

/* ---------- CANCELLATION ---------- */

// PATCH /api/tickets/cancel
#[derive(Debug, Deserialize, Validate)]
struct CancelTicketRequest {
    #[validate(range(min = 1, message = "ticket_id должен быть > 0"))]
    ticket_id: i64,
}

#[derive(Debug, Serialize)]
struct CancelTicketResponse {
    message: &'static str,
    ticket: Ticket,
}

async fn cancel_ticket(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
    body: Result<Json<CancelTicketRequest>, JsonRejection>,
) -> Result<impl IntoResponse, BookingError> {
    let req = parse_body(body)?;

    let ticket = state.engine.cancel_for(req.ticket_id, user.user_id).await?;
    state.cache.invalidate_availability_after_write(ticket.session_id).await;

    Ok((
        StatusCode::OK,
        Json(CancelTicketResponse {
            message: "Бронирование билета отменено",
            ticket,
        }),
    ))
}
