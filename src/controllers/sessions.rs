//! Состояние сеанса: доступность мест и статистика по билетам.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::booking::BookingError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions/{session_id}/availability", get(get_availability))
        .route("/sessions/{session_id}/statistics", get(get_statistics))
}

/// GET /api/sessions/{session_id}/availability
///
/// Счётчики леджера и занятые места. Ответ может быть взят из кеша; после
/// брони или отмены снимок удаляется дважды, так что устаревший снимок живёт
/// не дольше `REINVALIDATE_DELAY`. Бронирование кеш не использует.
async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    if let Some(cached) = state.cache.get_availability(session_id).await {
        return Ok((StatusCode::OK, [("X-Cache", "HIT")], Json(cached)));
    }

    let availability = state
        .engine
        .store()
        .session_availability(session_id)
        .await?
        .ok_or(BookingError::SessionNotFound(session_id))?;
    state.cache.store_availability(&availability).await;

    Ok((StatusCode::OK, [("X-Cache", "MISS")], Json(availability)))
}

/// GET /api/sessions/{session_id}/statistics
async fn get_statistics(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    let stats = state
        .engine
        .store()
        .session_statistics(session_id)
        .await?
        .ok_or(BookingError::SessionNotFound(session_id))?;

    tracing::info!(
        "Statistics for session {}: {} booked, {} paid, revenue {:.2}",
        session_id, stats.booked_tickets, stats.paid_tickets, stats.total_revenue
    );

    Ok((StatusCode::OK, Json(stats)))
}
