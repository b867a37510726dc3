use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::booking::BookingError;

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::InvalidRequest(_)
            | BookingError::SessionInactive(_)
            | BookingError::InvalidSeatNumber { .. }
            | BookingError::InsufficientSeats { .. } => StatusCode::BAD_REQUEST,
            BookingError::SessionNotFound(_)
            | BookingError::HallNotFound(_)
            | BookingError::TicketNotFound(_) => StatusCode::NOT_FOUND,
            BookingError::SeatsAlreadyTaken(_) | BookingError::TicketNotCancellable { .. } => {
                StatusCode::CONFLICT
            }
            BookingError::NotTicketOwner(_) => StatusCode::FORBIDDEN,
            BookingError::InvalidHallConfiguration { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::TransientStorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::DuplicateReference | BookingError::InvariantViolation(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Внутренности хранилища и леджера клиенту не отдаём
        let detail = match &self {
            BookingError::TransientStorageFailure(msg) => {
                tracing::error!("Storage failure: {}", msg);
                "Сервис временно недоступен, повторите запрос".to_string()
            }
            BookingError::DuplicateReference | BookingError::InvariantViolation(_) => {
                tracing::error!("Internal booking error: {}", self);
                "Внутренняя ошибка сервера".to_string()
            }
            _ => self.to_string(),
        };

        let mut body = json!({
            "detail": detail,
            "kind": self.kind(),
        });
        if let BookingError::SeatsAlreadyTaken(seats) = &self {
            body["seats"] = json!(seats);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(BookingError::SessionNotFound(1).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            BookingError::SeatsAlreadyTaken(vec![1]).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            BookingError::InsufficientSeats { requested: 3, available: 1 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BookingError::TransientStorageFailure("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(BookingError::NotTicketOwner(5).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            BookingError::InvariantViolation("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
