use thiserror::Error;

use crate::models::TicketStatus;
use crate::store::StoreError;

/// Ошибки движка бронирования.
///
/// Всё, кроме `DuplicateReference`, `TransientStorageFailure` и `InvariantViolation`,
/// обнаруживается до любых изменений и является ошибкой запроса.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BookingError {
    #[error("Некорректный запрос: {0}")]
    InvalidRequest(String),

    #[error("Сеанс {0} не найден")]
    SessionNotFound(i64),

    #[error("Сеанс {0} неактивен")]
    SessionInactive(i64),

    #[error("Зал {0} не найден")]
    HallNotFound(i64),

    #[error("Некорректная конфигурация зала {hall_id}: VIP {vip_seats} + премиум {premium_seats} > {total_seats} мест")]
    InvalidHallConfiguration {
        hall_id: i64,
        vip_seats: i32,
        premium_seats: i32,
        total_seats: i32,
    },

    #[error("Неверный номер места {seat_number}, в зале {total_seats} мест")]
    InvalidSeatNumber { seat_number: i32, total_seats: i32 },

    #[error("Недостаточно свободных мест. Доступно: {available}, запрошено: {requested}")]
    InsufficientSeats { requested: usize, available: i32 },

    #[error("Места уже заняты: {0:?}")]
    SeatsAlreadyTaken(Vec<i32>),

    #[error("Билет {0} не найден")]
    TicketNotFound(i64),

    #[error("Билет {ticket_id} нельзя отменить в статусе {status}")]
    TicketNotCancellable { ticket_id: i64, status: TicketStatus },

    #[error("Билет {0} не принадлежит пользователю")]
    NotTicketOwner(i64),

    #[error("Коллизия номера брони")]
    DuplicateReference,

    #[error("Хранилище временно недоступно: {0}")]
    TransientStorageFailure(String),

    #[error("Нарушен инвариант: {0}")]
    InvariantViolation(String),
}

impl BookingError {
    /// Машиночитаемый вид ошибки для ответа клиенту.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::InvalidRequest(_) => "invalid_request",
            BookingError::SessionNotFound(_) => "session_not_found",
            BookingError::SessionInactive(_) => "session_inactive",
            BookingError::HallNotFound(_) => "hall_not_found",
            BookingError::InvalidHallConfiguration { .. } => "invalid_hall_configuration",
            BookingError::InvalidSeatNumber { .. } => "invalid_seat_number",
            BookingError::InsufficientSeats { .. } => "insufficient_seats",
            BookingError::SeatsAlreadyTaken(_) => "seats_already_taken",
            BookingError::TicketNotFound(_) => "ticket_not_found",
            BookingError::TicketNotCancellable { .. } => "ticket_not_cancellable",
            BookingError::NotTicketOwner(_) => "not_ticket_owner",
            BookingError::DuplicateReference => "duplicate_reference",
            BookingError::TransientStorageFailure(_) => "transient_storage_failure",
            BookingError::InvariantViolation(_) => "invariant_violation",
        }
    }

    /// Можно ли повторить весь вызов `book` целиком.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::TransientStorageFailure(_))
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => BookingError::TransientStorageFailure(msg),
            StoreError::DuplicateReference(_) => BookingError::DuplicateReference,
            StoreError::SeatConflict { seat_number, .. } => {
                BookingError::SeatsAlreadyTaken(vec![seat_number])
            }
            StoreError::Corrupt(msg) => BookingError::InvariantViolation(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_booking_taxonomy() {
        assert_eq!(
            BookingError::from(StoreError::Unavailable("pool timed out".into())),
            BookingError::TransientStorageFailure("pool timed out".into())
        );
        assert_eq!(
            BookingError::from(StoreError::SeatConflict { session_id: 1, seat_number: 7 }),
            BookingError::SeatsAlreadyTaken(vec![7])
        );
        assert_eq!(
            BookingError::from(StoreError::DuplicateReference("ABCD1234".into())),
            BookingError::DuplicateReference
        );
        assert!(matches!(
            BookingError::from(StoreError::Corrupt("bad status".into())),
            BookingError::InvariantViolation(_)
        ));
    }

    #[test]
    fn only_storage_failures_are_retryable() {
        assert!(BookingError::TransientStorageFailure("x".into()).is_retryable());
        assert!(!BookingError::SeatsAlreadyTaken(vec![1]).is_retryable());
        assert!(!BookingError::InvariantViolation("x".into()).is_retryable());
    }

    #[test]
    fn conflict_message_lists_every_seat() {
        let err = BookingError::SeatsAlreadyTaken(vec![3, 4, 9]);
        assert_eq!(err.to_string(), "Места уже заняты: [3, 4, 9]");
        assert_eq!(err.kind(), "seats_already_taken");
    }
}
