//! Транзакционный контракт хранилища, которым пользуется движок бронирования.
//!
//! Реализации обязаны гарантировать: пока открыта `BookingTx` с захваченным
//! сеансом, никакая другая транзакция не может изменить его леджер или вставить
//! билеты на этот сеанс. Незакоммиченная транзакция, брошенная без `commit`,
//! не оставляет следов.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::booking::ledger::SeatLedger;
use crate::models::{Hall, NewTicket, Session, Ticket};

pub use memory::MemoryBookingStore;
pub use postgres::PgBookingStore;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Хранилище недоступно, таймаут блокировки, дедлок и т.п.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("booking reference {0} already exists")]
    DuplicateReference(String),
    #[error("seat {seat_number} of session {session_id} is already taken")]
    SeatConflict { session_id: i64, seat_number: i32 },
    /// Данные в хранилище не читаются в доменные типы.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

/// Снимок доступности сеанса для отображения. Для решений о брони не используется.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAvailability {
    pub session_id: i64,
    pub hall_id: i64,
    pub total_seats: i32,
    pub available_seats: i32,
    pub reserved_tickets: i32,
    pub is_sold_out: bool,
    pub taken_seats: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatistics {
    pub session_id: i64,
    pub total_seats: i32,
    pub available_seats: i32,
    pub reserved_tickets: i32,
    pub booked_tickets: i64,
    pub paid_tickets: i64,
    pub used_tickets: i64,
    pub cancelled_tickets: i64,
    pub total_revenue: f64,
    pub average_ticket_price: f64,
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Открыть транзакцию бронирования.
    async fn begin(&self) -> Result<Box<dyn BookingTx>, StoreError>;

    async fn find_ticket(&self, ticket_id: i64) -> Result<Option<Ticket>, StoreError>;

    /// Билеты пользователя, новые первыми.
    async fn tickets_for_user(&self, user_id: i64) -> Result<Vec<Ticket>, StoreError>;

    async fn session_availability(
        &self,
        session_id: i64,
    ) -> Result<Option<SessionAvailability>, StoreError>;

    async fn session_statistics(
        &self,
        session_id: i64,
    ) -> Result<Option<SessionStatistics>, StoreError>;
}

#[async_trait]
pub trait BookingTx: Send {
    /// Загрузить сеанс и удерживать его блокировку до конца транзакции.
    async fn lock_session(&mut self, session_id: i64) -> Result<Option<Session>, StoreError>;

    async fn load_hall(&mut self, hall_id: i64) -> Result<Option<Hall>, StoreError>;

    /// Какие из `seat_numbers` уже заняты неотменёнными билетами (по возрастанию).
    async fn occupied_seats(
        &mut self,
        session_id: i64,
        seat_numbers: &[i32],
    ) -> Result<Vec<i32>, StoreError>;

    async fn count_active_tickets(&mut self, session_id: i64) -> Result<i64, StoreError>;

    async fn insert_ticket(&mut self, ticket: &NewTicket) -> Result<Ticket, StoreError>;

    async fn lock_ticket(&mut self, ticket_id: i64) -> Result<Option<Ticket>, StoreError>;

    async fn mark_cancelled(&mut self, ticket_id: i64) -> Result<Ticket, StoreError>;

    async fn save_ledger(&mut self, ledger: &SeatLedger) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
