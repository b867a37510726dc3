//! Леджер доступности сеанса.
//!
//! Единственный источник правды о том, сколько мест осталось. Счётчики ведутся
//! инкрементально внутри транзакции бронирования и никогда не пересчитываются
//! по билетам для принятия решения о брони.

use serde::Serialize;

use crate::booking::error::BookingError;
use crate::models::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeatLedger {
    pub session_id: i64,
    pub total_seats: i32,
    pub available_seats: i32,
    pub reserved_tickets: i32,
    pub is_sold_out: bool,
}

/// Результат сверки леджера с фактическим числом живых билетов.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub ledger: SeatLedger,
    pub active_tickets: i64,
    pub consistent: bool,
}

impl SeatLedger {
    pub fn from_session(session: &Session, total_seats: i32) -> Self {
        Self {
            session_id: session.id,
            total_seats,
            available_seats: session.available_seats,
            reserved_tickets: session.reserved_tickets,
            is_sold_out: session.is_sold_out,
        }
    }

    pub fn check_capacity(&self, requested: usize) -> bool {
        i64::from(self.available_seats) >= requested as i64
    }

    /// Проверка инварианта перед изменением: счётчики неотрицательны, их сумма
    /// не больше вместимости, и живых билетов не больше, чем зал вмещает
    /// за вычетом свободных мест.
    pub fn verify(&self, active_tickets: i64) -> Result<(), BookingError> {
        let available = i64::from(self.available_seats);
        let reserved = i64::from(self.reserved_tickets);
        let total = i64::from(self.total_seats);

        if available < 0 || reserved < 0 {
            return Err(self.violation("negative counter"));
        }
        if available + reserved > total {
            return Err(self.violation("available + reserved exceeds hall capacity"));
        }
        if available + active_tickets > total {
            return Err(self.violation(&format!(
                "{} active tickets with {} seats still available",
                active_tickets, available
            )));
        }
        Ok(())
    }

    pub fn audit(&self, active_tickets: i64) -> LedgerAudit {
        LedgerAudit {
            ledger: *self,
            active_tickets,
            consistent: self.verify(active_tickets).is_ok()
                && i64::from(self.reserved_tickets) == active_tickets,
        }
    }

    /// Списать `count` мест. Вызывается только внутри транзакции бронирования.
    pub fn commit(&mut self, count: usize) -> Result<(), BookingError> {
        let count = self.count(count)?;
        if count > self.available_seats {
            return Err(self.violation(&format!(
                "commit of {} seats with only {} available",
                count, self.available_seats
            )));
        }
        self.available_seats -= count;
        self.reserved_tickets += count;
        self.is_sold_out = self.available_seats == 0;
        Ok(())
    }

    /// Точная инверсия `commit`, используется при отмене билета.
    pub fn release(&mut self, count: usize) -> Result<(), BookingError> {
        let count = self.count(count)?;
        if count > self.reserved_tickets || self.available_seats + count > self.total_seats {
            return Err(self.violation(&format!(
                "release of {} seats with {} reserved and {} available",
                count, self.reserved_tickets, self.available_seats
            )));
        }
        self.available_seats += count;
        self.reserved_tickets -= count;
        self.is_sold_out = self.available_seats == 0;
        Ok(())
    }

    fn count(&self, count: usize) -> Result<i32, BookingError> {
        i32::try_from(count).map_err(|_| self.violation("seat count overflow"))
    }

    fn violation(&self, what: &str) -> BookingError {
        BookingError::InvariantViolation(format!(
            "session {} ledger (available={}, reserved={}, total={}): {}",
            self.session_id, self.available_seats, self.reserved_tickets, self.total_seats, what
        ))
    }
}
