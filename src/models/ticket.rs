use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use thiserror::Error;

/// Ценовая категория места.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatTier {
    Standard,
    Premium,
    Vip,
}

/// Жизненный цикл билета: booked -> paid -> used или booked -> cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Booked,
    Paid,
    Cancelled,
    Used,
}

#[derive(Debug, Error)]
#[error("unknown {kind} value {value:?}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl SeatTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatTier::Standard => "standard",
            SeatTier::Premium => "premium",
            SeatTier::Vip => "vip",
        }
    }
}

impl TryFrom<String> for SeatTier {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "standard" => Ok(SeatTier::Standard),
            "premium" => Ok(SeatTier::Premium),
            "vip" => Ok(SeatTier::Vip),
            _ => Err(UnknownVariant { kind: "seat_type", value }),
        }
    }
}

impl fmt::Display for SeatTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Booked => "booked",
            TicketStatus::Paid => "paid",
            TicketStatus::Cancelled => "cancelled",
            TicketStatus::Used => "used",
        }
    }

    /// Отменить можно только билет, который ещё не отменён и не использован.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, TicketStatus::Booked | TicketStatus::Paid)
    }
}

impl TryFrom<String> for TicketStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "booked" => Ok(TicketStatus::Booked),
            "paid" => Ok(TicketStatus::Paid),
            "cancelled" => Ok(TicketStatus::Cancelled),
            "used" => Ok(TicketStatus::Used),
            _ => Err(UnknownVariant { kind: "status", value }),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub session_id: i64,
    pub user_id: i64,
    pub seat_row: i32,
    pub seat_number: i32,
    #[sqlx(try_from = "String")]
    pub seat_type: SeatTier,
    pub price: f64,
    pub final_price: f64,
    pub booking_reference: String,
    #[sqlx(try_from = "String")]
    pub status: TicketStatus,
    pub is_paid: bool,
    pub booking_time: DateTime<Utc>,
    pub cancellation_time: Option<DateTime<Utc>>,
}

/// Билет, ещё не сохранённый в хранилище (без id).
#[derive(Debug, Clone, PartialEq)]
pub struct NewTicket {
    pub session_id: i64,
    pub user_id: i64,
    pub seat_row: i32,
    pub seat_number: i32,
    pub seat_type: SeatTier,
    pub price: f64,
    pub final_price: f64,
    pub booking_reference: String,
    pub booking_time: DateTime<Utc>,
}

impl NewTicket {
    pub fn into_ticket(self, id: i64) -> Ticket {
        Ticket {
            id,
            session_id: self.session_id,
            user_id: self.user_id,
            seat_row: self.seat_row,
            seat_number: self.seat_number,
            seat_type: self.seat_type,
            price: self.price,
            final_price: self.final_price,
            booking_reference: self.booking_reference,
            status: TicketStatus::Booked,
            is_paid: false,
            booking_time: self.booking_time,
            cancellation_time: None,
        }
    }
}
