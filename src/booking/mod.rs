//! Ядро бронирования мест: геометрия зала, категории и цены, леджер
//! доступности, номера брони и оркестратор, который связывает их в одну
//! транзакцию.

pub mod engine;
pub mod error;
pub mod geometry;
pub mod ledger;
pub mod reference;
pub mod tier;

pub use engine::{BookedSeat, BookingEngine, BookingRequest, BookingResult};
pub use error::BookingError;
pub use ledger::{LedgerAudit, SeatLedger};
pub use reference::{RandomReferences, ReferenceSource};
