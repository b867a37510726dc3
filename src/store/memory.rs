//! Хранилище в памяти процесса.
//!
//! Все транзакции сериализуются одним асинхронным мьютексом: `begin` захватывает
//! его и работает с копией состояния, `commit` подменяет состояние копией.
//! Брошенная транзакция просто отпускает мьютекс.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BookingStore, BookingTx, SessionAvailability, SessionStatistics, StoreError};
use crate::booking::ledger::SeatLedger;
use crate::models::{Hall, NewTicket, Session, Ticket, TicketStatus};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    halls: HashMap<i64, Hall>,
    sessions: HashMap<i64, Session>,
    tickets: BTreeMap<i64, Ticket>,
    next_ticket_id: i64,
}

impl MemoryState {
    fn availability(&self, session_id: i64) -> Option<SessionAvailability> {
        let session = self.sessions.get(&session_id)?;
        let total_seats = self
            .halls
            .get(&session.hall_id)
            .map(|hall| hall.total_seats)
            .unwrap_or_default();

        let mut taken_seats: Vec<i32> = self
            .tickets
            .values()
            .filter(|t| t.session_id == session_id && t.status != TicketStatus::Cancelled)
            .map(|t| t.seat_number)
            .collect();
        taken_seats.sort_unstable();

        Some(SessionAvailability {
            session_id,
            hall_id: session.hall_id,
            total_seats,
            available_seats: session.available_seats,
            reserved_tickets: session.reserved_tickets,
            is_sold_out: session.is_sold_out,
            taken_seats,
        })
    }
}

#[derive(Clone, Default)]
pub struct MemoryBookingStore {
    state: Arc<Mutex<MemoryState>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_hall(&self, hall: Hall) {
        self.state.lock().await.halls.insert(hall.id, hall);
    }

    pub async fn insert_session(&self, session: Session) {
        self.state.lock().await.sessions.insert(session.id, session);
    }

    pub async fn session(&self, session_id: i64) -> Option<Session> {
        self.state.lock().await.sessions.get(&session_id).cloned()
    }

    pub async fn tickets(&self) -> Vec<Ticket> {
        self.state.lock().await.tickets.values().cloned().collect()
    }

    /// Сымитировать отказ хранилища на ближайшем коммите.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

pub struct MemoryBookingTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    fail_commit: Arc<AtomicBool>,
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn begin(&self) -> Result<Box<dyn BookingTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryBookingTx {
            guard,
            staged,
            fail_commit: self.fail_next_commit.clone(),
        }))
    }

    async fn find_ticket(&self, ticket_id: i64) -> Result<Option<Ticket>, StoreError> {
        Ok(self.state.lock().await.tickets.get(&ticket_id).cloned())
    }

    async fn tickets_for_user(&self, user_id: i64) -> Result<Vec<Ticket>, StoreError> {
        let state = self.state.lock().await;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.booking_time.cmp(&a.booking_time).then(b.id.cmp(&a.id)));
        Ok(tickets)
    }

    async fn session_availability(
        &self,
        session_id: i64,
    ) -> Result<Option<SessionAvailability>, StoreError> {
        Ok(self.state.lock().await.availability(session_id))
    }

    async fn session_statistics(
        &self,
        session_id: i64,
    ) -> Result<Option<SessionStatistics>, StoreError> {
        let state = self.state.lock().await;
        let Some(availability) = state.availability(session_id) else {
            return Ok(None);
        };

        let mut stats = SessionStatistics {
            session_id,
            total_seats: availability.total_seats,
            available_seats: availability.available_seats,
            reserved_tickets: availability.reserved_tickets,
            booked_tickets: 0,
            paid_tickets: 0,
            used_tickets: 0,
            cancelled_tickets: 0,
            total_revenue: 0.0,
            average_ticket_price: 0.0,
        };

        for ticket in state.tickets.values().filter(|t| t.session_id == session_id) {
            match ticket.status {
                TicketStatus::Booked => stats.booked_tickets += 1,
                TicketStatus::Paid => stats.paid_tickets += 1,
                TicketStatus::Used => stats.used_tickets += 1,
                TicketStatus::Cancelled => stats.cancelled_tickets += 1,
            }
            if matches!(ticket.status, TicketStatus::Paid | TicketStatus::Used) {
                stats.total_revenue += ticket.final_price;
            }
        }

        let paid_count = stats.paid_tickets + stats.used_tickets;
        if paid_count > 0 {
            stats.average_ticket_price = stats.total_revenue / paid_count as f64;
        }
        Ok(Some(stats))
    }
}

#[async_trait]
impl BookingTx for MemoryBookingTx {
    async fn lock_session(&mut self, session_id: i64) -> Result<Option<Session>, StoreError> {
        Ok(self.staged.sessions.get(&session_id).cloned())
    }

    async fn load_hall(&mut self, hall_id: i64) -> Result<Option<Hall>, StoreError> {
        Ok(self.staged.halls.get(&hall_id).cloned())
    }

    async fn occupied_seats(
        &mut self,
        session_id: i64,
        seat_numbers: &[i32],
    ) -> Result<Vec<i32>, StoreError> {
        let mut taken: Vec<i32> = self
            .staged
            .tickets
            .values()
            .filter(|t| {
                t.session_id == session_id
                    && t.status != TicketStatus::Cancelled
                    && seat_numbers.contains(&t.seat_number)
            })
            .map(|t| t.seat_number)
            .collect();
        taken.sort_unstable();
        Ok(taken)
    }

    async fn count_active_tickets(&mut self, session_id: i64) -> Result<i64, StoreError> {
        Ok(self
            .staged
            .tickets
            .values()
            .filter(|t| t.session_id == session_id && t.status != TicketStatus::Cancelled)
            .count() as i64)
    }

    async fn insert_ticket(&mut self, ticket: &NewTicket) -> Result<Ticket, StoreError> {
        // те же уникальные ограничения, что и в схеме Postgres
        for existing in self.staged.tickets.values() {
            if existing.booking_reference == ticket.booking_reference {
                return Err(StoreError::DuplicateReference(ticket.booking_reference.clone()));
            }
            if existing.session_id == ticket.session_id
                && existing.seat_number == ticket.seat_number
                && existing.status != TicketStatus::Cancelled
            {
                return Err(StoreError::SeatConflict {
                    session_id: ticket.session_id,
                    seat_number: ticket.seat_number,
                });
            }
        }

        self.staged.next_ticket_id += 1;
        let stored = ticket.clone().into_ticket(self.staged.next_ticket_id);
        self.staged.tickets.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn lock_ticket(&mut self, ticket_id: i64) -> Result<Option<Ticket>, StoreError> {
        Ok(self.staged.tickets.get(&ticket_id).cloned())
    }

    async fn mark_cancelled(&mut self, ticket_id: i64) -> Result<Ticket, StoreError> {
        let ticket = self
            .staged
            .tickets
            .get_mut(&ticket_id)
            .ok_or_else(|| StoreError::Corrupt(format!("ticket {} vanished while locked", ticket_id)))?;
        ticket.status = TicketStatus::Cancelled;
        ticket.cancellation_time = Some(Utc::now());
        Ok(ticket.clone())
    }

    async fn save_ledger(&mut self, ledger: &SeatLedger) -> Result<(), StoreError> {
        let session = self
            .staged
            .sessions
            .get_mut(&ledger.session_id)
            .ok_or_else(|| {
                StoreError::Corrupt(format!("session {} vanished while locked", ledger.session_id))
            })?;
        session.available_seats = ledger.available_seats;
        session.reserved_tickets = ledger.reserved_tickets;
        session.is_sold_out = ledger.is_sold_out;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryBookingTx {
            mut guard,
            staged,
            fail_commit,
        } = *self;

        if fail_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated commit failure".to_string()));
        }
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
