//! Движок бронирования: проверка запроса, поиск конфликтов, расчёт цен и
//! атомарная фиксация билетов вместе с леджером сеанса.
//!
//! Весь путь от чтения леджера до записи билетов идёт внутри одной транзакции
//! хранилища с захваченной строкой сеанса, поэтому два конкурентных запроса на
//! пересекающиеся места не могут оба пройти проверку конфликтов.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::booking::error::BookingError;
use crate::booking::geometry::{self, SeatPosition};
use crate::booking::ledger::{LedgerAudit, SeatLedger};
use crate::booking::reference::{is_valid_reference, RandomReferences, ReferenceSource};
use crate::booking::tier::{self, PriceBasis};
use crate::config::BookingConfig;
use crate::models::{NewTicket, SeatTier, Ticket};
use crate::store::{BookingStore, BookingTx};

#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub session_id: i64,
    pub seat_numbers: Vec<i32>,
    pub total_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookedSeat {
    pub ticket_id: i64,
    pub seat_number: i32,
    pub row: i32,
    pub position: i32,
    pub seat_type: SeatTier,
    pub price: f64,
    pub booking_reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingResult {
    pub ticket_ids: Vec<i64>,
    pub booking_references: Vec<String>,
    pub seats: Vec<BookedSeat>,
}

pub struct BookingEngine {
    store: Arc<dyn BookingStore>,
    references: Arc<dyn ReferenceSource>,
    settings: BookingConfig,
}

impl BookingEngine {
    pub fn new(store: Arc<dyn BookingStore>, settings: BookingConfig) -> Self {
        Self::with_references(store, Arc::new(RandomReferences), settings)
    }

    pub fn with_references(
        store: Arc<dyn BookingStore>,
        references: Arc<dyn ReferenceSource>,
        settings: BookingConfig,
    ) -> Self {
        Self {
            store,
            references,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    /// Забронировать места сеанса для пользователя.
    ///
    /// Коллизия номера брони повторяет всю транзакцию заново, не больше
    /// `reference_attempts` раз. Остальные ошибки возвращаются сразу; при любой
    /// ошибке в хранилище ничего не остаётся.
    pub async fn book(
        &self,
        requester_id: i64,
        request: &BookingRequest,
    ) -> Result<BookingResult, BookingError> {
        self.validate(request)?;

        let attempts = self.settings.reference_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.book_once(requester_id, request).await {
                Err(BookingError::DuplicateReference) if attempt < attempts => {
                    warn!(
                        "Booking reference collision for session {} (attempt {}/{}), retrying",
                        request.session_id, attempt, attempts
                    );
                    attempt += 1;
                }
                Err(BookingError::DuplicateReference) => {
                    error!(
                        "Booking reference collisions exhausted {} attempts for session {}",
                        attempts, request.session_id
                    );
                    return Err(BookingError::DuplicateReference);
                }
                Err(err @ BookingError::InvariantViolation(_)) => {
                    error!("Ledger invariant violated while booking: {}", err);
                    return Err(err);
                }
                other => return other,
            }
        }
    }

    /// Отменить билет и вернуть место в леджер.
    pub async fn cancel(&self, ticket_id: i64) -> Result<Ticket, BookingError> {
        self.cancel_checked(ticket_id, None).await
    }

    /// То же, что `cancel`, но только для владельца билета.
    pub async fn cancel_for(&self, ticket_id: i64, requester_id: i64) -> Result<Ticket, BookingError> {
        self.cancel_checked(ticket_id, Some(requester_id)).await
    }

    pub async fn ticket(&self, ticket_id: i64) -> Result<Ticket, BookingError> {
        self.store
            .find_ticket(ticket_id)
            .await?
            .ok_or(BookingError::TicketNotFound(ticket_id))
    }

    pub async fn tickets_for_user(&self, user_id: i64) -> Result<Vec<Ticket>, BookingError> {
        Ok(self.store.tickets_for_user(user_id).await?)
    }

    /// Сверить леджер сеанса с числом живых билетов. Ничего не исправляет.
    pub async fn audit_ledger(&self, session_id: i64) -> Result<LedgerAudit, BookingError> {
        let mut tx = self.store.begin().await?;
        let audit = Self::audit_in_tx(tx.as_mut(), session_id).await;
        finish_read_only(tx).await;

        let audit = audit?;
        if !audit.consistent {
            error!(
                "Ledger drift for session {}: available={}, reserved={}, active tickets={}",
                session_id,
                audit.ledger.available_seats,
                audit.ledger.reserved_tickets,
                audit.active_tickets
            );
        }
        Ok(audit)
    }

    fn validate(&self, request: &BookingRequest) -> Result<(), BookingError> {
        if request.seat_numbers.is_empty() {
            return Err(BookingError::InvalidRequest("не указаны места".to_string()));
        }
        if let Some(limit) = self.settings.max_seats_per_booking {
            if request.seat_numbers.len() > limit {
                return Err(BookingError::InvalidRequest(format!(
                    "не больше {} мест за одно бронирование",
                    limit
                )));
            }
        }
        let mut seen = HashSet::with_capacity(request.seat_numbers.len());
        if let Some(dup) = request.seat_numbers.iter().find(|seat| !seen.insert(**seat)) {
            return Err(BookingError::InvalidRequest(format!(
                "место {} указано несколько раз",
                dup
            )));
        }
        if let Some(total) = request.total_price {
            if !total.is_finite() || total <= 0.0 {
                return Err(BookingError::InvalidRequest(
                    "total_price должен быть > 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    // Колонка booking_reference принимает только этот формат
    fn next_reference(&self) -> Result<String, BookingError> {
        let reference = self.references.generate();
        if !is_valid_reference(&reference) {
            return Err(BookingError::InvariantViolation(format!(
                "malformed booking reference {:?}",
                reference
            )));
        }
        Ok(reference)
    }

    async fn book_once(
        &self,
        requester_id: i64,
        request: &BookingRequest,
    ) -> Result<BookingResult, BookingError> {
        let mut tx = self.store.begin().await?;

        match self.book_in_tx(tx.as_mut(), requester_id, request).await {
            Ok(result) => {
                tx.commit().await?;
                info!(
                    "🎫 Booked {} seats {:?} in session {} for user {}",
                    result.ticket_ids.len(),
                    request.seat_numbers,
                    request.session_id,
                    requester_id
                );
                Ok(result)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    warn!("Failed to roll back booking for session {}: {}", request.session_id, rb);
                }
                Err(err)
            }
        }
    }

    async fn book_in_tx(
        &self,
        tx: &mut dyn BookingTx,
        requester_id: i64,
        request: &BookingRequest,
    ) -> Result<BookingResult, BookingError> {
        let session_id = request.session_id;
        let seat_count = request.seat_numbers.len();

        // 1. Сеанс (под блокировкой до конца транзакции)
        let session = tx
            .lock_session(session_id)
            .await?
            .ok_or(BookingError::SessionNotFound(session_id))?;
        if !session.is_active {
            return Err(BookingError::SessionInactive(session_id));
        }

        // 2. Зал
        let hall = tx
            .load_hall(session.hall_id)
            .await?
            .ok_or(BookingError::HallNotFound(session.hall_id))?;

        // 3. Вместимость по леджеру
        let mut ledger = SeatLedger::from_session(&session, hall.total_seats);
        if !ledger.check_capacity(seat_count) {
            return Err(BookingError::InsufficientSeats {
                requested: seat_count,
                available: ledger.available_seats,
            });
        }

        // 4. Конфликты с уже выданными билетами
        let taken = tx.occupied_seats(session_id, &request.seat_numbers).await?;
        if !taken.is_empty() {
            return Err(BookingError::SeatsAlreadyTaken(taken));
        }

        let active = tx.count_active_tickets(session_id).await?;
        ledger.verify(active)?;

        // 5. Геометрия, категория и цена каждого места
        let basis = PriceBasis::new(&session, request.total_price, seat_count);
        let booking_time = Utc::now();
        let mut planned: Vec<(NewTicket, SeatPosition)> = Vec::with_capacity(seat_count);
        for &seat_number in &request.seat_numbers {
            let position = geometry::resolve(seat_number, &hall)?;
            let pricing = tier::classify(seat_number, &hall, &session, &basis)?;
            planned.push((
                NewTicket {
                    session_id,
                    user_id: requester_id,
                    seat_row: position.row,
                    seat_number,
                    seat_type: pricing.tier,
                    price: pricing.unit_price,
                    final_price: pricing.unit_price,
                    booking_reference: self.next_reference()?,
                    booking_time,
                },
                position,
            ));
        }

        // 6. Билеты и леджер в одной транзакции
        let mut seats = Vec::with_capacity(seat_count);
        for (ticket, position) in &planned {
            let stored = tx.insert_ticket(ticket).await?;
            seats.push(BookedSeat {
                ticket_id: stored.id,
                seat_number: stored.seat_number,
                row: position.row,
                position: position.position,
                seat_type: stored.seat_type,
                price: stored.price,
                booking_reference: stored.booking_reference,
            });
        }
        ledger.commit(seat_count)?;
        tx.save_ledger(&ledger).await?;

        // 7. Результат
        Ok(BookingResult {
            ticket_ids: seats.iter().map(|s| s.ticket_id).collect(),
            booking_references: seats.iter().map(|s| s.booking_reference.clone()).collect(),
            seats,
        })
    }

    async fn cancel_checked(
        &self,
        ticket_id: i64,
        requester_id: Option<i64>,
    ) -> Result<Ticket, BookingError> {
        // Сначала узнаём сеанс, чтобы брать блокировки в том же порядке, что и `book`
        let session_id = self.ticket(ticket_id).await?.session_id;

        let mut tx = self.store.begin().await?;
        match Self::cancel_in_tx(tx.as_mut(), ticket_id, session_id, requester_id).await {
            Ok(ticket) => {
                tx.commit().await?;
                info!(
                    "🎫 Cancelled ticket {} (seat {}) in session {}",
                    ticket.id, ticket.seat_number, ticket.session_id
                );
                Ok(ticket)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    warn!("Failed to roll back cancellation of ticket {}: {}", ticket_id, rb);
                }
                if let BookingError::InvariantViolation(_) = &err {
                    error!("Ledger invariant violated while cancelling: {}", err);
                }
                Err(err)
            }
        }
    }

    async fn cancel_in_tx(
        tx: &mut dyn BookingTx,
        ticket_id: i64,
        session_id: i64,
        requester_id: Option<i64>,
    ) -> Result<Ticket, BookingError> {
        let session = tx
            .lock_session(session_id)
            .await?
            .ok_or(BookingError::SessionNotFound(session_id))?;
        let hall = tx
            .load_hall(session.hall_id)
            .await?
            .ok_or(BookingError::HallNotFound(session.hall_id))?;

        let ticket = tx
            .lock_ticket(ticket_id)
            .await?
            .ok_or(BookingError::TicketNotFound(ticket_id))?;
        if ticket.session_id != session_id {
            return Err(BookingError::InvariantViolation(format!(
                "ticket {} moved from session {} to {}",
                ticket_id, session_id, ticket.session_id
            )));
        }
        if let Some(requester) = requester_id {
            if ticket.user_id != requester {
                return Err(BookingError::NotTicketOwner(ticket_id));
            }
        }
        if !ticket.status.is_cancellable() {
            return Err(BookingError::TicketNotCancellable {
                ticket_id,
                status: ticket.status,
            });
        }

        let mut ledger = SeatLedger::from_session(&session, hall.total_seats);
        ledger.release(1)?;

        let cancelled = tx.mark_cancelled(ticket_id).await?;
        tx.save_ledger(&ledger).await?;
        Ok(cancelled)
    }

    async fn audit_in_tx(tx: &mut dyn BookingTx, session_id: i64) -> Result<LedgerAudit, BookingError> {
        let session = tx
            .lock_session(session_id)
            .await?
            .ok_or(BookingError::SessionNotFound(session_id))?;
        let hall = tx
            .load_hall(session.hall_id)
            .await?
            .ok_or(BookingError::HallNotFound(session.hall_id))?;
        let active = tx.count_active_tickets(session_id).await?;
        Ok(SeatLedger::from_session(&session, hall.total_seats).audit(active))
    }
}

async fn finish_read_only(tx: Box<dyn BookingTx>) {
    if let Err(err) = tx.rollback().await {
        warn!("Failed to close read-only transaction: {}", err);
    }
}
