//! Postgres-реализация хранилища.
//!
//! Сериализация бронирований на уровне сеанса: `SELECT ... FOR UPDATE` по строке
//! сеанса держится до конца транзакции. Частичный уникальный индекс
//! `tickets_session_seat_active_idx` страхует от двойной продажи места, даже если
//! кто-то пишет в `tickets` в обход блокировки.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, warn};

use super::{BookingStore, BookingTx, SessionAvailability, SessionStatistics, StoreError};
use crate::booking::ledger::SeatLedger;
use crate::models::{Hall, NewTicket, Session, Ticket};

const TICKET_COLUMNS: &str = "id, session_id, user_id, seat_row, seat_number, seat_type, \
     price::FLOAT8 AS price, final_price::FLOAT8 AS final_price, booking_reference, \
     status, is_paid, booking_time, cancellation_time";

const SESSION_COLUMNS: &str = "id, movie_id, hall_id, base_price::FLOAT8 AS base_price, \
     vip_price::FLOAT8 AS vip_price, premium_price::FLOAT8 AS premium_price, \
     available_seats, reserved_tickets, is_sold_out, is_active";

const REFERENCE_CONSTRAINT: &str = "tickets_booking_reference_key";

// SQLSTATE, при которых транзакцию имеет смысл повторить целиком
const LOCK_NOT_AVAILABLE: &str = "55P03";
const DEADLOCK_DETECTED: &str = "40P01";
const SERIALIZATION_FAILURE: &str = "40001";

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            error!("Failed to decode stored row: {:?}", err);
            StoreError::Corrupt(err.to_string())
        }
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            if matches!(
                code.as_str(),
                LOCK_NOT_AVAILABLE | DEADLOCK_DETECTED | SERIALIZATION_FAILURE
            ) {
                warn!("Booking transaction aborted by database ({}): {}", code, db.message());
            } else {
                error!("Database error ({}): {}", code, db.message());
            }
            StoreError::Unavailable(err.to_string())
        }
        _ => {
            error!("Storage error: {:?}", err);
            StoreError::Unavailable(err.to_string())
        }
    }
}

#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgBookingStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }
}

pub struct PgBookingTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn begin(&self) -> Result<Box<dyn BookingTx>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        // SET LOCAL не принимает параметры, значение - число из конфигурации
        let set_timeout = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms);
        sqlx::query(&set_timeout)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        Ok(Box::new(PgBookingTx { tx }))
    }

    async fn find_ticket(&self, ticket_id: i64) -> Result<Option<Ticket>, StoreError> {
        let sql = format!("SELECT {} FROM tickets WHERE id = $1", TICKET_COLUMNS);
        sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn tickets_for_user(&self, user_id: i64) -> Result<Vec<Ticket>, StoreError> {
        let sql = format!(
            "SELECT {} FROM tickets WHERE user_id = $1 ORDER BY booking_time DESC, id DESC",
            TICKET_COLUMNS
        );
        sqlx::query_as::<_, Ticket>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn session_availability(
        &self,
        session_id: i64,
    ) -> Result<Option<SessionAvailability>, StoreError> {
        let row = sqlx::query_as::<_, (i64, i64, i32, i32, i32, bool)>(
            r#"
            SELECT s.id, s.hall_id, h.total_seats, s.available_seats, s.reserved_tickets, s.is_sold_out
            FROM sessions s
            JOIN halls h ON h.id = s.hall_id
            WHERE s.id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let Some((session_id, hall_id, total_seats, available_seats, reserved_tickets, is_sold_out)) = row
        else {
            return Ok(None);
        };

        let taken_seats = sqlx::query_scalar::<_, i32>(
            "SELECT seat_number FROM tickets
             WHERE session_id = $1 AND status <> 'cancelled'
             ORDER BY seat_number",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(Some(SessionAvailability {
            session_id,
            hall_id,
            total_seats,
            available_seats,
            reserved_tickets,
            is_sold_out,
            taken_seats,
        }))
    }

    async fn session_statistics(
        &self,
        session_id: i64,
    ) -> Result<Option<SessionStatistics>, StoreError> {
        let Some(availability) = self.session_availability(session_id).await? else {
            return Ok(None);
        };

        let (booked, paid, used, cancelled, revenue) =
            sqlx::query_as::<_, (i64, i64, i64, i64, f64)>(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE status = 'booked'),
                    COUNT(*) FILTER (WHERE status = 'paid'),
                    COUNT(*) FILTER (WHERE status = 'used'),
                    COUNT(*) FILTER (WHERE status = 'cancelled'),
                    COALESCE(SUM(final_price) FILTER (WHERE status IN ('paid', 'used')), 0)::FLOAT8
                FROM tickets
                WHERE session_id = $1
                "#,
            )
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let paid_count = paid + used;
        Ok(Some(SessionStatistics {
            session_id,
            total_seats: availability.total_seats,
            available_seats: availability.available_seats,
            reserved_tickets: availability.reserved_tickets,
            booked_tickets: booked,
            paid_tickets: paid,
            used_tickets: used,
            cancelled_tickets: cancelled,
            total_revenue: revenue,
            average_ticket_price: if paid_count > 0 {
                revenue / paid_count as f64
            } else {
                0.0
            },
        }))
    }
}

#[async_trait]
impl BookingTx for PgBookingTx {
    async fn lock_session(&mut self, session_id: i64) -> Result<Option<Session>, StoreError> {
        let sql = format!("SELECT {} FROM sessions WHERE id = $1 FOR UPDATE", SESSION_COLUMNS);
        sqlx::query_as::<_, Session>(&sql)
            .bind(session_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)
    }

    async fn load_hall(&mut self, hall_id: i64) -> Result<Option<Hall>, StoreError> {
        sqlx::query_as::<_, Hall>(
            "SELECT id, total_seats, rows, seats_per_row, vip_seats, premium_seats
             FROM halls WHERE id = $1",
        )
        .bind(hall_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)
    }

    async fn occupied_seats(
        &mut self,
        session_id: i64,
        seat_numbers: &[i32],
    ) -> Result<Vec<i32>, StoreError> {
        sqlx::query_scalar::<_, i32>(
            "SELECT seat_number FROM tickets
             WHERE session_id = $1 AND seat_number = ANY($2) AND status <> 'cancelled'
             ORDER BY seat_number",
        )
        .bind(session_id)
        .bind(seat_numbers.to_vec())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)
    }

    async fn count_active_tickets(&mut self, session_id: i64) -> Result<i64, StoreError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tickets WHERE session_id = $1 AND status <> 'cancelled'",
        )
        .bind(session_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)
    }

    async fn insert_ticket(&mut self, ticket: &NewTicket) -> Result<Ticket, StoreError> {
        let sql = format!(
            "INSERT INTO tickets (session_id, user_id, seat_row, seat_number, seat_type, price,
                                  final_price, booking_reference, status, is_paid, booking_time)
             VALUES ($1, $2, $3, $4, $5, $6::FLOAT8, $7::FLOAT8, $8, 'booked', FALSE, $9)
             RETURNING {}",
            TICKET_COLUMNS
        );

        let result = sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket.session_id)
            .bind(ticket.user_id)
            .bind(ticket.seat_row)
            .bind(ticket.seat_number)
            .bind(ticket.seat_type.as_str())
            .bind(ticket.price)
            .bind(ticket.final_price)
            .bind(&ticket.booking_reference)
            .bind(ticket.booking_time)
            .fetch_one(&mut *self.tx)
            .await;

        result.map_err(|err| {
            let violated = match &err {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    Some(db.constraint().unwrap_or_default().to_string())
                }
                _ => None,
            };
            match violated {
                Some(constraint) if constraint == REFERENCE_CONSTRAINT => {
                    StoreError::DuplicateReference(ticket.booking_reference.clone())
                }
                Some(_) => StoreError::SeatConflict {
                    session_id: ticket.session_id,
                    seat_number: ticket.seat_number,
                },
                None => map_sqlx(err),
            }
        })
    }

    async fn lock_ticket(&mut self, ticket_id: i64) -> Result<Option<Ticket>, StoreError> {
        let sql = format!("SELECT {} FROM tickets WHERE id = $1 FOR UPDATE", TICKET_COLUMNS);
        sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)
    }

    async fn mark_cancelled(&mut self, ticket_id: i64) -> Result<Ticket, StoreError> {
        let sql = format!(
            "UPDATE tickets SET status = 'cancelled', cancellation_time = NOW()
             WHERE id = $1
             RETURNING {}",
            TICKET_COLUMNS
        );
        sqlx::query_as::<_, Ticket>(&sql)
            .bind(ticket_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx)
    }

    async fn save_ledger(&mut self, ledger: &SeatLedger) -> Result<(), StoreError> {
        let updated = sqlx::query(
            "UPDATE sessions
             SET available_seats = $2, reserved_tickets = $3, is_sold_out = $4, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(ledger.session_id)
        .bind(ledger.available_seats)
        .bind(ledger.reserved_tickets)
        .bind(ledger.is_sold_out)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        if updated.rows_affected() != 1 {
            return Err(StoreError::Corrupt(format!(
                "session {} vanished while locked",
                ledger.session_id
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(map_sqlx)
    }
}
