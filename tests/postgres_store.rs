//! Проверки поверх настоящего Postgres. Без DATABASE_URL тесты сразу выходят.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use cinema_booking::booking::{
    BookingEngine, BookingError, BookingRequest, RandomReferences, ReferenceSource,
};
use cinema_booking::config::{BookingConfig, DatabaseConfig};
use cinema_booking::database::Database;
use cinema_booking::models::{NewTicket, SeatTier};
use cinema_booking::store::{BookingStore, BookingTx, PgBookingStore, StoreError};

async fn connect() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let db = Database::new(&DatabaseConfig {
        url,
        pool_size: 10,
        acquire_timeout_seconds: 5,
    })
    .await
    .unwrap();
    db.run_migrations().await.unwrap();
    Some(db.pool)
}

/// Свой зал и сеанс на 20 мест для каждого теста, чтобы тесты не мешали друг другу.
async fn seed_session(pool: &PgPool) -> i64 {
    let hall_id: i64 = sqlx::query_scalar(
        "INSERT INTO halls (total_seats, rows, seats_per_row, vip_seats, premium_seats)
         VALUES (20, 4, 5, 5, 3) RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query_scalar(
        "INSERT INTO sessions (movie_id, hall_id, base_price, available_seats)
         VALUES (1, $1, 100, 20) RETURNING id",
    )
    .bind(hall_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

fn new_ticket(session_id: i64, seat_number: i32, reference: &str) -> NewTicket {
    NewTicket {
        session_id,
        user_id: 1,
        seat_row: 1,
        seat_number,
        seat_type: SeatTier::Standard,
        price: 100.0,
        final_price: 100.0,
        booking_reference: reference.to_string(),
        booking_time: Utc::now(),
    }
}

struct FixedReference(String);

impl ReferenceSource for FixedReference {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_bookings_serialize_on_session_row() {
    let Some(pool) = connect().await else {
        return;
    };
    let session_id = seed_session(&pool).await;
    let store = Arc::new(PgBookingStore::new(pool.clone(), 5_000));
    let engine = Arc::new(BookingEngine::new(store, BookingConfig::default()));

    let handles: Vec<_> = (0..8)
        .map(|i: i64| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let request = BookingRequest {
                    session_id,
                    seat_numbers: vec![10, 11 + i as i32],
                    total_price: None,
                };
                engine.book(100 + i, &request).await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err, &BookingError::SeatsAlreadyTaken(vec![10]));
    }

    let audit = engine.audit_ledger(session_id).await.unwrap();
    assert!(audit.consistent);
    assert_eq!(audit.active_tickets, 2);
    assert_eq!(audit.ledger.available_seats, 18);
}

#[tokio::test]
async fn unique_violations_map_by_constraint() {
    let Some(pool) = connect().await else {
        return;
    };
    let session_id = seed_session(&pool).await;
    let store = PgBookingStore::new(pool, 5_000);
    let reference = RandomReferences.generate();

    let mut tx = store.begin().await.unwrap();
    tx.insert_ticket(&new_ticket(session_id, 1, &reference)).await.unwrap();
    tx.commit().await.unwrap();

    // то же место другим номером брони
    let mut tx = store.begin().await.unwrap();
    let err = tx
        .insert_ticket(&new_ticket(session_id, 1, &RandomReferences.generate()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::SeatConflict {
            session_id,
            seat_number: 1
        }
    );
    tx.rollback().await.unwrap();

    // другое место тем же номером брони
    let mut tx = store.begin().await.unwrap();
    let err = tx
        .insert_ticket(&new_ticket(session_id, 2, &reference))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::DuplicateReference(reference.clone()));
    tx.rollback().await.unwrap();
}

#[tokio::test]
async fn reference_collision_exhausts_retries_without_side_effects() {
    let Some(pool) = connect().await else {
        return;
    };
    let session_id = seed_session(&pool).await;
    let store: Arc<dyn BookingStore> = Arc::new(PgBookingStore::new(pool, 5_000));
    let references = Arc::new(FixedReference(RandomReferences.generate()));
    let engine = BookingEngine::with_references(store.clone(), references, BookingConfig::default());

    let request = |seat: i32| BookingRequest {
        session_id,
        seat_numbers: vec![seat],
        total_price: None,
    };
    engine.book(1, &request(1)).await.unwrap();

    let err = engine.book(2, &request(2)).await.unwrap_err();
    assert_eq!(err, BookingError::DuplicateReference);

    let availability = store.session_availability(session_id).await.unwrap().unwrap();
    assert_eq!(availability.available_seats, 19);
    assert_eq!(availability.reserved_tickets, 1);
    assert_eq!(availability.taken_seats, vec![1]);
}

#[tokio::test]
async fn held_session_lock_times_out_as_transient_failure() {
    let Some(pool) = connect().await else {
        return;
    };
    let session_id = seed_session(&pool).await;
    let store: Arc<dyn BookingStore> = Arc::new(PgBookingStore::new(pool, 200));
    let engine = BookingEngine::new(store.clone(), BookingConfig::default());

    let mut holder = store.begin().await.unwrap();
    assert!(holder.lock_session(session_id).await.unwrap().is_some());

    let request = BookingRequest {
        session_id,
        seat_numbers: vec![3],
        total_price: None,
    };
    let err = engine.book(1, &request).await.unwrap_err();
    assert!(matches!(err, BookingError::TransientStorageFailure(_)));
    assert!(err.is_retryable());

    holder.rollback().await.unwrap();
    engine.book(1, &request).await.unwrap();
}
