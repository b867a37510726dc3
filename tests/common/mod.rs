#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cinema_booking::booking::{BookingEngine, BookingRequest, ReferenceSource};
use cinema_booking::config::BookingConfig;
use cinema_booking::models::{Hall, Session};
use cinema_booking::store::MemoryBookingStore;

pub const HALL_ID: i64 = 3;
pub const SESSION_ID: i64 = 1;

/// Зал по 5 мест в ряду: 1-5 VIP, 6-8 премиум, остальное стандарт.
pub fn hall(total_seats: i32) -> Hall {
    Hall {
        id: HALL_ID,
        total_seats,
        rows: 4,
        seats_per_row: Some(5),
        vip_seats: 5_i32.min(total_seats),
        premium_seats: 3_i32.min((total_seats - 5).max(0)),
    }
}

pub fn session(total_seats: i32) -> Session {
    Session {
        id: SESSION_ID,
        movie_id: 42,
        hall_id: HALL_ID,
        base_price: 100.0,
        vip_price: None,
        premium_price: None,
        available_seats: total_seats,
        reserved_tickets: 0,
        is_sold_out: false,
        is_active: true,
    }
}

pub async fn seeded_store(total_seats: i32) -> MemoryBookingStore {
    let store = MemoryBookingStore::new();
    store.insert_hall(hall(total_seats)).await;
    store.insert_session(session(total_seats)).await;
    store
}

pub fn engine(store: &MemoryBookingStore) -> BookingEngine {
    BookingEngine::new(Arc::new(store.clone()), BookingConfig::default())
}

pub fn request(seats: &[i32]) -> BookingRequest {
    BookingRequest {
        session_id: SESSION_ID,
        seat_numbers: seats.to_vec(),
        total_price: None,
    }
}

/// Выдаёт заранее заданные номера брони, потом уникальные `Z0000001`, `Z0000002`...
pub struct ScriptedReferences {
    script: Mutex<VecDeque<String>>,
    counter: Mutex<u32>,
}

impl ScriptedReferences {
    pub fn new(script: &[&str]) -> Self {
        Self {
            script: Mutex::new(script.iter().map(|s| s.to_string()).collect()),
            counter: Mutex::new(0),
        }
    }
}

impl ReferenceSource for ScriptedReferences {
    fn generate(&self) -> String {
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("Z{:07}", *counter)
    }
}

/// Всегда один и тот же номер брони.
pub struct StuckReferences(pub &'static str);

impl ReferenceSource for StuckReferences {
    fn generate(&self) -> String {
        self.0.to_string()
    }
}
