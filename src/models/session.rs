use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Сеанс: конкретный показ фильма в конкретном зале.
///
/// `available_seats`, `reserved_tickets` и `is_sold_out` образуют леджер доступности
/// и меняются только внутри транзакции бронирования или отмены.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub movie_id: i64,
    pub hall_id: i64,
    pub base_price: f64,
    pub vip_price: Option<f64>,
    pub premium_price: Option<f64>,
    pub available_seats: i32,
    pub reserved_tickets: i32,
    pub is_sold_out: bool,
    pub is_active: bool,
}
