use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Зал кинотеатра. Для движка бронирования только читается.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Hall {
    pub id: i64,
    pub total_seats: i32,
    pub rows: i32,
    pub seats_per_row: Option<i32>,
    pub vip_seats: i32,
    pub premium_seats: i32,
}
