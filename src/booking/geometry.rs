//! Геометрия зала: линейный номер места -> (ряд, место в ряду).

use serde::Serialize;

use crate::booking::error::BookingError;
use crate::models::Hall;

/// Сколько мест в ряду предполагается, если у зала не задан `seats_per_row`.
pub const ASSUMED_SEATS_PER_ROW: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeatPosition {
    pub row: i32,
    pub position: i32,
}

/// Число мест в ряду для расчёта.
///
/// Без `seats_per_row` это приближение: число рядов оценивается как
/// `round(total_seats / 10)` (не меньше 1), а мест в ряду как `total_seats / rows`.
/// Результат детерминирован, но реальную рассадку не отражает, и оценённый ряд
/// может оказаться больше `hall.rows`.
pub fn seats_per_row(hall: &Hall) -> i32 {
    match hall.seats_per_row {
        Some(spr) if spr > 0 => spr,
        _ => {
            let total = hall.total_seats.max(0);
            // round half up: int(total / 10 + 0.5)
            let estimated_rows = ((total + ASSUMED_SEATS_PER_ROW / 2) / ASSUMED_SEATS_PER_ROW).max(1);
            (total / estimated_rows).max(1)
        }
    }
}

pub fn resolve(seat_number: i32, hall: &Hall) -> Result<SeatPosition, BookingError> {
    if seat_number < 1 || seat_number > hall.total_seats {
        return Err(BookingError::InvalidSeatNumber {
            seat_number,
            total_seats: hall.total_seats,
        });
    }

    let spr = seats_per_row(hall);
    let index = seat_number - 1;

    Ok(SeatPosition {
        row: index / spr + 1,
        position: index % spr + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hall(total_seats: i32, seats_per_row: Option<i32>) -> Hall {
        Hall {
            id: 1,
            total_seats,
            rows: 10,
            seats_per_row,
            vip_seats: 0,
            premium_seats: 0,
        }
    }

    #[test]
    fn uses_explicit_seats_per_row() {
        let h = hall(120, Some(12));
        assert_eq!(resolve(1, &h).unwrap(), SeatPosition { row: 1, position: 1 });
        assert_eq!(resolve(12, &h).unwrap(), SeatPosition { row: 1, position: 12 });
        assert_eq!(resolve(13, &h).unwrap(), SeatPosition { row: 2, position: 1 });
        assert_eq!(resolve(120, &h).unwrap(), SeatPosition { row: 10, position: 12 });
    }

    #[test]
    fn estimates_rows_when_seats_per_row_unset() {
        // 95 мест -> 10 рядов (9.5 округляется вверх) -> 9 мест в ряду
        let h = hall(95, None);
        assert_eq!(seats_per_row(&h), 9);
        assert_eq!(resolve(91, &h).unwrap(), SeatPosition { row: 11, position: 1 });
        assert_eq!(resolve(91, &h), resolve(91, &h));
    }

    #[test]
    fn non_positive_seats_per_row_falls_back_to_estimate() {
        assert_eq!(seats_per_row(&hall(40, Some(0))), 10);
        assert_eq!(seats_per_row(&hall(3, None)), 3);
        assert_eq!(seats_per_row(&hall(1, None)), 1);
    }

    #[test]
    fn rejects_out_of_range_seats() {
        let h = hall(20, Some(5));
        assert_eq!(
            resolve(0, &h),
            Err(BookingError::InvalidSeatNumber { seat_number: 0, total_seats: 20 })
        );
        assert_eq!(
            resolve(21, &h),
            Err(BookingError::InvalidSeatNumber { seat_number: 21, total_seats: 20 })
        );
        assert!(resolve(-3, &h).is_err());
    }

    proptest! {
        #[test]
        fn position_is_inside_row(total in 1i32..600, spr in proptest::option::of(0i32..40), seat_seed in 0i32..600) {
            let h = hall(total, spr);
            let seat = seat_seed % total + 1;
            let pos = resolve(seat, &h).unwrap();
            let width = seats_per_row(&h);
            prop_assert!(pos.row >= 1);
            prop_assert!(pos.position >= 1 && pos.position <= width);
            prop_assert_eq!((pos.row - 1) * width + pos.position, seat);
        }
    }
}
