//! Категории мест и цены.
//!
//! Категория определяется позиционно, а не по реальной схеме зала: места
//! `1..=vip_seats` считаются VIP, следующие `premium_seats` мест премиальными,
//! остальные стандартными.

use serde::Serialize;

use crate::booking::error::BookingError;
use crate::models::{Hall, SeatTier, Session};

pub const VIP_MULTIPLIER: f64 = 1.5;
pub const PREMIUM_MULTIPLIER: f64 = 1.2;

/// Базовая цена одного места в рамках конкретного запроса.
///
/// Если клиент передал общую сумму, базой становится `total_price / seat_count`,
/// иначе `session.base_price`. Цены категорий сеанса (`vip_price`, `premium_price`)
/// имеют приоритет над обоими вариантами для своей категории.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBasis {
    per_seat: f64,
}

impl PriceBasis {
    pub fn new(session: &Session, total_price: Option<f64>, seat_count: usize) -> Self {
        let per_seat = match total_price {
            Some(total) if seat_count > 0 => total / seat_count as f64,
            _ => session.base_price,
        };
        Self { per_seat }
    }

    pub fn per_seat(&self) -> f64 {
        self.per_seat
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeatPricing {
    pub tier: SeatTier,
    pub unit_price: f64,
}

/// Округление до копеек.
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub fn validate_hall(hall: &Hall) -> Result<(), BookingError> {
    let tiered = i64::from(hall.vip_seats) + i64::from(hall.premium_seats);
    if hall.vip_seats < 0 || hall.premium_seats < 0 || tiered > i64::from(hall.total_seats) {
        return Err(BookingError::InvalidHallConfiguration {
            hall_id: hall.id,
            vip_seats: hall.vip_seats,
            premium_seats: hall.premium_seats,
            total_seats: hall.total_seats,
        });
    }
    Ok(())
}

pub fn tier_of(seat_number: i32, hall: &Hall) -> SeatTier {
    if seat_number <= hall.vip_seats {
        SeatTier::Vip
    } else if seat_number <= hall.vip_seats + hall.premium_seats {
        SeatTier::Premium
    } else {
        SeatTier::Standard
    }
}

pub fn classify(
    seat_number: i32,
    hall: &Hall,
    session: &Session,
    basis: &PriceBasis,
) -> Result<SeatPricing, BookingError> {
    validate_hall(hall)?;

    let tier = tier_of(seat_number, hall);
    let unit_price = match tier {
        SeatTier::Vip => session
            .vip_price
            .unwrap_or(basis.per_seat() * VIP_MULTIPLIER),
        SeatTier::Premium => session
            .premium_price
            .unwrap_or(basis.per_seat() * PREMIUM_MULTIPLIER),
        SeatTier::Standard => basis.per_seat(),
    };

    Ok(SeatPricing {
        tier,
        unit_price: round_money(unit_price),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hall() -> Hall {
        Hall {
            id: 3,
            total_seats: 20,
            rows: 4,
            seats_per_row: Some(5),
            vip_seats: 5,
            premium_seats: 3,
        }
    }

    fn session(vip_price: Option<f64>, premium_price: Option<f64>) -> Session {
        Session {
            id: 1,
            movie_id: 1,
            hall_id: 3,
            base_price: 100.0,
            vip_price,
            premium_price,
            available_seats: 20,
            reserved_tickets: 0,
            is_sold_out: false,
            is_active: true,
        }
    }

    #[test]
    fn prices_follow_positional_tiers() {
        let s = session(None, None);
        let basis = PriceBasis::new(&s, None, 1);

        let vip = classify(2, &hall(), &s, &basis).unwrap();
        assert_eq!(vip, SeatPricing { tier: SeatTier::Vip, unit_price: 150.0 });

        let premium = classify(7, &hall(), &s, &basis).unwrap();
        assert_eq!(premium, SeatPricing { tier: SeatTier::Premium, unit_price: 120.0 });

        let standard = classify(15, &hall(), &s, &basis).unwrap();
        assert_eq!(standard, SeatPricing { tier: SeatTier::Standard, unit_price: 100.0 });
    }

    #[test]
    fn tier_boundaries() {
        let h = hall();
        assert_eq!(tier_of(5, &h), SeatTier::Vip);
        assert_eq!(tier_of(6, &h), SeatTier::Premium);
        assert_eq!(tier_of(8, &h), SeatTier::Premium);
        assert_eq!(tier_of(9, &h), SeatTier::Standard);
    }

    #[test]
    fn session_overrides_win_for_their_tier() {
        let s = session(Some(400.0), Some(250.0));
        let basis = PriceBasis::new(&s, Some(90.0), 3);

        assert_eq!(classify(1, &hall(), &s, &basis).unwrap().unit_price, 400.0);
        assert_eq!(classify(6, &hall(), &s, &basis).unwrap().unit_price, 250.0);
        assert_eq!(classify(20, &hall(), &s, &basis).unwrap().unit_price, 30.0);
    }

    #[test]
    fn caller_total_overrides_base_price() {
        let s = session(None, None);
        let basis = PriceBasis::new(&s, Some(200.0), 2);
        assert_eq!(basis.per_seat(), 100.0);

        let basis = PriceBasis::new(&s, Some(100.0), 3);
        let vip = classify(1, &hall(), &s, &basis).unwrap();
        assert_eq!(vip.unit_price, 50.0);
        let standard = classify(10, &hall(), &s, &basis).unwrap();
        assert_eq!(standard.unit_price, 33.33);
    }

    #[test]
    fn rejects_overlapping_partitions() {
        let mut h = hall();
        h.premium_seats = 16;
        let s = session(None, None);
        let basis = PriceBasis::new(&s, None, 1);
        assert!(matches!(
            classify(1, &h, &s, &basis),
            Err(BookingError::InvalidHallConfiguration { hall_id: 3, .. })
        ));
    }

    proptest! {
        #[test]
        fn standard_price_never_exceeds_tiered(base in 1.0f64..10_000.0) {
            let mut s = session(None, None);
            s.base_price = base;
            let basis = PriceBasis::new(&s, None, 1);
            let h = hall();
            let vip = classify(1, &h, &s, &basis).unwrap().unit_price;
            let premium = classify(6, &h, &s, &basis).unwrap().unit_price;
            let standard = classify(20, &h, &s, &basis).unwrap().unit_price;
            prop_assert!(standard <= premium && premium <= vip);
        }
    }
}
