use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

/// A half-open-in-spirit but inclusively-compared rental period.
///
/// Two intervals conflict under the inclusive-bounds test
/// `a.start <= b.end && a.end >= b.start`, so a rental ending exactly when
/// another starts still counts as a conflict. No same-instant handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RentalInterval {
    /// Builds an interval, rejecting `start >= end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(BookingError::InvalidInterval(format!(
                "start {start} must precede end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Inclusive-bounds overlap predicate.
    pub fn overlaps(&self, other: &RentalInterval) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// Duration in hours, exact to the minute.
    pub fn duration_hours(&self) -> Decimal {
        let minutes = (self.end - self.start).num_minutes();
        Decimal::from(minutes) / Decimal::from(MINUTES_PER_HOUR)
    }

    /// Duration in whole billed days; partial days round up.
    pub fn duration_days(&self) -> i64 {
        // The constructor guarantees a positive duration.
        let minutes = (self.end - self.start).num_minutes();
        (minutes + MINUTES_PER_DAY - 1) / MINUTES_PER_DAY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_rejects_inverted_interval() {
        assert!(matches!(
            RentalInterval::new(at(2, 0), at(1, 0)),
            Err(BookingError::InvalidInterval(_))
        ));
        assert!(matches!(
            RentalInterval::new(at(1, 0), at(1, 0)),
            Err(BookingError::InvalidInterval(_))
        ));
    }

    #[test]
    fn test_overlap_inclusive_bounds() {
        let a = RentalInterval::new(at(1, 0), at(3, 0)).unwrap();
        let b = RentalInterval::new(at(2, 0), at(4, 0)).unwrap();
        let c = RentalInterval::new(at(3, 0), at(5, 0)).unwrap();
        let d = RentalInterval::new(at(4, 0), at(5, 0)).unwrap();

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        // Touching endpoints conflict: no same-instant handoff.
        assert!(a.overlaps(&c));
        assert!(!a.overlaps(&d));
    }

    #[test]
    fn test_containment_overlaps() {
        let outer = RentalInterval::new(at(1, 0), at(10, 0)).unwrap();
        let inner = RentalInterval::new(at(4, 0), at(5, 0)).unwrap();
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn test_duration_hours() {
        let two_hours = RentalInterval::new(at(1, 8), at(1, 10)).unwrap();
        assert_eq!(two_hours.duration_hours(), dec!(2));

        let two_days = RentalInterval::new(at(1, 0), at(3, 0)).unwrap();
        assert_eq!(two_days.duration_hours(), dec!(48));
    }

    #[test]
    fn test_duration_days_rounds_up() {
        let exactly_two = RentalInterval::new(at(1, 0), at(3, 0)).unwrap();
        assert_eq!(exactly_two.duration_days(), 2);

        let thirty_hours = RentalInterval::new(at(1, 0), at(2, 6)).unwrap();
        assert_eq!(thirty_hours.duration_days(), 2);

        let one_hour = RentalInterval::new(at(1, 8), at(1, 9)).unwrap();
        assert_eq!(one_hour.duration_days(), 1);
    }
}
