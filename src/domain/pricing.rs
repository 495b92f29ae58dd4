use crate::domain::equipment::RateCard;
use crate::domain::interval::RentalInterval;
use crate::domain::money::Money;
use crate::error::{BookingError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cost breakdown for a proposed rental.
///
/// Invariant: `total_amount = platform_fee + owner_payout` to minor-unit
/// precision, and no amount is negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub duration_hours: Decimal,
    pub total_amount: Money,
    pub platform_fee: Money,
    pub owner_payout: Money,
    pub deposit_amount: Money,
}

/// Prices a rental request against a rate card.
///
/// Billing is flat daily: partial days round up, a deliberately
/// renter-unfavorable policy. The platform fee is rounded to minor-unit
/// precision and the owner payout absorbs the remainder, so the breakdown
/// always sums exactly to the total. Pure and side-effect free, safe to call
/// repeatedly for quotes.
pub fn quote(rates: &RateCard, interval: &RentalInterval, fee_percentage: Decimal) -> Result<Quote> {
    let duration_hours = interval.duration_hours();
    let minimum = Decimal::from(rates.minimum_rental_hours);
    if duration_hours < minimum {
        return Err(BookingError::InvalidInterval(format!(
            "minimum rental period is {} hours, requested {duration_hours}",
            rates.minimum_rental_hours
        )));
    }

    let duration_days = Decimal::from(interval.duration_days());
    let total_amount = Money::new(rates.daily_rate.0 * duration_days);
    let platform_fee = Money::new(total_amount.0 * fee_percentage / Decimal::from(100)).round_minor();
    let owner_payout = total_amount - platform_fee;

    if total_amount.is_negative() || platform_fee.is_negative() || owner_payout.is_negative() {
        return Err(BookingError::InvalidInterval(
            "quoted amounts must not be negative".to_string(),
        ));
    }

    Ok(Quote {
        duration_hours,
        total_amount,
        platform_fee,
        owner_payout,
        deposit_amount: rates.deposit_amount,
    })
}
