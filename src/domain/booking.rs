use crate::domain::equipment::Equipment;
use crate::domain::interval::RentalInterval;
use crate::domain::money::Money;
use crate::domain::pricing::Quote;
use crate::domain::{BookingId, EquipmentId, UserId};
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a booking.
///
/// `Rejected`, `Cancelled` and `Completed` are terminal. `Disputed` is
/// reachable only through the external dispute-resolution collaborator and
/// is never transitioned further by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Active,
    Completed,
    Cancelled,
    Disputed,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Completed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Disputed => "disputed",
        };
        f.write_str(name)
    }
}

/// Payment axis, tracked independently of the lifecycle status: a booking
/// can be approved while the capture is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The central marketplace entity: one reservation of one piece of
/// equipment for one date range.
///
/// Rates and the monetary breakdown are snapshotted at creation and never
/// re-read from the catalog, so historical bookings are immune to rate
/// changes. Bookings are never deleted; terminal states stay in the store
/// for audit and payout history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub renter: UserId,
    pub owner: UserId,
    pub equipment: EquipmentId,
    pub interval: RentalInterval,
    pub duration_hours: Decimal,

    // Rate snapshot.
    pub hourly_rate: Option<Money>,
    pub daily_rate: Money,
    pub currency: String,

    // Monetary breakdown: total = fee + payout.
    pub total_amount: Money,
    pub platform_fee: Money,
    pub owner_payout: Money,
    pub deposit_amount: Money,

    pub status: BookingStatus,
    pub payment_status: PaymentStatus,

    pub renter_notes: Option<String>,
    pub owner_response: Option<String>,
    pub cancellation_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Assembles a new pending booking from a priced request.
    pub fn new(
        id: BookingId,
        renter: UserId,
        equipment: &Equipment,
        interval: RentalInterval,
        quote: Quote,
        renter_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            renter,
            owner: equipment.owner,
            equipment: equipment.id,
            interval,
            duration_hours: quote.duration_hours,
            hourly_rate: equipment.rates.hourly_rate,
            daily_rate: equipment.rates.daily_rate,
            currency: equipment.rates.currency.clone(),
            total_amount: quote.total_amount,
            platform_fee: quote.platform_fee,
            owner_payout: quote.owner_payout,
            deposit_amount: quote.deposit_amount,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            renter_notes,
            owner_response: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
            approved_at: None,
            rejected_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    /// Amount held from the renter at approval: rental total plus deposit.
    pub fn amount_due(&self) -> Money {
        self.total_amount + self.deposit_amount
    }

    fn transition_guard(&self, action: &'static str, from: &[BookingStatus]) -> Result<()> {
        if from.contains(&self.status) {
            Ok(())
        } else {
            Err(BookingError::InvalidTransition {
                action,
                status: self.status,
            })
        }
    }

    /// Pending -> Approved.
    pub fn approve(&mut self, response: Option<String>, now: DateTime<Utc>) -> Result<()> {
        self.transition_guard("approve", &[BookingStatus::Pending])?;
        self.status = BookingStatus::Approved;
        self.approved_at = Some(now);
        self.owner_response = response;
        self.updated_at = now;
        Ok(())
    }

    /// Pending -> Rejected.
    pub fn reject(&mut self, response: Option<String>, now: DateTime<Utc>) -> Result<()> {
        self.transition_guard("reject", &[BookingStatus::Pending])?;
        self.status = BookingStatus::Rejected;
        self.rejected_at = Some(now);
        self.owner_response = response;
        self.updated_at = now;
        Ok(())
    }

    /// Pending/Approved -> Cancelled.
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<()> {
        self.transition_guard("cancel", &[BookingStatus::Pending, BookingStatus::Approved])?;
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancellation_reason = reason;
        self.updated_at = now;
        Ok(())
    }

    /// Approved -> Active.
    pub fn mark_active(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition_guard("activate", &[BookingStatus::Approved])?;
        self.status = BookingStatus::Active;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Active -> Completed.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition_guard("complete", &[BookingStatus::Active])?;
        self.status = BookingStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::equipment::{EquipmentStatus, RateCard};
    use crate::domain::pricing;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn fixture() -> Booking {
        let equipment = Equipment {
            id: EquipmentId(7),
            owner: UserId(1),
            is_active: true,
            status: EquipmentStatus::Available,
            rates: RateCard {
                hourly_rate: None,
                daily_rate: Money::new(dec!(150)),
                deposit_amount: Money::new(dec!(50)),
                minimum_rental_hours: 4,
                currency: "USD".to_string(),
            },
        };
        let interval = RentalInterval::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let quote = pricing::quote(&equipment.rates, &interval, dec!(12)).unwrap();
        Booking::new(
            BookingId(1),
            UserId(2),
            &equipment,
            interval,
            quote,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_new_booking_snapshot() {
        let booking = fixture();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.total_amount, Money::new(dec!(300)));
        assert_eq!(booking.amount_due(), Money::new(dec!(350)));
        assert_eq!(
            booking.platform_fee + booking.owner_payout,
            booking.total_amount
        );
    }

    #[test]
    fn test_approve_sets_timestamp_once() {
        let mut booking = fixture();
        let t = Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap();
        booking.approve(Some("ok".to_string()), t).unwrap();
        assert_eq!(booking.status, BookingStatus::Approved);
        assert_eq!(booking.approved_at, Some(t));

        // Second approval is an invalid transition and leaves the timestamp.
        let later = Utc.with_ymd_and_hms(2025, 5, 21, 12, 0, 0).unwrap();
        let err = booking.approve(None, later).unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidTransition {
                action: "approve",
                status: BookingStatus::Approved,
            }
        ));
        assert_eq!(booking.approved_at, Some(t));
    }

    #[test]
    fn test_cancel_from_pending_and_approved_only() {
        let mut pending = fixture();
        assert!(pending.cancel(None, Utc::now()).is_ok());

        let mut approved = fixture();
        approved.approve(None, Utc::now()).unwrap();
        assert!(approved.cancel(Some("weather".to_string()), Utc::now()).is_ok());
        assert_eq!(approved.cancellation_reason.as_deref(), Some("weather"));

        let mut active = fixture();
        active.approve(None, Utc::now()).unwrap();
        active.mark_active(Utc::now()).unwrap();
        assert!(matches!(
            active.cancel(None, Utc::now()),
            Err(BookingError::InvalidTransition { action: "cancel", .. })
        ));
    }

    #[test]
    fn test_terminal_states_stay_terminal() {
        let mut booking = fixture();
        booking.reject(None, Utc::now()).unwrap();
        assert!(booking.status.is_terminal());
        assert!(booking.approve(None, Utc::now()).is_err());
        assert!(booking.cancel(None, Utc::now()).is_err());
        assert!(booking.mark_active(Utc::now()).is_err());
        assert!(booking.complete(Utc::now()).is_err());
    }

    #[test]
    fn test_full_happy_path() {
        let mut booking = fixture();
        booking.approve(None, Utc::now()).unwrap();
        booking.mark_active(Utc::now()).unwrap();
        booking.complete(Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);
        assert!(booking.approved_at.is_some());
        assert!(booking.started_at.is_some());
        assert!(booking.completed_at.is_some());
    }
}
