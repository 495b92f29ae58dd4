use crate::domain::booking::PaymentStatus;
use crate::domain::event::{BookingEvent, EventKind};
use crate::domain::money::Money;
use crate::domain::ports::{
    BookingStoreRef, EventHandler, HoldRef, PaymentProviderRef,
};
use crate::domain::{BookingId, UserId};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

/// A payout that failed at the provider and is parked for the external
/// retry job.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPayout {
    pub booking: BookingId,
    pub destination: UserId,
    pub amount_minor: i64,
    pub currency: String,
}

/// Couples booking lifecycle events to payment-provider actions.
///
/// Escrow flow: hold at approval, capture at explicit payment confirmation,
/// refund on paid cancellation, payout at completion. The orchestrator is
/// idempotent per `(booking id, event kind)` so at-least-once event delivery
/// is safe, and it is the single boundary where major-unit amounts become
/// integer minor units. Every provider call runs under a bounded timeout,
/// and a timed-out call leaves the booking in its pre-call state for a
/// safe retry; only an actual provider decline records a FAILED capture.
pub struct EscrowOrchestrator {
    provider: PaymentProviderRef,
    bookings: BookingStoreRef,
    holds: Mutex<HashMap<BookingId, HoldRef>>,
    processed: Mutex<HashSet<(BookingId, EventKind)>>,
    pending_payouts: Mutex<Vec<PendingPayout>>,
    call_timeout: Duration,
}

impl EscrowOrchestrator {
    pub fn new(
        provider: PaymentProviderRef,
        bookings: BookingStoreRef,
        call_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            bookings,
            holds: Mutex::new(HashMap::new()),
            processed: Mutex::new(HashSet::new()),
            pending_payouts: Mutex::new(Vec::new()),
            call_timeout,
        }
    }

    /// External trigger: the renter confirmed payment, capture the hold.
    ///
    /// On success the booking's payment status becomes PAID; a provider
    /// decline is recorded as FAILED. A timed-out capture leaves the
    /// payment axis untouched so the confirmation can simply be retried.
    pub async fn confirm_payment(&self, booking: BookingId) -> Result<()> {
        let hold = self
            .holds
            .lock()
            .expect("holds poisoned")
            .get(&booking)
            .cloned()
            .ok_or_else(|| {
                BookingError::PaymentFailure(format!("no payment hold for booking {booking}"))
            })?;

        match tokio::time::timeout(self.call_timeout, self.provider.capture(&hold)).await {
            Ok(Ok(())) => {
                self.bookings
                    .set_payment_status(booking, PaymentStatus::Paid)
                    .await?;
                tracing::info!(booking = %booking, "payment captured");
                Ok(())
            }
            Ok(Err(e)) => {
                self.bookings
                    .set_payment_status(booking, PaymentStatus::Failed)
                    .await?;
                tracing::warn!(booking = %booking, error = %e, "payment capture declined");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(booking = %booking, "payment capture timed out");
                Err(BookingError::PaymentFailure(format!(
                    "payment provider call exceeded {:?}",
                    self.call_timeout
                )))
            }
        }
    }

    /// Payouts parked after a provider failure, for the external retry job.
    pub fn pending_payouts(&self) -> Vec<PendingPayout> {
        self.pending_payouts
            .lock()
            .expect("pending payouts poisoned")
            .clone()
    }

    /// Retries every parked payout once; payouts that succeed are removed.
    pub async fn retry_pending_payouts(&self) -> Result<usize> {
        let parked = {
            let mut pending = self.pending_payouts.lock().expect("pending payouts poisoned");
            std::mem::take(&mut *pending)
        };
        let mut transferred = 0;
        for payout in parked {
            match self
                .bounded(self.provider.payout(
                    payout.destination,
                    payout.amount_minor,
                    &payout.currency,
                    payout.booking,
                ))
                .await
            {
                Ok(()) => transferred += 1,
                Err(e) => {
                    tracing::warn!(booking = %payout.booking, error = %e, "payout retry failed");
                    self.pending_payouts
                        .lock()
                        .expect("pending payouts poisoned")
                        .push(payout);
                }
            }
        }
        Ok(transferred)
    }

    fn already_processed(&self, booking: BookingId, kind: EventKind) -> bool {
        self.processed
            .lock()
            .expect("processed poisoned")
            .contains(&(booking, kind))
    }

    fn mark_processed(&self, booking: BookingId, kind: EventKind) {
        self.processed
            .lock()
            .expect("processed poisoned")
            .insert((booking, kind));
    }

    async fn bounded<F>(&self, call: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BookingError::PaymentFailure(format!(
                "payment provider call exceeded {:?}",
                self.call_timeout
            ))),
        }
    }

    async fn on_approved(
        &self,
        booking: BookingId,
        renter: UserId,
        amount_due: Money,
        currency: &str,
    ) -> Result<()> {
        let amount_minor = amount_due.minor_units()?;
        let hold = match tokio::time::timeout(
            self.call_timeout,
            self.provider.create_hold(amount_minor, currency, renter, booking),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                // Booking stays APPROVED with payment PENDING; the UI shows
                // "payment required" and the event is redelivered.
                return Err(BookingError::PaymentFailure(format!(
                    "hold creation for booking {booking} timed out"
                )));
            }
        };
        self.holds
            .lock()
            .expect("holds poisoned")
            .insert(booking, hold);
        tracing::info!(booking = %booking, amount_minor, "payment hold created");
        Ok(())
    }

    async fn on_cancelled(&self, booking: BookingId, refund_amount: Money) -> Result<()> {
        let hold = self
            .holds
            .lock()
            .expect("holds poisoned")
            .get(&booking)
            .cloned()
            .ok_or_else(|| {
                BookingError::PaymentFailure(format!("no payment hold to refund for booking {booking}"))
            })?;
        self.bounded(self.provider.refund(&hold, refund_amount.minor_units()?))
            .await?;
        self.bookings
            .set_payment_status(booking, PaymentStatus::Refunded)
            .await?;
        self.holds.lock().expect("holds poisoned").remove(&booking);
        tracing::info!(booking = %booking, "payment refunded");
        Ok(())
    }

    async fn on_completed(
        &self,
        booking: BookingId,
        owner: UserId,
        payout_amount: Money,
        currency: &str,
    ) -> Result<()> {
        let amount_minor = payout_amount.minor_units()?;
        if let Err(e) = self
            .bounded(self.provider.payout(owner, amount_minor, currency, booking))
            .await
        {
            // Must not block completion: park for the external retry job
            // and acknowledge the event.
            tracing::error!(booking = %booking, error = %e, "owner payout failed, parked for retry");
            self.pending_payouts
                .lock()
                .expect("pending payouts poisoned")
                .push(PendingPayout {
                    booking,
                    destination: owner,
                    amount_minor,
                    currency: currency.to_string(),
                });
        } else {
            tracing::info!(booking = %booking, amount_minor, "owner payout transferred");
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for EscrowOrchestrator {
    async fn handle(&self, event: &BookingEvent) -> Result<()> {
        let key = (event.booking_id(), event.kind());
        if self.already_processed(key.0, key.1) {
            return Ok(());
        }

        match event {
            // Notification concern, external to escrow.
            BookingEvent::Created { .. } => {}
            BookingEvent::Approved {
                booking,
                renter,
                amount_due,
                currency,
            } => {
                self.on_approved(*booking, *renter, *amount_due, currency)
                    .await?
            }
            BookingEvent::Cancelled {
                booking,
                refund_amount,
                ..
            } => self.on_cancelled(*booking, *refund_amount).await?,
            BookingEvent::Completed {
                booking,
                owner,
                payout_amount,
                currency,
            } => {
                self.on_completed(*booking, *owner, *payout_amount, currency)
                    .await?
            }
        }

        self.mark_processed(key.0, key.1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::Booking;
    use crate::domain::equipment::{Equipment, EquipmentStatus, RateCard};
    use crate::domain::interval::RentalInterval;
    use crate::domain::ports::BookingStore;
    use crate::domain::pricing;
    use crate::domain::EquipmentId;
    use crate::infrastructure::in_memory::{
        InMemoryBookingStore, ProviderCall, RecordingPaymentProvider,
    };
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    const OWNER: UserId = UserId(1);
    const RENTER: UserId = UserId(2);

    // 150/day for two days at a 12% fee: total 300, fee 36, payout 264,
    // deposit 50, so the hold covers 350.00 = 35000 minor units.
    fn booking() -> Booking {
        let equipment = Equipment {
            id: EquipmentId(10),
            owner: OWNER,
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
            RENTER,
            &equipment,
            interval,
            quote,
            None,
            Utc::now(),
        )
    }

    async fn fixture() -> (Arc<RecordingPaymentProvider>, Arc<InMemoryBookingStore>, EscrowOrchestrator)
    {
        let provider = Arc::new(RecordingPaymentProvider::new());
        let store = Arc::new(InMemoryBookingStore::new());
        store.insert(booking()).await.unwrap();
        let escrow = EscrowOrchestrator::new(
            provider.clone(),
            store.clone(),
            Duration::from_millis(200),
        );
        (provider, store, escrow)
    }

    fn approved_event() -> BookingEvent {
        BookingEvent::Approved {
            booking: BookingId(1),
            renter: RENTER,
            amount_due: Money::new(dec!(350)),
            currency: "USD".to_string(),
        }
    }

    #[tokio::test]
    async fn test_approval_places_hold_for_total_plus_deposit() {
        let (provider, _store, escrow) = fixture().await;
        escrow.handle(&approved_event()).await.unwrap();
        assert_eq!(
            provider.calls(),
            vec![ProviderCall::Hold {
                booking: BookingId(1),
                payer: RENTER,
                amount_minor: 35000,
                currency: "USD".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_confirm_payment_captures_hold_and_marks_paid() {
        let (provider, store, escrow) = fixture().await;
        escrow.handle(&approved_event()).await.unwrap();

        escrow.confirm_payment(BookingId(1)).await.unwrap();

        let current = store.get(BookingId(1)).await.unwrap().unwrap();
        assert_eq!(current.payment_status, PaymentStatus::Paid);
        assert!(matches!(provider.calls()[1], ProviderCall::Capture { .. }));
    }

    #[tokio::test]
    async fn test_confirm_payment_without_hold_fails() {
        let (_provider, _store, escrow) = fixture().await;
        assert!(matches!(
            escrow.confirm_payment(BookingId(1)).await,
            Err(BookingError::PaymentFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_declined_capture_marks_payment_failed() {
        let (provider, store, escrow) = fixture().await;
        escrow.handle(&approved_event()).await.unwrap();

        provider.fail_captures(true);
        assert!(escrow.confirm_payment(BookingId(1)).await.is_err());

        let current = store.get(BookingId(1)).await.unwrap().unwrap();
        assert_eq!(current.payment_status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancellation_refunds_held_amount() {
        let (provider, store, escrow) = fixture().await;
        escrow.handle(&approved_event()).await.unwrap();
        escrow.confirm_payment(BookingId(1)).await.unwrap();

        escrow
            .handle(&BookingEvent::Cancelled {
                booking: BookingId(1),
                renter: RENTER,
                refund_amount: Money::new(dec!(350)),
                currency: "USD".to_string(),
            })
            .await
            .unwrap();

        let current = store.get(BookingId(1)).await.unwrap().unwrap();
        assert_eq!(current.payment_status, PaymentStatus::Refunded);
        assert!(matches!(
            provider.calls()[2],
            ProviderCall::Refund {
                amount_minor: 35000,
                ..
            }
        ));
        // The refunded hold is released; no second capture can target it.
        assert!(escrow.confirm_payment(BookingId(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_completion_transfers_owner_payout() {
        let (provider, _store, escrow) = fixture().await;
        escrow
            .handle(&BookingEvent::Completed {
                booking: BookingId(1),
                owner: OWNER,
                payout_amount: Money::new(dec!(264)),
                currency: "USD".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(
            provider.calls(),
            vec![ProviderCall::Payout {
                booking: BookingId(1),
                destination: OWNER,
                amount_minor: 26400,
                currency: "USD".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_payout_is_parked_and_retried() {
        let (provider, _store, escrow) = fixture().await;
        provider.fail_payouts(true);

        // The event is acknowledged even though the transfer failed.
        escrow
            .handle(&BookingEvent::Completed {
                booking: BookingId(1),
                owner: OWNER,
                payout_amount: Money::new(dec!(264)),
                currency: "USD".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(escrow.pending_payouts().len(), 1);
        assert_eq!(escrow.pending_payouts()[0].amount_minor, 26400);

        // Still failing: the payout stays parked.
        assert_eq!(escrow.retry_pending_payouts().await.unwrap(), 0);
        assert_eq!(escrow.pending_payouts().len(), 1);

        provider.fail_payouts(false);
        assert_eq!(escrow.retry_pending_payouts().await.unwrap(), 1);
        assert!(escrow.pending_payouts().is_empty());
    }

    #[tokio::test]
    async fn test_redelivered_event_is_a_no_op() {
        let (provider, _store, escrow) = fixture().await;
        escrow.handle(&approved_event()).await.unwrap();
        escrow.handle(&approved_event()).await.unwrap();
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_hold_is_retried_on_redelivery() {
        let (provider, _store, escrow) = fixture().await;
        provider.fail_holds(true);
        assert!(escrow.handle(&approved_event()).await.is_err());

        // The failure left the event unprocessed, so redelivery works.
        provider.fail_holds(false);
        escrow.handle(&approved_event()).await.unwrap();
        escrow.confirm_payment(BookingId(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_provider_call_times_out_without_state_change() {
        let (provider, store, escrow) = fixture().await;
        escrow.handle(&approved_event()).await.unwrap();

        provider.set_delay(Some(Duration::from_secs(5)));
        let result = escrow.confirm_payment(BookingId(1)).await;
        assert!(matches!(result, Err(BookingError::PaymentFailure(_))));

        // The capture timed out rather than being declined, so the payment
        // axis is untouched and the confirmation can be retried.
        let current = store.get(BookingId(1)).await.unwrap().unwrap();
        assert_eq!(current.payment_status, PaymentStatus::Pending);

        provider.set_delay(None);
        escrow.confirm_payment(BookingId(1)).await.unwrap();
        let current = store.get(BookingId(1)).await.unwrap().unwrap();
        assert_eq!(current.payment_status, PaymentStatus::Paid);
    }
}
