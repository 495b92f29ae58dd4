use crate::application::availability::AvailabilityChecker;
use crate::config::PlatformConfig;
use crate::domain::actor::{self, Actor};
use crate::domain::booking::{Booking, BookingStatus, PaymentStatus};
use crate::domain::equipment::EquipmentStatus;
use crate::domain::event::BookingEvent;
use crate::domain::interval::RentalInterval;
use crate::domain::ports::{BookingStoreRef, EquipmentDirectoryRef, EventSinkRef};
use crate::domain::pricing;
use crate::domain::{BookingId, EquipmentId};
use crate::error::{BookingError, Result};
use chrono::Utc;
use std::sync::Arc;

/// A renter's request to reserve one piece of equipment for a date range.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub id: BookingId,
    pub equipment: EquipmentId,
    pub interval: RentalInterval,
    pub renter_notes: Option<String>,
}

/// The booking state machine.
///
/// Owns every lifecycle transition and its guards. Transitions commit
/// through compare-and-swap writes against the booking store, and committed
/// APPROVED/ACTIVE intervals are tracked in the availability checker's
/// index, whose transactional check-and-insert guarantees that two
/// overlapping bookings can never both reach APPROVED. Lifecycle events are
/// published only after the transition has committed; a publish failure is
/// logged and never rolls the transition back.
pub struct BookingEngine {
    bookings: BookingStoreRef,
    equipment: EquipmentDirectoryRef,
    events: EventSinkRef,
    availability: Arc<AvailabilityChecker>,
    config: PlatformConfig,
}

impl BookingEngine {
    pub fn new(
        bookings: BookingStoreRef,
        equipment: EquipmentDirectoryRef,
        events: EventSinkRef,
        availability: Arc<AvailabilityChecker>,
        config: PlatformConfig,
    ) -> Self {
        Self {
            bookings,
            equipment,
            events,
            availability,
            config,
        }
    }

    /// Creates a new PENDING booking on behalf of the acting renter.
    ///
    /// The rate card and platform fee percentage are snapshotted into the
    /// booking here; neither is ever re-read. Pending requests do not block
    /// one another, so several renters may hold overlapping pending offers
    /// until the owner approves one.
    pub async fn create(&self, actor: Actor, request: BookingRequest) -> Result<Booking> {
        let equipment = self
            .equipment
            .get(request.equipment)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("equipment {}", request.equipment)))?;

        if equipment.owner == actor.id {
            return Err(BookingError::Conflict(
                "you cannot book your own equipment".to_string(),
            ));
        }
        if !equipment.is_active {
            return Err(BookingError::Conflict(format!(
                "equipment {} is not available for booking",
                equipment.id
            )));
        }
        if self
            .availability
            .has_conflict(equipment.id, &request.interval)
        {
            return Err(BookingError::Conflict(format!(
                "equipment {} is not available for the selected dates",
                equipment.id
            )));
        }

        let quote = pricing::quote(
            &equipment.rates,
            &request.interval,
            self.config.platform_fee_percentage,
        )?;
        let booking = Booking::new(
            request.id,
            actor.id,
            &equipment,
            request.interval,
            quote,
            request.renter_notes,
            Utc::now(),
        );

        self.bookings.insert(booking.clone()).await?;
        tracing::info!(booking = %booking.id, equipment = %booking.equipment, "booking requested");

        self.publish(BookingEvent::Created {
            booking: booking.id,
            equipment: booking.equipment,
            renter: booking.renter,
            owner: booking.owner,
        })
        .await;

        Ok(booking)
    }

    /// PENDING -> APPROVED, owner only.
    ///
    /// Reserves the interval in the committed index before the write; the
    /// reservation is rolled back if the compare-and-swap loses a race.
    /// Other overlapping pending requests are left alone and will fail with
    /// `Conflict` if their own approval is attempted later.
    pub async fn approve(
        &self,
        id: BookingId,
        actor: Actor,
        response: Option<String>,
    ) -> Result<Booking> {
        let mut booking = self.load(id).await?;
        actor::ensure_owner(&actor, &booking)?;
        booking.approve(response, Utc::now())?;

        let newly_reserved = self
            .availability
            .index()
            .reserve(booking.equipment, booking.id, booking.interval)?;

        if !self
            .bookings
            .replace_if_status(booking.clone(), BookingStatus::Pending)
            .await?
        {
            // Roll back only a reservation this call made: a stale approve
            // that lost to a committed one must not erase the winner's entry.
            if newly_reserved {
                self.availability.index().release(booking.equipment, booking.id);
            }
            return Err(self.lost_race("approve", id).await);
        }
        tracing::info!(booking = %booking.id, "booking approved");

        self.publish(BookingEvent::Approved {
            booking: booking.id,
            renter: booking.renter,
            amount_due: booking.amount_due(),
            currency: booking.currency.clone(),
        })
        .await;

        Ok(booking)
    }

    /// PENDING -> REJECTED, owner only.
    pub async fn reject(
        &self,
        id: BookingId,
        actor: Actor,
        response: Option<String>,
    ) -> Result<Booking> {
        let mut booking = self.load(id).await?;
        actor::ensure_owner(&actor, &booking)?;
        booking.reject(response, Utc::now())?;

        if !self
            .bookings
            .replace_if_status(booking.clone(), BookingStatus::Pending)
            .await?
        {
            return Err(self.lost_race("reject", id).await);
        }
        tracing::info!(booking = %booking.id, "booking rejected");
        Ok(booking)
    }

    /// PENDING/APPROVED -> CANCELLED, either participant.
    ///
    /// When the booking was already paid, emits `booking.cancelled` with the
    /// refund amount (rental total plus deposit) exactly once.
    pub async fn cancel(
        &self,
        id: BookingId,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Booking> {
        let mut booking = self.load(id).await?;
        actor::ensure_participant(&actor, &booking)?;
        let previous = booking.status;
        booking.cancel(reason, Utc::now())?;

        if !self
            .bookings
            .replace_if_status(booking.clone(), previous)
            .await?
        {
            return Err(self.lost_race("cancel", id).await);
        }
        if previous == BookingStatus::Approved {
            self.availability.index().release(booking.equipment, booking.id);
        }
        tracing::info!(booking = %booking.id, "booking cancelled");

        if booking.payment_status == PaymentStatus::Paid {
            self.publish(BookingEvent::Cancelled {
                booking: booking.id,
                renter: booking.renter,
                refund_amount: booking.amount_due(),
                currency: booking.currency.clone(),
            })
            .await;
        }

        Ok(booking)
    }

    /// APPROVED -> ACTIVE; the rental has started, the equipment is out.
    pub async fn mark_active(&self, id: BookingId) -> Result<Booking> {
        let mut booking = self.load(id).await?;
        booking.mark_active(Utc::now())?;

        if !self
            .bookings
            .replace_if_status(booking.clone(), BookingStatus::Approved)
            .await?
        {
            return Err(self.lost_race("activate", id).await);
        }
        self.equipment
            .set_status(booking.equipment, EquipmentStatus::Rented)
            .await?;
        tracing::info!(booking = %booking.id, "booking active");
        Ok(booking)
    }

    /// ACTIVE -> COMPLETED; frees the equipment and triggers the payout.
    pub async fn complete(&self, id: BookingId) -> Result<Booking> {
        let mut booking = self.load(id).await?;
        booking.complete(Utc::now())?;

        if !self
            .bookings
            .replace_if_status(booking.clone(), BookingStatus::Active)
            .await?
        {
            return Err(self.lost_race("complete", id).await);
        }
        self.availability.index().release(booking.equipment, booking.id);
        self.equipment
            .set_status(booking.equipment, EquipmentStatus::Available)
            .await?;
        tracing::info!(booking = %booking.id, "booking completed");

        self.publish(BookingEvent::Completed {
            booking: booking.id,
            owner: booking.owner,
            payout_amount: booking.owner_payout,
            currency: booking.currency.clone(),
        })
        .await;

        Ok(booking)
    }

    /// Records the outcome of a payment action on the independent payment
    /// axis. Called back by the escrow orchestrator.
    pub async fn set_payment_status(&self, id: BookingId, status: PaymentStatus) -> Result<()> {
        self.bookings.set_payment_status(id, status).await
    }

    pub async fn get(&self, id: BookingId) -> Result<Booking> {
        self.load(id).await
    }

    /// Occupied intervals for a month, for availability display.
    pub fn calendar(
        &self,
        equipment: EquipmentId,
        month: u32,
        year: i32,
    ) -> Result<Vec<RentalInterval>> {
        self.availability.calendar_for(equipment, month, year)
    }

    async fn load(&self, id: BookingId) -> Result<Booking> {
        self.bookings
            .get(id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))
    }

    /// A compare-and-swap miss means another transition committed first;
    /// report it as an invalid transition from the now-current status.
    async fn lost_race(&self, action: &'static str, id: BookingId) -> BookingError {
        let status = match self.bookings.get(id).await {
            Ok(Some(current)) => current.status,
            _ => BookingStatus::Pending,
        };
        BookingError::InvalidTransition { action, status }
    }

    async fn publish(&self, event: BookingEvent) {
        if let Err(e) = self.events.emit(event).await {
            // The transition is already committed; delivery is at-least-once
            // and retried by the eventing collaborator.
            tracing::warn!(error = %e, "event emission failed after commit");
        }
    }
}
