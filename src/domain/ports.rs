use crate::domain::booking::{Booking, BookingStatus, PaymentStatus};
use crate::domain::equipment::{Equipment, EquipmentStatus};
use crate::domain::event::BookingEvent;
use crate::domain::{BookingId, EquipmentId, UserId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Persistence port for bookings.
///
/// `replace_if_status` is the compare-and-swap primitive every transition
/// commits through: the write only lands if the persisted copy still has the
/// expected status, which turns double-approve and approve-after-cancel
/// races into clean `InvalidTransition` failures.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a new booking; fails if the id is already taken.
    async fn insert(&self, booking: Booking) -> Result<()>;
    async fn get(&self, id: BookingId) -> Result<Option<Booking>>;
    /// Compare-and-swap write. Returns `false` when the stored status no
    /// longer matches `expected`, leaving the store untouched.
    async fn replace_if_status(&self, booking: Booking, expected: BookingStatus) -> Result<bool>;
    /// Updates the payment axis only; lifecycle status is untouched.
    async fn set_payment_status(&self, id: BookingId, status: PaymentStatus) -> Result<()>;
    async fn for_equipment(&self, equipment: EquipmentId) -> Result<Vec<Booking>>;
    async fn all(&self) -> Result<Vec<Booking>>;
}

/// Read/write slice of the external equipment catalog.
#[async_trait]
pub trait EquipmentDirectory: Send + Sync {
    async fn get(&self, id: EquipmentId) -> Result<Option<Equipment>>;
    async fn set_status(&self, id: EquipmentId, status: EquipmentStatus) -> Result<()>;
    /// Seeds a listing; used by tests and the replay binary.
    async fn register(&self, equipment: Equipment) -> Result<()>;
}

/// Opaque reference to a payment hold at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldRef(pub String);

/// External payment provider. All amounts are integer minor units; all
/// calls must be idempotent given the same booking id so retries are safe.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Authorizes funds without transferring them (manual capture mode).
    async fn create_hold(
        &self,
        amount_minor: i64,
        currency: &str,
        payer: UserId,
        booking: BookingId,
    ) -> Result<HoldRef>;
    /// Converts an authorized hold into an actual transfer.
    async fn capture(&self, hold: &HoldRef) -> Result<()>;
    async fn refund(&self, hold: &HoldRef, amount_minor: i64) -> Result<()>;
    /// Transfers an owner's earnings to their connected payout account.
    async fn payout(
        &self,
        destination: UserId,
        amount_minor: i64,
        currency: &str,
        booking: BookingId,
    ) -> Result<()>;
}

/// Publishing side of the event bus. Emission happens strictly after the
/// transition that caused the event has committed.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: BookingEvent) -> Result<()>;
}

/// Consuming side of the event bus. Handlers must tolerate at-least-once
/// delivery; a returned error makes the bus redeliver the event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &BookingEvent) -> Result<()>;
}

pub type BookingStoreRef = Arc<dyn BookingStore>;
pub type EquipmentDirectoryRef = Arc<dyn EquipmentDirectory>;
pub type PaymentProviderRef = Arc<dyn PaymentProvider>;
pub type EventSinkRef = Arc<dyn EventSink>;
