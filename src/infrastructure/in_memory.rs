use crate::domain::booking::{Booking, BookingStatus, PaymentStatus};
use crate::domain::equipment::{Equipment, EquipmentStatus};
use crate::domain::event::BookingEvent;
use crate::domain::ports::{
    BookingStore, EquipmentDirectory, EventHandler, EventSink, HoldRef, PaymentProvider,
};
use crate::domain::{BookingId, EquipmentId, UserId};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for bookings.
///
/// Uses `RwLock<HashMap<BookingId, Booking>>` for shared concurrent access.
/// The compare-and-swap in `replace_if_status` happens under the write
/// lock, so concurrent transitions on one booking serialize cleanly.
#[derive(Default)]
pub struct InMemoryBookingStore {
    bookings: RwLock<HashMap<BookingId, Booking>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: Booking) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(BookingError::Conflict(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(&id).cloned())
    }

    async fn replace_if_status(&self, booking: Booking, expected: BookingStatus) -> Result<bool> {
        let mut bookings = self.bookings.write().await;
        match bookings.get(&booking.id) {
            Some(current) if current.status == expected => {
                bookings.insert(booking.id, booking);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(BookingError::NotFound(format!("booking {}", booking.id))),
        }
    }

    async fn set_payment_status(&self, id: BookingId, status: PaymentStatus) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))?;
        booking.payment_status = status;
        Ok(())
    }

    async fn for_equipment(&self, equipment: EquipmentId) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .filter(|b| b.equipment == equipment)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        let mut all: Vec<Booking> = bookings.values().cloned().collect();
        all.sort_by_key(|b| b.id);
        Ok(all)
    }
}

/// In-memory stand-in for the external equipment catalog.
#[derive(Default)]
pub struct InMemoryEquipmentDirectory {
    equipment: RwLock<HashMap<EquipmentId, Equipment>>,
}

impl InMemoryEquipmentDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EquipmentDirectory for InMemoryEquipmentDirectory {
    async fn get(&self, id: EquipmentId) -> Result<Option<Equipment>> {
        let equipment = self.equipment.read().await;
        Ok(equipment.get(&id).cloned())
    }

    async fn set_status(&self, id: EquipmentId, status: EquipmentStatus) -> Result<()> {
        let mut equipment = self.equipment.write().await;
        let item = equipment
            .get_mut(&id)
            .ok_or_else(|| BookingError::NotFound(format!("equipment {id}")))?;
        item.status = status;
        Ok(())
    }

    async fn register(&self, item: Equipment) -> Result<()> {
        let mut equipment = self.equipment.write().await;
        equipment.insert(item.id, item);
        Ok(())
    }
}

/// Queueing event bus with at-least-once delivery.
///
/// `emit` enqueues; `deliver_pending` drains FIFO (which preserves
/// per-booking order) into a handler. A handler error puts the event back
/// at the front of the queue so the next delivery attempt sees it again.
#[derive(Default)]
pub struct InMemoryEventBus {
    queue: StdMutex<VecDeque<BookingEvent>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of undelivered events.
    pub fn pending(&self) -> usize {
        self.queue.lock().expect("event queue poisoned").len()
    }

    /// Removes and returns all queued events without delivering them.
    pub fn drain(&self) -> Vec<BookingEvent> {
        self.queue
            .lock()
            .expect("event queue poisoned")
            .drain(..)
            .collect()
    }

    /// Delivers queued events in order until the queue is empty or a
    /// handler fails; returns how many were delivered.
    pub async fn deliver_pending(&self, handler: &dyn EventHandler) -> Result<usize> {
        let mut delivered = 0;
        loop {
            let next = self.queue.lock().expect("event queue poisoned").pop_front();
            let Some(event) = next else { break };
            if let Err(e) = handler.handle(&event).await {
                self.queue
                    .lock()
                    .expect("event queue poisoned")
                    .push_front(event);
                return Err(e);
            }
            delivered += 1;
        }
        Ok(delivered)
    }
}

#[async_trait]
impl EventSink for InMemoryEventBus {
    async fn emit(&self, event: BookingEvent) -> Result<()> {
        self.queue
            .lock()
            .expect("event queue poisoned")
            .push_back(event);
        Ok(())
    }
}

/// One call made against the recording payment provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Hold {
        booking: BookingId,
        payer: UserId,
        amount_minor: i64,
        currency: String,
    },
    Capture {
        hold: HoldRef,
    },
    Refund {
        hold: HoldRef,
        amount_minor: i64,
    },
    Payout {
        booking: BookingId,
        destination: UserId,
        amount_minor: i64,
        currency: String,
    },
}

/// Recording payment provider used by tests and the replay binary.
///
/// Succeeds by default, logs every call, and can be told to fail specific
/// operations or to delay responses (for timeout behavior). Hold creation
/// is idempotent per booking id, matching the provider contract.
#[derive(Default)]
pub struct RecordingPaymentProvider {
    calls: StdMutex<Vec<ProviderCall>>,
    holds: StdMutex<HashMap<BookingId, HoldRef>>,
    fail_holds: AtomicBool,
    fail_captures: AtomicBool,
    fail_refunds: AtomicBool,
    fail_payouts: AtomicBool,
    delay: StdMutex<Option<Duration>>,
}

impl RecordingPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().expect("provider calls poisoned").clone()
    }

    pub fn fail_holds(&self, fail: bool) {
        self.fail_holds.store(fail, Ordering::SeqCst);
    }

    pub fn fail_captures(&self, fail: bool) {
        self.fail_captures.store(fail, Ordering::SeqCst);
    }

    pub fn fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    pub fn fail_payouts(&self, fail: bool) {
        self.fail_payouts.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().expect("provider delay poisoned") = delay;
    }

    async fn simulate_latency(&self) {
        let delay = *self.delay.lock().expect("provider delay poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().expect("provider calls poisoned").push(call);
    }
}

#[async_trait]
impl PaymentProvider for RecordingPaymentProvider {
    async fn create_hold(
        &self,
        amount_minor: i64,
        currency: &str,
        payer: UserId,
        booking: BookingId,
    ) -> Result<HoldRef> {
        self.simulate_latency().await;
        if self.fail_holds.load(Ordering::SeqCst) {
            return Err(BookingError::PaymentFailure(
                "provider declined hold".to_string(),
            ));
        }
        self.record(ProviderCall::Hold {
            booking,
            payer,
            amount_minor,
            currency: currency.to_string(),
        });
        let mut holds = self.holds.lock().expect("provider holds poisoned");
        let hold = holds
            .entry(booking)
            .or_insert_with(|| HoldRef(format!("hold-{booking}")));
        Ok(hold.clone())
    }

    async fn capture(&self, hold: &HoldRef) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_captures.load(Ordering::SeqCst) {
            return Err(BookingError::PaymentFailure(
                "provider declined capture".to_string(),
            ));
        }
        self.record(ProviderCall::Capture { hold: hold.clone() });
        Ok(())
    }

    async fn refund(&self, hold: &HoldRef, amount_minor: i64) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(BookingError::PaymentFailure(
                "provider declined refund".to_string(),
            ));
        }
        self.record(ProviderCall::Refund {
            hold: hold.clone(),
            amount_minor,
        });
        Ok(())
    }

    async fn payout(
        &self,
        destination: UserId,
        amount_minor: i64,
        currency: &str,
        booking: BookingId,
    ) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_payouts.load(Ordering::SeqCst) {
            return Err(BookingError::PaymentFailure(
                "provider declined payout".to_string(),
            ));
        }
        self.record(ProviderCall::Payout {
            booking,
            destination,
            amount_minor,
            currency: currency.to_string(),
        });
        Ok(())
    }
}
