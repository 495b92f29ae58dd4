use agrirent::application::availability::AvailabilityChecker;
use agrirent::application::engine::{BookingEngine, BookingRequest};
use agrirent::application::escrow::EscrowOrchestrator;
use agrirent::config::PlatformConfig;
use agrirent::domain::equipment::{Equipment, EquipmentStatus, RateCard};
use agrirent::domain::interval::RentalInterval;
use agrirent::domain::money::Money;
use agrirent::domain::ports::EquipmentDirectory;
use agrirent::domain::{BookingId, EquipmentId, UserId};
use agrirent::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryEquipmentDirectory, InMemoryEventBus, RecordingPaymentProvider,
};
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

pub const OWNER: UserId = UserId(1);
pub const RENTER: UserId = UserId(2);
pub const EXCAVATOR: EquipmentId = EquipmentId(10);

/// A fully wired in-memory deployment: engine, event bus and escrow
/// orchestrator, with one piece of equipment registered.
pub struct Harness {
    pub engine: Arc<BookingEngine>,
    pub escrow: EscrowOrchestrator,
    pub bus: Arc<InMemoryEventBus>,
    pub provider: Arc<RecordingPaymentProvider>,
    pub store: Arc<InMemoryBookingStore>,
}

impl Harness {
    /// Pushes queued lifecycle events into the escrow orchestrator.
    pub async fn deliver(&self) -> usize {
        self.bus.deliver_pending(&self.escrow).await.unwrap()
    }
}

pub async fn harness() -> Harness {
    let directory = Arc::new(InMemoryEquipmentDirectory::new());
    directory
        .register(Equipment {
            id: EXCAVATOR,
            owner: OWNER,
            is_active: true,
            status: EquipmentStatus::Available,
            rates: RateCard {
                hourly_rate: Some(Money::new(dec!(20))),
                daily_rate: Money::new(dec!(150)),
                deposit_amount: Money::new(dec!(50)),
                minimum_rental_hours: 4,
                currency: "USD".to_string(),
            },
        })
        .await
        .unwrap();

    let store = Arc::new(InMemoryBookingStore::new());
    let bus = Arc::new(InMemoryEventBus::new());
    let provider = Arc::new(RecordingPaymentProvider::new());
    let engine = Arc::new(BookingEngine::new(
        store.clone(),
        directory,
        bus.clone(),
        Arc::new(AvailabilityChecker::new()),
        PlatformConfig::default(),
    ));
    let escrow = EscrowOrchestrator::new(
        provider.clone(),
        store.clone(),
        Duration::from_millis(500),
    );
    Harness {
        engine,
        escrow,
        bus,
        provider,
        store,
    }
}

/// A request for `EXCAVATOR` spanning midnight-to-midnight June days.
pub fn request(id: u64, from_day: u32, to_day: u32) -> BookingRequest {
    BookingRequest {
        id: BookingId(id),
        equipment: EXCAVATOR,
        interval: RentalInterval::new(
            Utc.with_ymd_and_hms(2025, 6, from_day, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, to_day, 0, 0, 0).unwrap(),
        )
        .unwrap(),
        renter_notes: None,
    }
}
