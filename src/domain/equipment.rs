use crate::domain::money::Money;
use crate::domain::{EquipmentId, UserId};
use serde::{Deserialize, Serialize};

/// Catalog-visible rental status, flipped by the state machine when a
/// booking starts and completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentStatus {
    Available,
    Rented,
}

/// Pricing terms attached to a listing.
///
/// A copy of these values is snapshotted onto every booking at creation
/// time, so rate edits never touch historical bookings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    pub hourly_rate: Option<Money>,
    pub daily_rate: Money,
    pub deposit_amount: Money,
    pub minimum_rental_hours: u32,
    pub currency: String,
}

/// The slice of an equipment listing the booking engine needs.
///
/// Everything else about a listing (photos, location, specs) lives in the
/// external catalog collaborator and is referenced by id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: EquipmentId,
    pub owner: UserId,
    pub is_active: bool,
    pub status: EquipmentStatus,
    pub rates: RateCard,
}
