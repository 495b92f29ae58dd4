use crate::domain::money::Money;
use crate::domain::{BookingId, EquipmentId, UserId};
use serde::{Deserialize, Serialize};

/// Discriminant used for idempotency keys: the escrow orchestrator acts at
/// most once per `(booking id, event kind)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Approved,
    Cancelled,
    Completed,
}

/// A committed lifecycle transition, published after the state change has
/// been persisted. Delivery is at-least-once and ordered per booking id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum BookingEvent {
    /// `booking.created`: a new pending request exists; consumed by the
    /// notification collaborator.
    Created {
        booking: BookingId,
        equipment: EquipmentId,
        renter: UserId,
        owner: UserId,
    },
    /// `booking.approved`: the owner accepted; the escrow orchestrator
    /// places a hold for rental total plus deposit.
    Approved {
        booking: BookingId,
        renter: UserId,
        amount_due: Money,
        currency: String,
    },
    /// `booking.cancelled`: emitted only when the booking was already
    /// paid; carries the amount to refund.
    Cancelled {
        booking: BookingId,
        renter: UserId,
        refund_amount: Money,
        currency: String,
    },
    /// `booking.completed`: the rental ended; carries the owner payout.
    Completed {
        booking: BookingId,
        owner: UserId,
        payout_amount: Money,
        currency: String,
    },
}

impl BookingEvent {
    pub fn booking_id(&self) -> BookingId {
        match self {
            Self::Created { booking, .. }
            | Self::Approved { booking, .. }
            | Self::Cancelled { booking, .. }
            | Self::Completed { booking, .. } => *booking,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created { .. } => EventKind::Created,
            Self::Approved { .. } => EventKind::Approved,
            Self::Cancelled { .. } => EventKind::Cancelled,
            Self::Completed { .. } => EventKind::Completed,
        }
    }
}
