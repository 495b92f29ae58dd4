use crate::domain::UserId;
use crate::domain::booking::Booking;
use crate::error::{BookingError, Result};
use serde::{Deserialize, Serialize};

/// The capacity in which an authenticated user acts on a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Renter,
    Owner,
}

/// An already-authenticated caller.
///
/// Identity checks happen outside this crate; the engine only performs
/// ownership and participant comparisons against these fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn renter(id: UserId) -> Self {
        Self {
            id,
            role: Role::Renter,
        }
    }

    pub fn owner(id: UserId) -> Self {
        Self {
            id,
            role: Role::Owner,
        }
    }
}

/// Only the equipment owner may act.
pub fn ensure_owner(actor: &Actor, booking: &Booking) -> Result<()> {
    if actor.role != Role::Owner || actor.id != booking.owner {
        return Err(BookingError::Forbidden(format!(
            "only the equipment owner may act on booking {}",
            booking.id
        )));
    }
    Ok(())
}

/// Either party to the booking may act.
pub fn ensure_participant(actor: &Actor, booking: &Booking) -> Result<()> {
    if actor.id != booking.renter && actor.id != booking.owner {
        return Err(BookingError::Forbidden(format!(
            "only booking participants may act on booking {}",
            booking.id
        )));
    }
    Ok(())
}
