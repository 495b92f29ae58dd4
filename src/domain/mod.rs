//! Domain layer: entities, value objects and the ports they depend on.

pub mod actor;
pub mod booking;
pub mod equipment;
pub mod event;
pub mod interval;
pub mod money;
pub mod ports;
pub mod pricing;

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Opaque booking identifier, assigned by the caller at request time.
    BookingId
);
id_type!(
    /// Reference to a user in the external identity collaborator.
    UserId
);
id_type!(
    /// Reference to a listing in the external equipment catalog.
    EquipmentId
);
