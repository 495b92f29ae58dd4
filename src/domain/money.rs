use crate::error::{BookingError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Decimal places of the currency minor unit (cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

/// A monetary value in currency major units.
///
/// Wrapper around `rust_decimal::Decimal` to keep financial arithmetic
/// type-safe. Conversion to integer minor units lives here but is only
/// exercised at the payment-provider boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Rounds to minor-unit precision, half up.
    pub fn round_minor(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Converts to integer minor units (cents), rounding half up.
    ///
    /// This is the single major-to-minor conversion boundary; all amounts
    /// handed to the payment provider go through it.
    pub fn minor_units(self) -> Result<i64> {
        let scaled = (self.0 * Decimal::from(10u32.pow(MINOR_UNIT_SCALE)))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        scaled.to_i64().ok_or_else(|| {
            BookingError::Internal(
                format!("amount {} overflows minor units", self.0).into(),
            )
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}
