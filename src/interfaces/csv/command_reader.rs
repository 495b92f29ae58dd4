use crate::domain::equipment::{Equipment, EquipmentStatus, RateCard};
use crate::domain::money::Money;
use crate::domain::{EquipmentId, UserId};
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// Booking action replayed by the CLI.
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandOp {
    Request,
    Approve,
    Reject,
    Cancel,
    Activate,
    Complete,
    Confirm,
}

/// One row of the command CSV.
///
/// Only `request` rows use `equipment`/`start`/`end`; lifecycle actions
/// leave them empty. `actor` is empty for the automatic actions
/// (`activate`, `complete`, `confirm`).
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRow {
    pub op: CommandOp,
    pub booking: u64,
    pub actor: Option<u64>,
    pub equipment: Option<u64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

/// One row of the fleet CSV used to seed the equipment directory.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct FleetRow {
    pub equipment: u64,
    pub owner: u64,
    pub daily_rate: Decimal,
    pub hourly_rate: Option<Decimal>,
    pub deposit: Decimal,
    pub min_hours: u32,
    pub currency: String,
    pub active: bool,
}

impl FleetRow {
    pub fn into_equipment(self) -> Equipment {
        Equipment {
            id: EquipmentId(self.equipment),
            owner: UserId(self.owner),
            is_active: self.active,
            status: EquipmentStatus::Available,
            rates: RateCard {
                hourly_rate: self.hourly_rate.map(Money::new),
                daily_rate: Money::new(self.daily_rate),
                deposit_amount: Money::new(self.deposit),
                minimum_rental_hours: self.min_hours,
                currency: self.currency,
            },
        }
    }
}

/// Reads booking commands from a CSV source.
///
/// Wraps `csv::Reader` as an iterator over `Result<CommandRow>`, trimming
/// whitespace and tolerating short records so lifecycle actions can omit
/// the request-only columns.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g. File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes commands.
    pub fn commands(self) -> impl Iterator<Item = Result<CommandRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BookingError::from))
    }
}

/// Reads the equipment fleet from a CSV source.
pub struct FleetReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> FleetReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn fleet(self) -> impl Iterator<Item = Result<FleetRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BookingError::from))
    }
}
