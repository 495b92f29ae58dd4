use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::interval::RentalInterval;
use crate::domain::{BookingId, EquipmentId};
use crate::error::{BookingError, Result};
use chrono::{TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Per-equipment index of committed rental intervals.
///
/// Only bookings in APPROVED or ACTIVE occupy the index; pending requests
/// never block each other. `reserve` is the transactional check-and-insert
/// that closes the double-approval race: the internal mutex serializes the
/// overlap check and the insert, so at most one of two overlapping bookings
/// can ever commit into the index, even under true parallel execution.
#[derive(Default)]
pub struct IntervalIndex {
    committed: Mutex<HashMap<EquipmentId, BTreeMap<BookingId, RentalInterval>>>,
}

impl IntervalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the index from persisted bookings, e.g. after reopening a
    /// persistent store.
    pub fn rebuild<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> Self {
        let index = Self::new();
        {
            let mut committed = index.committed.lock().expect("interval index poisoned");
            for booking in bookings {
                if matches!(booking.status, BookingStatus::Approved | BookingStatus::Active) {
                    committed
                        .entry(booking.equipment)
                        .or_default()
                        .insert(booking.id, booking.interval);
                }
            }
        }
        index
    }

    /// True when any committed interval on this equipment overlaps the
    /// candidate (inclusive bounds).
    pub fn has_conflict(&self, equipment: EquipmentId, candidate: &RentalInterval) -> bool {
        let committed = self.committed.lock().expect("interval index poisoned");
        committed
            .get(&equipment)
            .is_some_and(|intervals| intervals.values().any(|i| i.overlaps(candidate)))
    }

    /// Atomically checks for overlap and inserts on success.
    ///
    /// Returns whether the booking was newly inserted. Re-reserving an
    /// already committed booking succeeds without inserting, and the caller
    /// must not release someone else's reservation when rolling back a
    /// reserve that reported `false`.
    pub fn reserve(
        &self,
        equipment: EquipmentId,
        booking: BookingId,
        interval: RentalInterval,
    ) -> Result<bool> {
        let mut committed = self.committed.lock().expect("interval index poisoned");
        let intervals = committed.entry(equipment).or_default();
        if let Some((other, _)) = intervals
            .iter()
            .find(|(id, i)| **id != booking && i.overlaps(&interval))
        {
            return Err(BookingError::Conflict(format!(
                "equipment {equipment} is already reserved by booking {other} for an overlapping period"
            )));
        }
        Ok(intervals.insert(booking, interval).is_none())
    }

    /// Removes a booking's interval; a no-op when it was never committed.
    pub fn release(&self, equipment: EquipmentId, booking: BookingId) {
        let mut committed = self.committed.lock().expect("interval index poisoned");
        if let Some(intervals) = committed.get_mut(&equipment) {
            intervals.remove(&booking);
            if intervals.is_empty() {
                committed.remove(&equipment);
            }
        }
    }

    /// All committed intervals for one equipment, ordered by start.
    pub fn occupied(&self, equipment: EquipmentId) -> Vec<RentalInterval> {
        let committed = self.committed.lock().expect("interval index poisoned");
        let mut intervals: Vec<RentalInterval> = committed
            .get(&equipment)
            .map(|m| m.values().copied().collect())
            .unwrap_or_default();
        intervals.sort_by_key(|i| i.start);
        intervals
    }
}

/// Availability decisions and the calendar projection, backed by the
/// committed-interval index.
#[derive(Default)]
pub struct AvailabilityChecker {
    index: IntervalIndex,
}

impl AvailabilityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_index(index: IntervalIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &IntervalIndex {
        &self.index
    }

    pub fn has_conflict(&self, equipment: EquipmentId, candidate: &RentalInterval) -> bool {
        self.index.has_conflict(equipment, candidate)
    }

    /// Occupied intervals intersecting the given month, for availability
    /// display. Read-only; an empty result means the equipment is fully
    /// open that month.
    pub fn calendar_for(
        &self,
        equipment: EquipmentId,
        month: u32,
        year: i32,
    ) -> Result<Vec<RentalInterval>> {
        let window_start = Utc
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| {
                BookingError::InvalidInterval(format!("invalid calendar month {year}-{month}"))
            })?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let window_end = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| {
                BookingError::InvalidInterval(format!("invalid calendar month {year}-{month}"))
            })?;

        Ok(self
            .index
            .occupied(equipment)
            .into_iter()
            .filter(|i| i.start < window_end && i.end >= window_start)
            .collect())
    }
}
