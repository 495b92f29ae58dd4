use crate::domain::booking::{Booking, BookingStatus, PaymentStatus};
use crate::domain::money::Money;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Flat CSV projection of a booking's final state.
#[derive(Debug, Serialize, PartialEq)]
struct BookingRow {
    booking: u64,
    equipment: u64,
    renter: u64,
    owner: u64,
    status: BookingStatus,
    payment: PaymentStatus,
    total: Money,
    fee: Money,
    payout: Money,
    deposit: Money,
}

impl From<&Booking> for BookingRow {
    fn from(booking: &Booking) -> Self {
        Self {
            booking: booking.id.0,
            equipment: booking.equipment.0,
            renter: booking.renter.0,
            owner: booking.owner.0,
            status: booking.status,
            payment: booking.payment_status,
            total: booking.total_amount,
            fee: booking.platform_fee,
            payout: booking.owner_payout,
            deposit: booking.deposit_amount,
        }
    }
}

/// Writes the final booking table as CSV.
pub struct BookingWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BookingWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_bookings(&mut self, bookings: &[Booking]) -> Result<()> {
        for booking in bookings {
            self.writer.serialize(BookingRow::from(booking))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::equipment::{Equipment, EquipmentStatus, RateCard};
    use crate::domain::interval::RentalInterval;
    use crate::domain::pricing;
    use crate::domain::{BookingId, EquipmentId, UserId};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_writes_header_and_rows() {
        let equipment = Equipment {
            id: EquipmentId(10),
            owner: UserId(1),
            is_active: true,
            status: EquipmentStatus::Available,
            rates: RateCard {
                hourly_rate: None,
                daily_rate: Money::new(dec!(150)),
                deposit_amount: Money::new(dec!(50)),
                minimum_rental_hours: 4,
                currency: "USD".to_string(),
            },
        };
        let interval = RentalInterval::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let quote = pricing::quote(&equipment.rates, &interval, dec!(12)).unwrap();
        let booking = Booking::new(
            BookingId(1),
            UserId(2),
            &equipment,
            interval,
            quote,
            None,
            Utc::now(),
        );

        let mut buffer = Vec::new();
        BookingWriter::new(&mut buffer)
            .write_bookings(std::slice::from_ref(&booking))
            .unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.starts_with(
            "booking,equipment,renter,owner,status,payment,total,fee,payout,deposit"
        ));
        assert!(output.contains("1,10,2,1,pending,pending,300,36,264,50"));
    }
}
