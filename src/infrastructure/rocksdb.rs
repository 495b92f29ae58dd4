use crate::domain::booking::{Booking, BookingStatus, PaymentStatus};
use crate::domain::equipment::{Equipment, EquipmentStatus};
use crate::domain::ports::{BookingStore, EquipmentDirectory};
use crate::domain::{BookingId, EquipmentId};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Column Family for booking records.
pub const CF_BOOKINGS: &str = "bookings";
/// Column Family for the equipment directory.
pub const CF_EQUIPMENT: &str = "equipment";

/// A persistent store implementation using RocksDB.
///
/// Stores bookings and equipment in separate Column Families as JSON
/// values. Read-modify-write sequences (the status compare-and-swap and
/// payment updates) serialize through an internal mutex because RocksDB
/// itself offers no compare-and-swap.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_bookings = ColumnFamilyDescriptor::new(CF_BOOKINGS, Options::default());
        let cf_equipment = ColumnFamilyDescriptor::new(CF_EQUIPMENT, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_bookings, cf_equipment])?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            BookingError::Internal(format!("column family {name} not found").into())
        })
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value)
            .map_err(|e| BookingError::Internal(format!("serialization error: {e}").into()))
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| BookingError::Internal(format!("deserialization error: {e}").into()))
    }

    fn get_booking_sync(&self, id: BookingId) -> Result<Option<Booking>> {
        let cf = self.cf(CF_BOOKINGS)?;
        match self.db.get_cf(cf, id.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_booking_sync(&self, booking: &Booking) -> Result<()> {
        let cf = self.cf(CF_BOOKINGS)?;
        self.db
            .put_cf(cf, booking.id.0.to_be_bytes(), Self::encode(booking)?)?;
        Ok(())
    }

    fn all_bookings_sync(&self) -> Result<Vec<Booking>> {
        let cf = self.cf(CF_BOOKINGS)?;
        let mut bookings = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            bookings.push(Self::decode(&value)?);
        }
        Ok(bookings)
    }
}

#[async_trait]
impl BookingStore for RocksDbStore {
    async fn insert(&self, booking: Booking) -> Result<()> {
        let _guard = self.write_lock.lock().expect("rocksdb write lock poisoned");
        if self.get_booking_sync(booking.id)?.is_some() {
            return Err(BookingError::Conflict(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        self.put_booking_sync(&booking)
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        self.get_booking_sync(id)
    }

    async fn replace_if_status(&self, booking: Booking, expected: BookingStatus) -> Result<bool> {
        let _guard = self.write_lock.lock().expect("rocksdb write lock poisoned");
        match self.get_booking_sync(booking.id)? {
            Some(current) if current.status == expected => {
                self.put_booking_sync(&booking)?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(BookingError::NotFound(format!("booking {}", booking.id))),
        }
    }

    async fn set_payment_status(&self, id: BookingId, status: PaymentStatus) -> Result<()> {
        let _guard = self.write_lock.lock().expect("rocksdb write lock poisoned");
        let mut booking = self
            .get_booking_sync(id)?
            .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))?;
        booking.payment_status = status;
        self.put_booking_sync(&booking)
    }

    async fn for_equipment(&self, equipment: EquipmentId) -> Result<Vec<Booking>> {
        Ok(self
            .all_bookings_sync()?
            .into_iter()
            .filter(|b| b.equipment == equipment)
            .collect())
    }

    async fn all(&self) -> Result<Vec<Booking>> {
        let mut all = self.all_bookings_sync()?;
        all.sort_by_key(|b| b.id);
        Ok(all)
    }
}

#[async_trait]
impl EquipmentDirectory for RocksDbStore {
    async fn get(&self, id: EquipmentId) -> Result<Option<Equipment>> {
        let cf = self.cf(CF_EQUIPMENT)?;
        match self.db.get_cf(cf, id.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set_status(&self, id: EquipmentId, status: EquipmentStatus) -> Result<()> {
        let _guard = self.write_lock.lock().expect("rocksdb write lock poisoned");
        let cf = self.cf(CF_EQUIPMENT)?;
        let mut equipment: Equipment = match self.db.get_cf(cf, id.0.to_be_bytes())? {
            Some(bytes) => Self::decode(&bytes)?,
            None => return Err(BookingError::NotFound(format!("equipment {id}"))),
        };
        equipment.status = status;
        self.db
            .put_cf(cf, id.0.to_be_bytes(), Self::encode(&equipment)?)?;
        Ok(())
    }

    async fn register(&self, equipment: Equipment) -> Result<()> {
        let cf = self.cf(CF_EQUIPMENT)?;
        self.db
            .put_cf(cf, equipment.id.0.to_be_bytes(), Self::encode(&equipment)?)?;
        Ok(())
    }
}
