use agrirent::application::availability::{AvailabilityChecker, IntervalIndex};
use agrirent::application::engine::{BookingEngine, BookingRequest};
use agrirent::application::escrow::EscrowOrchestrator;
use agrirent::config::PlatformConfig;
use agrirent::domain::actor::Actor;
use agrirent::domain::interval::RentalInterval;
use agrirent::domain::ports::{BookingStoreRef, EquipmentDirectoryRef};
use agrirent::domain::{BookingId, EquipmentId, UserId};
use agrirent::error::{BookingError, Result as EngineResult};
use agrirent::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryEquipmentDirectory, InMemoryEventBus, RecordingPaymentProvider,
};
use agrirent::interfaces::csv::booking_writer::BookingWriter;
use agrirent::interfaces::csv::command_reader::{CommandOp, CommandReader, CommandRow, FleetReader};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Equipment fleet CSV used to seed the directory
    fleet: PathBuf,

    /// Booking commands CSV to replay
    commands: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn open_stores(db_path: Option<PathBuf>) -> Result<(BookingStoreRef, EquipmentDirectoryRef)> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = db_path {
        let store =
            agrirent::infrastructure::rocksdb::RocksDbStore::open(db_path).into_diagnostic()?;
        return Ok((Arc::new(store.clone()), Arc::new(store)));
    }
    #[cfg(not(feature = "storage-rocksdb"))]
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok((
        Arc::new(InMemoryBookingStore::new()),
        Arc::new(InMemoryEquipmentDirectory::new()),
    ))
}

fn missing(column: &str) -> BookingError {
    BookingError::Internal(format!("command row is missing the '{column}' column").into())
}

async fn run_command(
    engine: &BookingEngine,
    escrow: &EscrowOrchestrator,
    row: CommandRow,
) -> EngineResult<()> {
    let booking = BookingId(row.booking);
    match row.op {
        CommandOp::Request => {
            let renter = Actor::renter(UserId(row.actor.ok_or_else(|| missing("actor"))?));
            let interval = RentalInterval::new(
                row.start.ok_or_else(|| missing("start"))?,
                row.end.ok_or_else(|| missing("end"))?,
            )?;
            let request = BookingRequest {
                id: booking,
                equipment: EquipmentId(row.equipment.ok_or_else(|| missing("equipment"))?),
                interval,
                renter_notes: row.note,
            };
            engine.create(renter, request).await?;
        }
        CommandOp::Approve => {
            let owner = Actor::owner(UserId(row.actor.ok_or_else(|| missing("actor"))?));
            engine.approve(booking, owner, row.note).await?;
        }
        CommandOp::Reject => {
            let owner = Actor::owner(UserId(row.actor.ok_or_else(|| missing("actor"))?));
            engine.reject(booking, owner, row.note).await?;
        }
        CommandOp::Cancel => {
            let actor = Actor::renter(UserId(row.actor.ok_or_else(|| missing("actor"))?));
            engine.cancel(booking, actor, row.note).await?;
        }
        CommandOp::Activate => {
            engine.mark_active(booking).await?;
        }
        CommandOp::Complete => {
            engine.complete(booking).await?;
        }
        CommandOp::Confirm => {
            escrow.confirm_payment(booking).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PlatformConfig::from_env();

    let (bookings, directory) = open_stores(cli.db_path)?;

    // Seed the equipment directory, keeping listings already persisted.
    let fleet_file = File::open(cli.fleet).into_diagnostic()?;
    for row in FleetReader::new(fleet_file).fleet() {
        match row {
            Ok(row) => {
                let equipment = row.into_equipment();
                if directory.get(equipment.id).await.into_diagnostic()?.is_none() {
                    directory.register(equipment).await.into_diagnostic()?;
                }
            }
            Err(e) => eprintln!("Error reading fleet row: {}", e),
        }
    }

    // Rebuild the committed-interval index from whatever the store holds.
    let existing = bookings.all().await.into_diagnostic()?;
    let availability = Arc::new(AvailabilityChecker::from_index(IntervalIndex::rebuild(
        existing.iter(),
    )));

    let bus = Arc::new(InMemoryEventBus::new());
    let engine = BookingEngine::new(
        bookings.clone(),
        directory,
        bus.clone(),
        availability,
        config.clone(),
    );
    let escrow = EscrowOrchestrator::new(
        Arc::new(RecordingPaymentProvider::new()),
        bookings.clone(),
        config.payment_timeout,
    );

    // Replay commands; individual failures are reported, not fatal.
    let commands_file = File::open(cli.commands).into_diagnostic()?;
    for row in CommandReader::new(commands_file).commands() {
        match row {
            Ok(row) => {
                if let Err(e) = run_command(&engine, &escrow, row).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => eprintln!("Error reading command: {}", e),
        }
        if let Err(e) = bus.deliver_pending(&escrow).await {
            eprintln!("Error delivering event: {}", e);
        }
    }
    // Events left behind by a failed delivery get one more attempt.
    if bus.pending() > 0
        && let Err(e) = bus.deliver_pending(&escrow).await
    {
        eprintln!("Error delivering event: {}", e);
    }

    // Output final booking states.
    let final_bookings = bookings.all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = BookingWriter::new(stdout.lock());
    writer.write_bookings(&final_bookings).into_diagnostic()?;

    Ok(())
}
