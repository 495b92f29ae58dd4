//! Application layer orchestrating the booking lifecycle.
//!
//! `BookingEngine` is the state machine, `EscrowOrchestrator` couples its
//! lifecycle events to payment actions, and `AvailabilityChecker` owns the
//! committed-interval index both consult.

pub mod availability;
pub mod engine;
pub mod escrow;
