//! Availability resolution and a conflict-free reservation lifecycle for
//! exchanges of time (room bookings, skill swaps) between two parties.

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod ledger;
pub mod limits;
pub mod model;
pub mod observability;
pub mod scheduler;
pub mod store;
pub mod wal;
