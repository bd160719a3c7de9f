//! Outbound adapters implementing the inventory store port.
//!
//! - **persistence**: PostgreSQL via Diesel, the production store.
//! - **memory**: process-local tables for tests and dry runs.
//!
//! Adapters translate rows; they hold no business rules.

pub mod memory;
pub mod persistence;
