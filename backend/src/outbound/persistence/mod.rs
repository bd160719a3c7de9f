//! PostgreSQL inventory adapter using Diesel ORM.
//!
//! Row structs and table definitions stay private; only the store, the
//! pool and the migration entry point are exported.
//!
//! # Example
//!
//! ```ignore
//! use edgeconfig::outbound::persistence::{DbPool, DieselInventoryStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/edge")).await?;
//! let store = DieselInventoryStore::new(pool);
//! ```

mod diesel_error_mapping;
mod diesel_inventory_store;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_inventory_store::DieselInventoryStore;
pub use migrations::{MigrationError, apply_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
