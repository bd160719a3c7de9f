//! Translation of pool and Diesel failures into inventory store errors.

use tracing::debug;

use crate::domain::ports::InventoryStoreError;

use super::pool::PoolError;

/// Pool failures always mean the database is unreachable.
pub(super) fn map_pool_error(error: PoolError) -> InventoryStoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            InventoryStoreError::connection(message)
        }
    }
}

/// Map a Diesel failure, logging the driver detail at debug level only.
pub(super) fn map_diesel_error(
    error: diesel::result::Error,
    operation: &'static str,
) -> InventoryStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), operation, "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            operation,
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => InventoryStoreError::query(format!("{operation}: record not found")),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            InventoryStoreError::connection(format!("{operation}: database connection error"))
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            InventoryStoreError::query(format!("{operation}: unique constraint violated"))
        }
        _ => InventoryStoreError::query(format!("{operation}: database error")),
    }
}

/// Turn a zero-row update into a missing-row error.
pub(super) fn expect_one_row(
    updated: usize,
    table: &'static str,
    id: i64,
) -> Result<(), InventoryStoreError> {
    if updated == 0 {
        return Err(InventoryStoreError::missing_row(table, id));
    }
    Ok(())
}
