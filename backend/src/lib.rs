//! Edge inventory engine: account uniqueness, cascading renames and dirty
//! propagation for the acquisition fleet's configuration database.

pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
