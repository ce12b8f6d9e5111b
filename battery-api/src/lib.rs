//! Battery telemetry storage: validated, parameterized access to the
//! `battery_data` table plus a thin REST adapter.

pub mod config;
pub mod db;
pub mod errors;
pub mod field;
pub mod metrics;
pub mod model;
pub mod queries;
pub mod rest;
pub mod store;
pub mod time;
pub mod validate;

#[cfg(test)]
mod test_utils;

pub use config::{AppConfig, DatabaseConfig};
pub use db::{PoolState, StorePool};
pub use errors::{Error, ErrorKind, Result};
pub use field::Field;
pub use model::{FieldValue, NewSample, TelemetrySample};
pub use store::BatteryStore;
