//! Core library for the fuelog fuel-mileage tracker: the data model,
//! validation, derived-efficiency math, the durable on-device store, and
//! dashboard statistics. No network dependency; synchronization lives in
//! the `fuelog-sync` crate.

pub mod db;
pub mod models;
pub mod stats;
