//! # statjob-core
//!
//! Core crate for StatJob. Contains configuration schemas, typed
//! identifiers, domain events with the telemetry sink boundary, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other StatJob crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
