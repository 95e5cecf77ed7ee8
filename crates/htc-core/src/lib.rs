//! Core data types and backend contracts for htcollector
//!
//! This crate holds the validated measurement unit, the typed records
//! handed to the presentation layer, and the store/registry traits that
//! every backend implements.

pub mod measurement;
pub mod store;
pub mod types;

pub use measurement::*;
pub use store::*;
pub use types::*;
