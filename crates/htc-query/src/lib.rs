//! Query facade over a measurement store and a station name registry
//!
//! The facade is what the web layer talks to. It joins readings with
//! display names and computes anchored time windows; the backends stay
//! unaware of presentation.

pub mod facade;
pub mod memory;

pub use facade::*;
pub use memory::*;
