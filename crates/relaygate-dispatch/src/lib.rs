//! Dispatch engine: sticky-head failover across a resolved account route
//!.

mod cursor;
mod engine;
mod in_flight;

pub use engine::{DEFAULT_ENTRY_TIMEOUT, DispatchEngine};
pub use in_flight::in_flight_cap;
