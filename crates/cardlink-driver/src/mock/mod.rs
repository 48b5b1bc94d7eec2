//! Mock driver for testing and simulation.
//!
//! The mock records every call (so tests can assert the driver was or was not
//! reached), lets tests script return values and failures, and fires driver
//! callbacks on demand or automatically from a background thread.

pub mod card;
pub mod driver;

pub use card::sample_card;
pub use driver::{AutoComplete, DriverCall, MockDriver, MockDriverHandle};
