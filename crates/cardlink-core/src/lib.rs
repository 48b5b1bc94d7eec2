//! Domain types shared by the cardlink crates.
//!
//! The types here describe what travels between the control surface and the
//! vendor card driver: result codes, license status, credit operations and
//! the meter card snapshot returned by a read.

pub mod card;
pub mod constants;
pub mod error;
pub mod types;

pub use card::CardRecord;
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
