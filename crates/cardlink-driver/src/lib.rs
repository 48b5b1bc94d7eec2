//! Driver adapter for the contactless meter-card reader/writer.
//!
//! This crate defines the narrow interface between the bridge and the vendor
//! card library, in both directions:
//!
//! - [`CardDriver`]: synchronous, possibly blocking calls into the driver
//!   (reader activation, license, read, write, server URL).
//! - [`DriverCallbacks`]: asynchronous results pushed back by the driver,
//!   from an unspecified thread at an unspecified time.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use cardlink_core::{RequestId, ResultCode};
//! use cardlink_driver::mock::MockDriver;
//! use cardlink_driver::{CardDriver, DriverCallbacks, DriverEvent};
//!
//! #[derive(Default)]
//! struct Collect(Mutex<Vec<DriverEvent>>);
//!
//! impl DriverCallbacks for Collect {
//!     fn on_driver_event(&self, event: DriverEvent) {
//!         self.0.lock().unwrap().push(event);
//!     }
//! }
//!
//! let sink = Arc::new(Collect::default());
//! let (driver, handle) = MockDriver::new(sink.clone());
//!
//! driver.start_read(&RequestId::new("r1").unwrap()).unwrap();
//! handle.complete_read(None, ResultCode::CardNotPresent);
//!
//! assert_eq!(sink.0.lock().unwrap().len(), 1);
//! ```
//!
//! # Error Handling
//!
//! Every entry point returns [`Result<T>`][error::Result] with a
//! [`DriverError`] when the call could not run. Hardware failures that happen
//! after a read or write was accepted are reported as result codes on
//! callback events instead.

pub mod error;
pub mod mock;
pub mod traits;

pub use error::{DriverError, Result};
pub use traits::{CardDriver, DriverCallbacks, DriverEvent, DriverOperation};
