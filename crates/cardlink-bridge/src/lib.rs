//! Command/event correlation bridge for a contactless meter-card reader.
//!
//! The bridge sits between a control surface and the vendor card driver:
//!
//! ```text
//! control surface ──dispatch──► Dispatcher ──spawn_blocking──► CardDriver
//!        ▲                                                         │
//!        │                                               (any thread, later)
//!        │                                                         ▼
//!   MainContext ◄──post── EventFanout ◄── EventCorrelator ◄── DriverCallbacks
//! ```
//!
//! Commands are validated, executed off the main context and answered with an
//! acknowledgement or an immediate value. Results the driver reports later
//! arrive on arbitrary threads; the correlator attaches them to the most recent
//! matching in-flight operation and the fan-out hops onto the main context
//! before handing them to the single registered subscriber.
//!
//! # Example
//!
//! ```
//! use cardlink_bridge::{BridgeConfig, BridgeEvent, CardBridge};
//! use cardlink_core::ResultCode;
//! use cardlink_driver::mock::MockDriver;
//! use serde_json::json;
//! use std::sync::{Arc, Mutex};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut handle = None;
//! let (bridge, mut main_context) = CardBridge::new(BridgeConfig::default(), |callbacks| {
//!     let (driver, h) = MockDriver::new(callbacks);
//!     handle = Some(h);
//!     driver
//! });
//! let handle = handle.unwrap();
//!
//! let received = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&received);
//! bridge.subscribe(move |event: BridgeEvent| sink.lock().unwrap().push(event));
//!
//! let args = json!({ "requestId": "abc" });
//! let outcome = bridge.dispatch("readCard", args.as_object().unwrap()).await.unwrap();
//! assert_eq!(outcome.payload(), Some(json!("READ_STARTED")));
//!
//! handle.complete_read(None, ResultCode::CardError);
//! main_context.run_pending();
//!
//! let events = received.lock().unwrap();
//! assert_eq!(events[0].event_type(), "onReadCard");
//! # }
//! ```

pub mod boundary;
pub mod bridge;
pub mod command;
pub mod config;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod marshal;

pub use boundary::{MainContext, MainContextHandle, main_context, run_blocking};
pub use bridge::CardBridge;
pub use command::{ArgumentBag, Command, CommandName};
pub use config::BridgeConfig;
pub use correlator::{CardOperation, EventCorrelator, InFlightOperations, MAX_IN_FLIGHT};
pub use dispatcher::{Ack, CommandValue, Dispatcher, LicenseResponse, Outcome};
pub use error::{BoundaryError, DispatchError, ErrorCategory, ErrorKind, Result};
pub use events::{BridgeEvent, Delivery, DropReason, EventFanout, EventSink, Subscription};
pub use lifecycle::{LicenseState, ReaderLifecycle, ReaderState, StateTransition};
pub use marshal::{FieldMap, TransportValue, to_transport};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
