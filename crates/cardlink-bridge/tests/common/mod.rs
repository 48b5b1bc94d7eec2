//! Common test utilities for bridge integration tests.
//!
//! [`Harness`] owns a bridge wired to a [`MockDriver`], the main context the
//! bridge delivers on, the mock's control handle and a collecting subscriber.
//! Tests drive commands through the name-based surface with JSON arguments,
//! fire driver callbacks through the handle and then drain the main context.
//!
//! ```ignore
//! let mut h = common::harness(BridgeConfig::default());
//! h.dispatch("readCard", json!({"requestId": "abc"})).await.unwrap();
//! h.driver.complete_read(None, ResultCode::CardError);
//! h.drain();
//! assert_eq!(h.events().len(), 1);
//! ```

#![allow(dead_code)]

use cardlink_bridge::{
    BridgeConfig, BridgeEvent, CardBridge, DispatchError, MainContext, Outcome,
};
use cardlink_driver::mock::{MockDriver, MockDriverHandle};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Events received by one collecting subscriber.
pub type Received = Arc<Mutex<Vec<BridgeEvent>>>;

pub struct Harness {
    pub bridge: CardBridge,
    pub context: MainContext,
    pub driver: MockDriverHandle,
    pub received: Received,
}

/// Build a bridge over a fresh mock driver with a collecting subscriber
/// already registered.
pub fn harness(config: BridgeConfig) -> Harness {
    let mut handle = None;
    let (bridge, context) = CardBridge::new(config, |callbacks| {
        let (driver, h) = MockDriver::new(callbacks);
        handle = Some(h);
        driver
    });
    let driver = handle.expect("driver factory was called");

    let received = Received::default();
    bridge.subscribe(collector(&received));

    Harness {
        bridge,
        context,
        driver,
        received,
    }
}

/// A subscriber pushing into `received`.
pub fn collector(received: &Received) -> impl Fn(BridgeEvent) + Send + Sync + 'static {
    let received = Arc::clone(received);
    move |event: BridgeEvent| received.lock().unwrap().push(event)
}

/// Build an argument bag from a JSON object literal.
pub fn args(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => panic!("arguments must be an object, got {other}"),
    }
}

impl Harness {
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<Outcome, DispatchError> {
        self.bridge.dispatch(name, &args(arguments)).await
    }

    /// Run every job already posted to the main context.
    pub fn drain(&mut self) -> usize {
        self.context.run_pending()
    }

    /// Run main-context jobs until `count` events were received or the
    /// timeout expires.
    pub async fn wait_for_events(&mut self, count: usize, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.received.lock().unwrap().len() < count {
            match tokio::time::timeout_at(deadline, self.context.next()).await {
                Ok(true) => {}
                Ok(false) | Err(_) => break,
            }
        }
    }

    /// Snapshot of received events.
    pub fn events(&self) -> Vec<BridgeEvent> {
        self.received.lock().unwrap().clone()
    }

    /// Wire forms of received events.
    pub fn wire_events(&self) -> Vec<Value> {
        self.events()
            .iter()
            .map(|event| serde_json::to_value(event).unwrap())
            .collect()
    }
}
