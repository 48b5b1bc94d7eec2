//! Event correlation.
//!
//! The driver never echoes a request id, so correlation is by convention: the
//! dispatcher registers every read and write it hands to the driver, and a
//! completion is attributed to the most recent in-flight operation of the same
//! kind. A completion with no matching entry is still delivered, uncorrelated.
//! Status events are always unsolicited.

use crate::events::{BridgeEvent, EventFanout};
use crate::lifecycle::ReaderLifecycle;
use crate::lock;
use crate::marshal::to_transport;
use cardlink_core::RequestId;
use cardlink_driver::{DriverCallbacks, DriverEvent};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Upper bound of tracked in-flight operations; the oldest is evicted first.
pub const MAX_IN_FLIGHT: usize = 16;

/// Kind of a card operation awaiting its completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardOperation {
    Read,
    Write,
}

impl fmt::Display for CardOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, Clone)]
struct InFlight {
    kind: CardOperation,
    request_id: RequestId,
    issued_at: Instant,
}

/// Bounded list of issued reads and writes, oldest first.
#[derive(Debug, Default)]
pub struct InFlightOperations {
    entries: VecDeque<InFlight>,
}

impl InFlightOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an issued operation.
    ///
    /// With `single_flight`, registration is refused (returns `false`) while
    /// any read or write is in flight. Otherwise it always succeeds, evicting
    /// the oldest entry when the list is full.
    pub fn try_register(
        &mut self,
        kind: CardOperation,
        request_id: RequestId,
        single_flight: bool,
    ) -> bool {
        if single_flight && !self.entries.is_empty() {
            return false;
        }

        if self.entries.len() >= MAX_IN_FLIGHT
            && let Some(evicted) = self.entries.pop_front()
        {
            warn!(
                request_id = %evicted.request_id,
                kind = %evicted.kind,
                "in-flight list full, dropping oldest entry"
            );
        }

        self.entries.push_back(InFlight {
            kind,
            request_id,
            issued_at: Instant::now(),
        });
        true
    }

    /// Remove an operation whose driver call failed to start.
    pub fn withdraw(&mut self, kind: CardOperation, request_id: &RequestId) -> bool {
        match self
            .entries
            .iter()
            .rposition(|entry| entry.kind == kind && entry.request_id == *request_id)
        {
            Some(index) => self.entries.remove(index).is_some(),
            None => false,
        }
    }

    /// Remove and return the most recent in-flight operation of `kind`.
    pub fn complete(&mut self, kind: CardOperation) -> Option<RequestId> {
        let index = self.entries.iter().rposition(|entry| entry.kind == kind)?;
        self.entries.remove(index).map(|entry| {
            trace!(
                request_id = %entry.request_id,
                elapsed_ms = entry.issued_at.elapsed().as_millis() as u64,
                "operation completed"
            );
            entry.request_id
        })
    }

    /// Request ids of in-flight operations of `kind`, oldest first.
    pub fn pending(&self, kind: CardOperation) -> Vec<RequestId> {
        self.entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.request_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Receives driver callbacks, correlates them and hands them to the fan-out.
///
/// Registered with the driver as its [`DriverCallbacks`]; may be invoked from
/// any thread.
pub struct EventCorrelator {
    in_flight: Mutex<InFlightOperations>,
    lifecycle: Arc<Mutex<ReaderLifecycle>>,
    fanout: EventFanout,
}

impl EventCorrelator {
    pub fn new(lifecycle: Arc<Mutex<ReaderLifecycle>>, fanout: EventFanout) -> Self {
        Self {
            in_flight: Mutex::new(InFlightOperations::new()),
            lifecycle,
            fanout,
        }
    }

    pub fn fanout(&self) -> &EventFanout {
        &self.fanout
    }

    pub fn try_register(
        &self,
        kind: CardOperation,
        request_id: RequestId,
        single_flight: bool,
    ) -> bool {
        lock(&self.in_flight).try_register(kind, request_id, single_flight)
    }

    pub fn withdraw(&self, kind: CardOperation, request_id: &RequestId) -> bool {
        lock(&self.in_flight).withdraw(kind, request_id)
    }

    pub fn pending(&self, kind: CardOperation) -> Vec<RequestId> {
        lock(&self.in_flight).pending(kind)
    }

    pub fn clear_in_flight(&self) {
        lock(&self.in_flight).clear();
    }

    fn complete(&self, kind: CardOperation) -> Option<RequestId> {
        let request_id = lock(&self.in_flight).complete(kind);
        let mut lifecycle = lock(&self.lifecycle);
        match kind {
            CardOperation::Read => lifecycle.read_completed(),
            CardOperation::Write => lifecycle.write_completed(),
        }
        request_id
    }
}

impl DriverCallbacks for EventCorrelator {
    fn on_driver_event(&self, event: DriverEvent) {
        let event = match event {
            DriverEvent::Status { tag, code } => {
                debug!(result_code = %code, "driver status");
                BridgeEvent::Status {
                    message: tag.unwrap_or_default(),
                    result_code: code,
                }
            }
            DriverEvent::ReadComplete { card, code } => {
                let request_id = self.complete(CardOperation::Read);
                info!(
                    request_id = request_id.as_ref().map(RequestId::as_str),
                    result_code = %code,
                    has_card = card.is_some(),
                    "read completed"
                );
                BridgeEvent::ReadCard {
                    card_data: to_transport(card.as_ref()),
                    result_code: code,
                    request_id,
                }
            }
            DriverEvent::WriteComplete { code } => {
                let request_id = self.complete(CardOperation::Write);
                info!(
                    request_id = request_id.as_ref().map(RequestId::as_str),
                    result_code = %code,
                    "write completed"
                );
                BridgeEvent::WriteCard {
                    result_code: code,
                    request_id,
                }
            }
        };

        self.fanout.emit(event);
    }
}

impl fmt::Debug for EventCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCorrelator")
            .field("in_flight", &lock(&self.in_flight).len())
            .field("fanout", &self.fanout)
            .finish_non_exhaustive()
    }
}
