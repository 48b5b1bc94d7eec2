//! Outbound events, the subscription slot and fan-out.
//!
//! At most one subscriber is registered at a time. Registering replaces the
//! previous one; events emitted while nobody is registered are dropped, never
//! buffered.
//!
//! The slot carries a generation counter, bumped by every subscribe and
//! unsubscribe. [`EventFanout::emit`] captures the generation when the event is
//! produced and the delivery job posted to the main context only hands the
//! event over if the generation is still the same. A replaced subscriber never
//! sees events after its replacement, and a late subscriber never sees events
//! emitted before it registered.

use crate::boundary::MainContextHandle;
use crate::lock;
use crate::marshal::TransportValue;
use cardlink_core::{RequestId, ResultCode};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{trace, warn};

/// Event pushed to the control surface.
///
/// The serialized form is the wire form: a `type` discriminator plus
/// camelCase fields. Correlation metadata is never serialized.
///
/// ```
/// use cardlink_bridge::BridgeEvent;
/// use cardlink_core::ResultCode;
///
/// let event = BridgeEvent::status("", ResultCode::ReaderNotActive);
/// assert_eq!(
///     serde_json::to_string(&event).unwrap(),
///     r#"{"type":"onResult","message":"","resultCode":"ReaderNotActive"}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum BridgeEvent {
    /// Generic status notification. A missing driver tag becomes `""`.
    #[serde(rename = "onResult")]
    Status {
        message: String,
        result_code: ResultCode,
    },

    /// A read finished; `card_data` is absent when the read failed.
    #[serde(rename = "onReadCard")]
    ReadCard {
        card_data: TransportValue,
        result_code: ResultCode,
        #[serde(skip)]
        request_id: Option<RequestId>,
    },

    /// A credit write finished.
    #[serde(rename = "onWriteCard")]
    WriteCard {
        result_code: ResultCode,
        #[serde(skip)]
        request_id: Option<RequestId>,
    },

    /// Outcome of the start-up activation. Exactly one of the two is set.
    #[serde(rename = "onReaderInitialized")]
    ReaderInitialized {
        result_code: Option<ResultCode>,
        error: Option<String>,
    },
}

impl BridgeEvent {
    pub fn status(message: impl Into<String>, result_code: ResultCode) -> Self {
        Self::Status {
            message: message.into(),
            result_code,
        }
    }

    /// Wire discriminator of the event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "onResult",
            Self::ReadCard { .. } => "onReadCard",
            Self::WriteCard { .. } => "onWriteCard",
            Self::ReaderInitialized { .. } => "onReaderInitialized",
        }
    }

    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            Self::Status { result_code, .. }
            | Self::ReadCard { result_code, .. }
            | Self::WriteCard { result_code, .. } => Some(*result_code),
            Self::ReaderInitialized { result_code, .. } => *result_code,
        }
    }

    /// Request id of the in-flight operation this event was attributed to.
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::ReadCard { request_id, .. } | Self::WriteCard { request_id, .. } => {
                request_id.as_ref()
            }
            _ => None,
        }
    }
}

/// Receiver of bridge events. Always invoked on the main context.
pub trait EventSink: Send + Sync + 'static {
    fn on_event(&self, event: BridgeEvent);
}

impl<F> EventSink for F
where
    F: Fn(BridgeEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: BridgeEvent) {
        self(event)
    }
}

#[derive(Default)]
struct Slot {
    generation: u64,
    sink: Option<Arc<dyn EventSink>>,
}

/// Single-slot subscription register, shared between the command path and
/// driver callback threads.
#[derive(Clone, Default)]
pub struct Subscription {
    slot: Arc<Mutex<Slot>>,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink`, replacing any current subscriber. Returns the new
    /// generation.
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) -> u64 {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        slot.sink = Some(sink);
        slot.generation
    }

    /// Remove the current subscriber. Returns whether one was registered.
    pub fn unsubscribe(&self) -> bool {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        slot.sink.take().is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.slot).sink.is_some()
    }

    /// Generation of the current subscriber, `None` if nobody is registered.
    pub fn current_generation(&self) -> Option<u64> {
        let slot = lock(&self.slot);
        slot.sink.as_ref().map(|_| slot.generation)
    }

    /// The subscriber, if it is still the one registered at `generation`.
    pub fn sink_if_current(&self, generation: u64) -> Option<Arc<dyn EventSink>> {
        let slot = lock(&self.slot);
        if slot.generation == generation {
            slot.sink.clone()
        } else {
            None
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = lock(&self.slot);
        f.debug_struct("Subscription")
            .field("generation", &slot.generation)
            .field("subscribed", &slot.sink.is_some())
            .finish()
    }
}

/// Why an event did not reach a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NoSubscriber,
    MainContextClosed,
}

/// Result of [`EventFanout::emit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Posted to the main context for the subscriber current at emission.
    Scheduled,
    Dropped(DropReason),
}

/// Sender side of the legacy channel. Empty until the receiver is taken.
type LegacySlot = Arc<Mutex<Option<UnboundedSender<BridgeEvent>>>>;

/// Delivers events to the subscriber via the main context, and optionally to
/// a legacy channel.
#[derive(Debug, Clone)]
pub struct EventFanout {
    subscription: Subscription,
    main: MainContextHandle,
    legacy: Option<LegacySlot>,
}

impl EventFanout {
    pub fn new(subscription: Subscription, main: MainContextHandle) -> Self {
        Self {
            subscription,
            main,
            legacy: None,
        }
    }

    /// Enable the legacy channel. Once its receiver is taken with
    /// [`take_legacy`](Self::take_legacy), every event is also sent there,
    /// whether or not anyone subscribed. Nothing is queued before that.
    pub fn with_legacy(mut self) -> Self {
        self.legacy = Some(LegacySlot::default());
        self
    }

    /// Open the legacy channel and return its receiver.
    ///
    /// `None` if the channel is disabled or the receiver was already taken.
    pub fn take_legacy(&self) -> Option<UnboundedReceiver<BridgeEvent>> {
        let mut sender = lock(self.legacy.as_ref()?);
        if sender.is_some() {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *sender = Some(tx);
        Some(rx)
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Emit an event. Safe to call from any thread.
    pub fn emit(&self, event: BridgeEvent) -> Delivery {
        let event_type = event.event_type();

        if let Some(legacy) = &self.legacy {
            let sender = lock(legacy);
            if let Some(sender) = sender.as_ref()
                && sender.send(event.clone()).is_err()
            {
                trace!(event_type, "legacy channel receiver dropped");
            }
        }

        let Some(generation) = self.subscription.current_generation() else {
            trace!(event_type, "no subscriber, event dropped");
            return Delivery::Dropped(DropReason::NoSubscriber);
        };

        let subscription = self.subscription.clone();
        let posted = self.main.post(move || {
            // Lock is released before the sink runs
            match subscription.sink_if_current(generation) {
                Some(sink) => sink.on_event(event),
                None => trace!(event_type, "subscriber changed before delivery"),
            }
        });

        match posted {
            Ok(()) => Delivery::Scheduled,
            Err(error) => {
                warn!(event_type, %error, "event dropped");
                Delivery::Dropped(DropReason::MainContextClosed)
            }
        }
    }
}
