//! The bridge facade.
//!
//! [`CardBridge`] wires the dispatcher, correlator, subscription and main
//! context around one driver. The driver is built by a closure that receives
//! the bridge's callback receiver, so it can report results from its own
//! threads.

use crate::boundary::{MainContext, main_context};
use crate::command::{ArgumentBag, Command};
use crate::config::BridgeConfig;
use crate::correlator::{CardOperation, EventCorrelator};
use crate::dispatcher::{Ack, CommandValue, Dispatcher, LicenseResponse, Outcome};
use crate::error::{DispatchError, Result};
use crate::events::{BridgeEvent, EventFanout, EventSink, Subscription};
use crate::lifecycle::{LicenseState, ReaderLifecycle, ReaderState, StateTransition};
use crate::lock;
use cardlink_core::{CreditOperation, LicenseRequest, RequestId, ResultCode, ServerUrl};
use cardlink_driver::{CardDriver, DriverCallbacks};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Command/event bridge around one card driver.
///
/// Clones share the same driver, subscription and state.
#[derive(Clone)]
pub struct CardBridge {
    config: BridgeConfig,
    dispatcher: Dispatcher,
    correlator: Arc<EventCorrelator>,
    lifecycle: Arc<Mutex<ReaderLifecycle>>,
    subscription: Subscription,
}

impl CardBridge {
    /// Build a bridge and the main context its events are delivered on.
    ///
    /// `make_driver` receives the callback receiver the driver must report
    /// to. The returned [`MainContext`] has to be drained by the control
    /// surface for subscriber code to run.
    pub fn new<D, F>(config: BridgeConfig, make_driver: F) -> (Self, MainContext)
    where
        D: CardDriver + 'static,
        F: FnOnce(Arc<dyn DriverCallbacks>) -> D,
    {
        let (context, handle) = main_context();
        let subscription = Subscription::new();

        let mut fanout = EventFanout::new(subscription.clone(), handle);
        if config.legacy_channel {
            fanout = fanout.with_legacy();
        }

        let lifecycle = Arc::new(Mutex::new(ReaderLifecycle::new()));
        let correlator = Arc::new(EventCorrelator::new(Arc::clone(&lifecycle), fanout));

        let callbacks: Arc<dyn DriverCallbacks> = correlator.clone();
        let driver: Arc<dyn CardDriver> = Arc::new(make_driver(callbacks));
        let dispatcher = Dispatcher::new(
            driver,
            Arc::clone(&correlator),
            Arc::clone(&lifecycle),
            config.single_flight,
        );

        debug!(?config, "card bridge created");

        let bridge = Self {
            config,
            dispatcher,
            correlator,
            lifecycle,
            subscription,
        };
        (bridge, context)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run start-up work on the tokio runtime.
    ///
    /// Hands the configured server URL to the driver, then, if
    /// `activate_on_start` is set, activates the reader and emits
    /// [`BridgeEvent::ReaderInitialized`] with the result code or the error.
    /// Subscribe first to observe that event.
    pub fn initialize(&self) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let fanout = self.correlator.fanout().clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Some(url) = config.server_url {
                let applied = match ServerUrl::new(url) {
                    Ok(url) => dispatcher.execute(Command::SetServerUrl(url)).await,
                    Err(error) => Err(error.into()),
                };
                if let Err(error) = applied {
                    warn!(%error, "configured server url not applied");
                }
            }

            if !config.activate_on_start {
                return;
            }

            let event = match dispatcher.execute(Command::ActivateReader).await {
                Ok(Outcome::Acknowledged {
                    ack: Ack::Reader(code),
                    ..
                }) => BridgeEvent::ReaderInitialized {
                    result_code: Some(code),
                    error: None,
                },
                Ok(outcome) => BridgeEvent::ReaderInitialized {
                    result_code: None,
                    error: Some(mismatch(outcome).message),
                },
                Err(error) => {
                    error!(%error, "reader activation at start-up failed");
                    BridgeEvent::ReaderInitialized {
                        result_code: None,
                        error: Some(error.to_string()),
                    }
                }
            };
            fanout.emit(event);
        })
    }

    /// Dispatch a command by wire name. See [`Dispatcher::dispatch`].
    pub async fn dispatch(&self, name: &str, args: &ArgumentBag) -> Result<Outcome> {
        self.dispatcher.dispatch(name, args).await
    }

    /// Validate and execute an already built command.
    pub async fn execute(&self, command: Command) -> Result<Outcome> {
        self.dispatcher.execute(command).await
    }

    pub async fn check_license(&self) -> Result<LicenseResponse> {
        license(self.execute(Command::CheckLicense).await?)
    }

    pub async fn acquire_license(&self, request: LicenseRequest) -> Result<LicenseResponse> {
        license(self.execute(Command::AcquireLicense(request)).await?)
    }

    pub async fn activate_reader(&self) -> Result<ResultCode> {
        reader_code(self.execute(Command::ActivateReader).await?)
    }

    pub async fn deactivate_reader(&self) -> Result<ResultCode> {
        reader_code(self.execute(Command::DeactivateReader).await?)
    }

    /// Start a read. The card arrives later as [`BridgeEvent::ReadCard`].
    pub async fn read_card(&self, request_id: RequestId) -> Result<Ack> {
        ack(self.execute(Command::ReadCard(request_id)).await?)
    }

    /// Start a credit write. The result arrives later as
    /// [`BridgeEvent::WriteCard`].
    pub async fn write_card(&self, operation: CreditOperation) -> Result<Ack> {
        ack(self.execute(Command::WriteCard(operation)).await?)
    }

    pub async fn set_server_url(&self, url: ServerUrl) -> Result<()> {
        match self.execute(Command::SetServerUrl(url)).await? {
            Outcome::Value(CommandValue::UrlSet) => Ok(()),
            other => Err(mismatch(other)),
        }
    }

    pub async fn get_server_url(&self) -> Result<String> {
        match self.execute(Command::GetServerUrl).await? {
            Outcome::Value(CommandValue::Url(url)) => Ok(url),
            other => Err(mismatch(other)),
        }
    }

    /// Register the event subscriber, replacing any previous one.
    pub fn subscribe(&self, sink: impl EventSink) {
        let generation = self.subscription.subscribe(Arc::new(sink));
        debug!(generation, "event subscriber registered");
    }

    /// Remove the event subscriber. Returns whether one was registered.
    pub fn unsubscribe(&self) -> bool {
        let removed = self.subscription.unsubscribe();
        debug!(removed, "event subscriber removed");
        removed
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_subscribed()
    }

    /// Receiver of the legacy event channel. Events are sent there from
    /// this call on.
    ///
    /// `None` if the channel is disabled or the receiver was already taken.
    pub fn take_legacy_events(&self) -> Option<UnboundedReceiver<BridgeEvent>> {
        self.correlator.fanout().take_legacy()
    }

    pub fn reader_state(&self) -> ReaderState {
        lock(&self.lifecycle).reader_state()
    }

    pub fn license_state(&self) -> LicenseState {
        lock(&self.lifecycle).license_state()
    }

    /// Recorded reader transitions, oldest first.
    pub fn reader_history(&self) -> Vec<StateTransition> {
        lock(&self.lifecycle).history().iter().copied().collect()
    }

    /// Request ids of reads or writes still awaiting their completion event.
    pub fn in_flight(&self, kind: CardOperation) -> Vec<RequestId> {
        self.correlator.pending(kind)
    }
}

impl std::fmt::Debug for CardBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardBridge")
            .field("config", &self.config)
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

fn mismatch(outcome: Outcome) -> DispatchError {
    DispatchError::unexpected(format!("unexpected outcome {outcome:?}"))
}

fn license(outcome: Outcome) -> Result<LicenseResponse> {
    match outcome {
        Outcome::Value(CommandValue::License(license)) => Ok(license),
        other => Err(mismatch(other)),
    }
}

fn reader_code(outcome: Outcome) -> Result<ResultCode> {
    match outcome {
        Outcome::Acknowledged {
            ack: Ack::Reader(code),
            ..
        } => Ok(code),
        other => Err(mismatch(other)),
    }
}

fn ack(outcome: Outcome) -> Result<Ack> {
    match outcome {
        Outcome::Acknowledged { ack, .. } => Ok(ack),
        other => Err(mismatch(other)),
    }
}
