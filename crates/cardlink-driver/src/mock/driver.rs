//! Mock card driver implementation.

use crate::{
    Result,
    error::DriverError,
    traits::{CardDriver, DriverCallbacks, DriverOperation},
};
use cardlink_core::{
    CardRecord, CreditOperation, LicenseCode, LicenseRequest, LicenseStatus, RequestId, ResultCode,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::trace;

/// One call received by the mock driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    ActivateReader,
    DeactivateReader,
    CheckLicense,
    AcquireLicense(LicenseRequest),
    StartRead(RequestId),
    StartWrite(CreditOperation),
    SetUrl(String),
    GetUrl,
}

impl DriverCall {
    pub fn operation(&self) -> DriverOperation {
        match self {
            Self::ActivateReader => DriverOperation::ActivateReader,
            Self::DeactivateReader => DriverOperation::DeactivateReader,
            Self::CheckLicense => DriverOperation::CheckLicense,
            Self::AcquireLicense(_) => DriverOperation::AcquireLicense,
            Self::StartRead(_) => DriverOperation::StartRead,
            Self::StartWrite(_) => DriverOperation::StartWrite,
            Self::SetUrl(_) => DriverOperation::SetUrl,
            Self::GetUrl => DriverOperation::GetUrl,
        }
    }
}

/// Automatic completion of reads and writes from a background thread.
///
/// Mimics the vendor library, which reports results on its own thread some
/// time after the card was tapped.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoComplete {
    /// Card returned by every read. `None` simulates a failed read.
    pub card: Option<CardRecord>,

    /// Result code of every read completion.
    pub read_code: ResultCode,

    /// Result code of every write completion.
    pub write_code: ResultCode,

    /// Delay between the call and its completion.
    pub delay: Duration,
}

impl AutoComplete {
    /// Successful reads of `card` and successful writes.
    pub fn succeed_with(card: CardRecord) -> Self {
        Self {
            card: Some(card),
            read_code: ResultCode::Success,
            write_code: ResultCode::Success,
            delay: Duration::from_millis(50),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Scripted responses.
#[derive(Debug)]
struct Script {
    activation: ResultCode,
    deactivation: ResultCode,
    license: LicenseStatus,
    failures: HashMap<DriverOperation, DriverError>,
    panics: HashSet<DriverOperation>,
    auto_complete: Option<AutoComplete>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            activation: ResultCode::Success,
            deactivation: ResultCode::Success,
            license: LicenseStatus::new(LicenseCode::LicenseValid),
            failures: HashMap::new(),
            panics: HashSet::new(),
            auto_complete: None,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    calls: Mutex<Vec<DriverCall>>,
    script: Mutex<Script>,
    url: RwLock<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock card driver for testing and development.
///
/// Pairs with a [`MockDriverHandle`] that scripts its behavior, inspects the
/// calls it received and fires callbacks into the registered
/// [`DriverCallbacks`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cardlink_core::ResultCode;
/// use cardlink_driver::mock::{DriverCall, MockDriver};
/// use cardlink_driver::{CardDriver, DriverCallbacks, DriverEvent};
///
/// struct Ignore;
/// impl DriverCallbacks for Ignore {
///     fn on_driver_event(&self, _event: DriverEvent) {}
/// }
///
/// let (driver, handle) = MockDriver::new(Arc::new(Ignore));
/// handle.set_activation_result(ResultCode::NfcDisabled);
///
/// assert_eq!(driver.activate_reader().unwrap(), ResultCode::NfcDisabled);
/// assert_eq!(handle.calls(), vec![DriverCall::ActivateReader]);
/// ```
pub struct MockDriver {
    shared: Arc<Shared>,
    callbacks: Arc<dyn DriverCallbacks>,
}

impl MockDriver {
    /// Create a mock driver reporting to `callbacks`.
    ///
    /// Returns the driver and a handle controlling it. By default activation
    /// and deactivation succeed, the license is valid, the URL is empty and
    /// reads/writes never complete on their own.
    pub fn new(callbacks: Arc<dyn DriverCallbacks>) -> (Self, MockDriverHandle) {
        let shared = Arc::new(Shared::default());

        let driver = Self {
            shared: Arc::clone(&shared),
            callbacks: Arc::clone(&callbacks),
        };
        let handle = MockDriverHandle { shared, callbacks };

        (driver, handle)
    }

    /// Record the call, then apply any scripted panic or failure.
    fn enter(&self, call: DriverCall) -> Result<()> {
        let operation = call.operation();
        trace!(%operation, "mock driver call");
        lock(&self.shared.calls).push(call);

        let (panic, failure) = {
            let mut script = lock(&self.shared.script);
            (
                script.panics.remove(&operation),
                script.failures.remove(&operation),
            )
        };

        if panic {
            panic!("mock driver panicked during {operation}");
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn auto_complete(&self) -> Option<AutoComplete> {
        lock(&self.shared.script).auto_complete.clone()
    }
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriver")
            .field("calls", &lock(&self.shared.calls).len())
            .finish_non_exhaustive()
    }
}

impl CardDriver for MockDriver {
    fn activate_reader(&self) -> Result<ResultCode> {
        self.enter(DriverCall::ActivateReader)?;
        Ok(lock(&self.shared.script).activation)
    }

    fn deactivate_reader(&self) -> Result<ResultCode> {
        self.enter(DriverCall::DeactivateReader)?;
        Ok(lock(&self.shared.script).deactivation)
    }

    fn check_license(&self) -> Result<LicenseStatus> {
        self.enter(DriverCall::CheckLicense)?;
        Ok(lock(&self.shared.script).license.clone())
    }

    fn acquire_license(&self, request: &LicenseRequest) -> Result<LicenseStatus> {
        self.enter(DriverCall::AcquireLicense(request.clone()))?;
        Ok(lock(&self.shared.script).license.clone())
    }

    fn start_read(&self, request_id: &RequestId) -> Result<()> {
        self.enter(DriverCall::StartRead(request_id.clone()))?;

        if let Some(auto) = self.auto_complete() {
            let callbacks = Arc::clone(&self.callbacks);
            thread::spawn(move || {
                thread::sleep(auto.delay);
                callbacks.on_read_complete(auto.card, auto.read_code);
            });
        }
        Ok(())
    }

    fn start_write(&self, operation: &CreditOperation) -> Result<()> {
        self.enter(DriverCall::StartWrite(operation.clone()))?;

        if let Some(auto) = self.auto_complete() {
            let callbacks = Arc::clone(&self.callbacks);
            thread::spawn(move || {
                thread::sleep(auto.delay);
                callbacks.on_write_complete(auto.write_code);
            });
        }
        Ok(())
    }

    fn set_url(&self, url: &str) -> Result<()> {
        self.enter(DriverCall::SetUrl(url.to_string()))?;
        *self
            .shared
            .url
            .write()
            .unwrap_or_else(PoisonError::into_inner) = url.to_string();
        Ok(())
    }

    fn get_url(&self) -> Result<String> {
        self.enter(DriverCall::GetUrl)?;
        Ok(self
            .shared
            .url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// Handle for controlling a [`MockDriver`].
///
/// Clones share the same driver state.
#[derive(Clone)]
pub struct MockDriverHandle {
    shared: Arc<Shared>,
    callbacks: Arc<dyn DriverCallbacks>,
}

impl MockDriverHandle {
    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        lock(&self.shared.calls).clone()
    }

    /// Total number of calls received.
    pub fn call_count(&self) -> usize {
        lock(&self.shared.calls).len()
    }

    /// Number of calls received for one operation.
    pub fn count_of(&self, operation: DriverOperation) -> usize {
        lock(&self.shared.calls)
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        lock(&self.shared.calls).clear();
    }

    pub fn set_activation_result(&self, code: ResultCode) {
        lock(&self.shared.script).activation = code;
    }

    pub fn set_deactivation_result(&self, code: ResultCode) {
        lock(&self.shared.script).deactivation = code;
    }

    /// Status returned by both `check_license` and `acquire_license`.
    pub fn set_license_status(&self, status: LicenseStatus) {
        lock(&self.shared.script).license = status;
    }

    /// Make the next call of `operation` fail with `error`.
    ///
    /// The call is still recorded.
    pub fn fail_next(&self, operation: DriverOperation, error: DriverError) {
        lock(&self.shared.script).failures.insert(operation, error);
    }

    /// Make the next call of `operation` panic.
    pub fn panic_next(&self, operation: DriverOperation) {
        lock(&self.shared.script).panics.insert(operation);
    }

    /// Complete every subsequent read and write automatically.
    pub fn enable_auto_complete(&self, auto: AutoComplete) {
        lock(&self.shared.script).auto_complete = Some(auto);
    }

    pub fn disable_auto_complete(&self) {
        lock(&self.shared.script).auto_complete = None;
    }

    /// Current server URL stored by the driver.
    pub fn url(&self) -> String {
        self.shared
            .url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fire a status callback on the calling thread.
    pub fn emit_status(&self, tag: Option<&str>, code: ResultCode) {
        self.callbacks.on_status(tag, code);
    }

    /// Fire a read completion on the calling thread.
    pub fn complete_read(&self, card: Option<CardRecord>, code: ResultCode) {
        self.callbacks.on_read_complete(card, code);
    }

    /// Fire a write completion on the calling thread.
    pub fn complete_write(&self, code: ResultCode) {
        self.callbacks.on_write_complete(code);
    }

    /// Fire a read completion from a new background thread.
    pub fn complete_read_in_background(
        &self,
        card: Option<CardRecord>,
        code: ResultCode,
    ) -> JoinHandle<()> {
        let callbacks = Arc::clone(&self.callbacks);
        thread::spawn(move || callbacks.on_read_complete(card, code))
    }

    /// Fire a write completion from a new background thread.
    pub fn complete_write_in_background(&self, code: ResultCode) -> JoinHandle<()> {
        let callbacks = Arc::clone(&self.callbacks);
        thread::spawn(move || callbacks.on_write_complete(code))
    }
}

impl std::fmt::Debug for MockDriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDriverHandle")
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::sample_card;
    use crate::traits::DriverEvent;
    use std::sync::mpsc;

    /// Forwards driver events into a std channel.
    struct ChannelSink(Mutex<mpsc::Sender<DriverEvent>>);

    impl DriverCallbacks for ChannelSink {
        fn on_driver_event(&self, event: DriverEvent) {
            let _ = lock(&self.0).send(event);
        }
    }

    fn mock() -> (MockDriver, MockDriverHandle, mpsc::Receiver<DriverEvent>) {
        let (tx, rx) = mpsc::channel();
        let (driver, handle) = MockDriver::new(Arc::new(ChannelSink(Mutex::new(tx))));
        (driver, handle, rx)
    }

    #[test]
    fn test_mock_records_calls_in_order() {
        let (driver, handle, _rx) = mock();

        driver.activate_reader().unwrap();
        driver.start_read(&RequestId::new("r1").unwrap()).unwrap();
        driver.get_url().unwrap();

        assert_eq!(
            handle.calls(),
            vec![
                DriverCall::ActivateReader,
                DriverCall::StartRead(RequestId::new("r1").unwrap()),
                DriverCall::GetUrl,
            ]
        );
        assert_eq!(handle.count_of(DriverOperation::StartRead), 1);
    }

    #[test]
    fn test_mock_scripted_results() {
        let (driver, handle, _rx) = mock();

        handle.set_activation_result(ResultCode::NfcNotSupported);
        handle.set_license_status(
            LicenseStatus::new(LicenseCode::LicenseExpired).with_message("expired"),
        );

        assert_eq!(driver.activate_reader().unwrap(), ResultCode::NfcNotSupported);
        let status = driver.check_license().unwrap();
        assert_eq!(status.code, LicenseCode::LicenseExpired);
        assert_eq!(status.message.as_deref(), Some("expired"));
    }

    #[test]
    fn test_mock_fail_next_applies_once() {
        let (driver, handle, _rx) = mock();

        handle.fail_next(
            DriverOperation::ActivateReader,
            DriverError::communication("no adapter"),
        );

        assert!(driver.activate_reader().is_err());
        assert!(driver.activate_reader().is_ok());
        assert_eq!(handle.count_of(DriverOperation::ActivateReader), 2);
    }

    #[test]
    fn test_mock_panic_next() {
        let (driver, handle, _rx) = mock();
        handle.panic_next(DriverOperation::GetUrl);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| driver.get_url()));
        assert!(result.is_err());

        // State stays usable after the panic
        assert!(driver.get_url().is_ok());
    }

    #[test]
    fn test_mock_url_last_writer_wins() {
        let (driver, handle, _rx) = mock();

        driver.set_url("https://a.example").unwrap();
        driver.set_url("https://b.example").unwrap();

        assert_eq!(driver.get_url().unwrap(), "https://b.example");
        assert_eq!(handle.url(), "https://b.example");
    }

    #[test]
    fn test_mock_handle_fires_callbacks() {
        let (_driver, handle, rx) = mock();

        handle.emit_status(None, ResultCode::ReaderNotActive);
        handle.complete_write(ResultCode::Success);

        assert_eq!(
            rx.recv().unwrap(),
            DriverEvent::Status {
                tag: None,
                code: ResultCode::ReaderNotActive,
            }
        );
        assert_eq!(
            rx.recv().unwrap(),
            DriverEvent::WriteComplete {
                code: ResultCode::Success,
            }
        );
    }

    #[test]
    fn test_mock_background_completion() {
        let (_driver, handle, rx) = mock();

        handle
            .complete_read_in_background(None, ResultCode::CardError)
            .join()
            .unwrap();

        assert_eq!(
            rx.recv().unwrap(),
            DriverEvent::ReadComplete {
                card: None,
                code: ResultCode::CardError,
            }
        );
    }

    #[test]
    fn test_mock_auto_complete_read() {
        let (driver, handle, rx) = mock();
        handle.enable_auto_complete(
            AutoComplete::succeed_with(sample_card()).with_delay(Duration::from_millis(1)),
        );

        driver.start_read(&RequestId::new("auto").unwrap()).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            event,
            DriverEvent::ReadComplete {
                card: Some(sample_card()),
                code: ResultCode::Success,
            }
        );
    }

    #[test]
    fn test_mock_without_auto_complete_stays_silent() {
        let (driver, _handle, rx) = mock();

        driver.start_read(&RequestId::new("quiet").unwrap()).unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());
    }
}
