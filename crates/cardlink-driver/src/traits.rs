//! Driver adapter trait definitions.
//!
//! [`CardDriver`] is the outbound half: the calls the bridge makes into the
//! vendor card library. [`DriverCallbacks`] is the inbound half: the library
//! reports results through it later, from whatever thread it likes.
//!
//! Every `CardDriver` method is synchronous and may block for a full hardware
//! or network round trip. Callers that must stay responsive run them on a
//! blocking worker (see `cardlink-bridge`).

use crate::error::Result;
use cardlink_core::{
    CardRecord, CreditOperation, LicenseRequest, LicenseStatus, RequestId, ResultCode,
};
use std::fmt;

/// Entry points of the vendor card driver.
///
/// Implementations must be shareable across threads: the bridge calls them
/// from a blocking worker pool while callbacks may fire concurrently.
///
/// `start_read` and `start_write` return as soon as the driver accepted the
/// request. The actual outcome arrives through
/// [`DriverCallbacks::on_read_complete`] and
/// [`DriverCallbacks::on_write_complete`]. At most one read or write is
/// expected to be in flight at a time, but nothing here enforces that.
pub trait CardDriver: Send + Sync {
    /// Power up the NFC reader.
    fn activate_reader(&self) -> Result<ResultCode>;

    /// Power down the NFC reader.
    fn deactivate_reader(&self) -> Result<ResultCode>;

    /// Check the locally stored license.
    fn check_license(&self) -> Result<LicenseStatus>;

    /// Acquire a license from the license server.
    fn acquire_license(&self, request: &LicenseRequest) -> Result<LicenseStatus>;

    /// Begin waiting for a card and reading it.
    fn start_read(&self, request_id: &RequestId) -> Result<()>;

    /// Begin waiting for a card and writing a credit operation to it.
    fn start_write(&self, operation: &CreditOperation) -> Result<()>;

    /// Replace the server URL used by the driver.
    fn set_url(&self, url: &str) -> Result<()>;

    /// Current server URL.
    fn get_url(&self) -> Result<String>;
}

/// Driver entry point identifier, used in errors and call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOperation {
    ActivateReader,
    DeactivateReader,
    CheckLicense,
    AcquireLicense,
    StartRead,
    StartWrite,
    SetUrl,
    GetUrl,
}

impl fmt::Display for DriverOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ActivateReader => "ActivateReader",
            Self::DeactivateReader => "DeactivateReader",
            Self::CheckLicense => "CheckLicense",
            Self::AcquireLicense => "AcquireLicense",
            Self::StartRead => "StartRead",
            Self::StartWrite => "StartWrite",
            Self::SetUrl => "SetUrl",
            Self::GetUrl => "GetUrl",
        };
        write!(f, "{name}")
    }
}

/// Event pushed by the driver.
///
/// The driver does not echo any request identifier, so none of these carry
/// one.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// Generic status notification with an optional free-form tag.
    Status {
        tag: Option<String>,
        code: ResultCode,
    },

    /// A read finished. `card` is absent when the read failed.
    ReadComplete {
        card: Option<CardRecord>,
        code: ResultCode,
    },

    /// A credit write finished.
    WriteComplete { code: ResultCode },
}

impl DriverEvent {
    /// Result code carried by the event.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::Status { code, .. }
            | Self::ReadComplete { code, .. }
            | Self::WriteComplete { code } => *code,
        }
    }
}

/// Receiver of driver callbacks.
///
/// Implementors only provide [`on_driver_event`](Self::on_driver_event); the
/// three callback entry points the vendor library knows about are provided
/// methods that wrap their arguments into a [`DriverEvent`].
///
/// Callbacks may be invoked from any thread at any time, including while a
/// `CardDriver` call is still running.
pub trait DriverCallbacks: Send + Sync {
    fn on_driver_event(&self, event: DriverEvent);

    fn on_status(&self, tag: Option<&str>, code: ResultCode) {
        self.on_driver_event(DriverEvent::Status {
            tag: tag.map(str::to_owned),
            code,
        });
    }

    fn on_read_complete(&self, card: Option<CardRecord>, code: ResultCode) {
        self.on_driver_event(DriverEvent::ReadComplete { card, code });
    }

    fn on_write_complete(&self, code: ResultCode) {
        self.on_driver_event(DriverEvent::WriteComplete { code });
    }
}
