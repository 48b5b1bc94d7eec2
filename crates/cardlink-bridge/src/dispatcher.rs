//! Command dispatcher.
//!
//! Validates a command, runs its single driver call on the blocking pool and
//! turns the result into an [`Outcome`]. Driver failures and panics become a
//! [`DispatchError`] with the command's category; nothing unwinds into the
//! caller.

use crate::boundary::run_blocking;
use crate::command::{ArgumentBag, Command, CommandName};
use crate::correlator::{CardOperation, EventCorrelator};
use crate::error::{BoundaryError, DispatchError, Result};
use crate::lifecycle::ReaderLifecycle;
use crate::lock;
use cardlink_core::constants::{READ_STARTED, URL_SET, WRITE_STARTED};
use cardlink_core::{LicenseCode, LicenseStatus, RequestId, ResultCode};
use cardlink_driver::{CardDriver, DriverError};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Immediate acknowledgement of an operation whose real effect is reported
/// through events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    ReadStarted,
    WriteStarted,
    /// Result code returned by an activate or deactivate call.
    Reader(ResultCode),
}

impl Ack {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadStarted => READ_STARTED,
            Self::WriteStarted => WRITE_STARTED,
            Self::Reader(code) => code.as_str(),
        }
    }
}

/// License result in transport form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseResponse {
    pub result_code: LicenseCode,
    pub message: Option<String>,
    pub is_valid: bool,
}

impl From<LicenseStatus> for LicenseResponse {
    fn from(status: LicenseStatus) -> Self {
        Self {
            result_code: status.code,
            is_valid: status.is_valid(),
            message: status.message,
        }
    }
}

/// Immediate value of a synchronous-style command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandValue {
    License(LicenseResponse),
    Url(String),
    UrlSet,
}

/// What a successful dispatch returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Acknowledged {
        ack: Ack,
        request_id: Option<RequestId>,
    },
    Value(CommandValue),
    /// The command name is unknown. Not an error.
    NotImplemented,
}

impl Outcome {
    fn ack(ack: Ack) -> Self {
        Self::Acknowledged {
            ack,
            request_id: None,
        }
    }

    /// Success payload for the control surface. `None` for `NotImplemented`.
    pub fn payload(&self) -> Option<Value> {
        match self {
            Self::Acknowledged { ack, .. } => Some(Value::String(ack.as_str().to_string())),
            Self::Value(CommandValue::License(license)) => serde_json::to_value(license).ok(),
            Self::Value(CommandValue::Url(url)) => Some(Value::String(url.clone())),
            Self::Value(CommandValue::UrlSet) => Some(Value::String(URL_SET.to_string())),
            Self::NotImplemented => None,
        }
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented)
    }
}

/// Executes commands against a driver.
#[derive(Clone)]
pub struct Dispatcher {
    driver: Arc<dyn CardDriver>,
    correlator: Arc<EventCorrelator>,
    lifecycle: Arc<Mutex<ReaderLifecycle>>,
    single_flight: bool,
}

impl Dispatcher {
    pub fn new(
        driver: Arc<dyn CardDriver>,
        correlator: Arc<EventCorrelator>,
        lifecycle: Arc<Mutex<ReaderLifecycle>>,
        single_flight: bool,
    ) -> Self {
        Self {
            driver,
            correlator,
            lifecycle,
            single_flight,
        }
    }

    /// Dispatch a command by wire name.
    ///
    /// Unknown names return `Ok(Outcome::NotImplemented)`.
    pub async fn dispatch(&self, name: &str, args: &ArgumentBag) -> Result<Outcome> {
        let Some(command_name) = CommandName::from_wire(name) else {
            debug!(command = name, "command not implemented");
            return Ok(Outcome::NotImplemented);
        };

        let command = Command::from_arguments(command_name, args).inspect_err(|error| {
            debug!(command = name, %error, "command rejected");
        })?;
        self.execute(command).await
    }

    /// Validate and execute a command.
    pub async fn execute(&self, command: Command) -> Result<Outcome> {
        let name = command.name();
        command.validate().inspect_err(|error| {
            debug!(command = %name, %error, "command rejected");
        })?;

        debug!(
            command = %name,
            request_id = command.request_id().map(RequestId::as_str),
            "dispatching command"
        );

        match command {
            Command::CheckLicense => {
                let status = self.call(name, |driver| driver.check_license()).await?;
                lock(&self.lifecycle).license_reported(&status);
                Ok(Outcome::Value(CommandValue::License(status.into())))
            }
            Command::AcquireLicense(request) => {
                let status = self
                    .call(name, move |driver| driver.acquire_license(&request))
                    .await?;
                lock(&self.lifecycle).license_reported(&status);
                Ok(Outcome::Value(CommandValue::License(status.into())))
            }
            Command::ActivateReader => {
                let code = self.call(name, |driver| driver.activate_reader()).await?;
                lock(&self.lifecycle).activation_reported(code);
                info!(result_code = %code, "reader activation requested");
                Ok(Outcome::ack(Ack::Reader(code)))
            }
            Command::DeactivateReader => {
                let code = self.call(name, |driver| driver.deactivate_reader()).await?;
                lock(&self.lifecycle).deactivated();
                self.correlator.clear_in_flight();
                info!(result_code = %code, "reader deactivation requested");
                Ok(Outcome::ack(Ack::Reader(code)))
            }
            Command::ReadCard(request_id) => {
                let issued = self.begin(name, CardOperation::Read, &request_id)?;
                let id = request_id.clone();
                let started = self.call(name, move |driver| driver.start_read(&id)).await;
                self.finish_start(CardOperation::Read, &request_id, issued, started)?;
                Ok(Outcome::Acknowledged {
                    ack: Ack::ReadStarted,
                    request_id: Some(request_id),
                })
            }
            Command::WriteCard(operation) => {
                let request_id = operation.request_id.clone();
                let issued = self.begin(name, CardOperation::Write, &request_id)?;
                let started = self
                    .call(name, move |driver| driver.start_write(&operation))
                    .await;
                self.finish_start(CardOperation::Write, &request_id, issued, started)?;
                Ok(Outcome::Acknowledged {
                    ack: Ack::WriteStarted,
                    request_id: Some(request_id),
                })
            }
            Command::SetServerUrl(url) => {
                self.call(name, move |driver| driver.set_url(url.as_str()))
                    .await?;
                Ok(Outcome::Value(CommandValue::UrlSet))
            }
            Command::GetServerUrl => {
                let url = self.call(name, |driver| driver.get_url()).await?;
                Ok(Outcome::Value(CommandValue::Url(url)))
            }
        }
    }

    /// Register a read or write before its driver call.
    ///
    /// Returns whether the reader moved to the pending state for it.
    fn begin(&self, name: CommandName, kind: CardOperation, request_id: &RequestId) -> Result<bool> {
        if !self
            .correlator
            .try_register(kind, request_id.clone(), self.single_flight)
        {
            warn!(%request_id, %kind, "card operation already in flight");
            return Err(DispatchError::new(
                name.error_category(),
                "card operation already in flight",
            ));
        }

        let issued = {
            let mut lifecycle = lock(&self.lifecycle);
            match kind {
                CardOperation::Read => lifecycle.read_issued(),
                CardOperation::Write => lifecycle.write_issued(),
            }
        };
        if !issued {
            warn!(%request_id, %kind, "reader not idle, forwarding anyway");
        }
        Ok(issued)
    }

    /// Undo [`begin`](Self::begin) if the driver call failed to start.
    ///
    /// The reader state is only rolled back when `issued` says this operation
    /// moved it; an earlier operation still pending keeps it.
    fn finish_start(
        &self,
        kind: CardOperation,
        request_id: &RequestId,
        issued: bool,
        started: Result<()>,
    ) -> Result<()> {
        if let Err(error) = started {
            self.correlator.withdraw(kind, request_id);
            if issued {
                let mut lifecycle = lock(&self.lifecycle);
                match kind {
                    CardOperation::Read => lifecycle.read_completed(),
                    CardOperation::Write => lifecycle.write_completed(),
                }
            }
            return Err(error);
        }
        info!(%request_id, %kind, "card operation started");
        Ok(())
    }

    /// Run one driver call on the blocking pool.
    async fn call<T, F>(&self, name: CommandName, f: F) -> Result<T>
    where
        F: FnOnce(&dyn CardDriver) -> std::result::Result<T, DriverError> + Send + 'static,
        T: Send + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let category = name.error_category();

        match run_blocking(move || f(&*driver)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => {
                warn!(command = %name, %error, "driver call failed");
                Err(DispatchError::new(category, error.to_string()))
            }
            Err(BoundaryError::Panicked(message)) => {
                error!(command = %name, %message, "driver call panicked");
                Err(DispatchError::new(
                    category,
                    format!("driver panicked: {message}"),
                ))
            }
            Err(error) => {
                error!(command = %name, %error, "driver call did not complete");
                Err(DispatchError::unexpected(error.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("single_flight", &self.single_flight)
            .finish_non_exhaustive()
    }
}
