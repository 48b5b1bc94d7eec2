//! Command table.
//!
//! Maps wire names to [`CommandName`] and argument bags to validated
//! [`Command`]s. Argument extraction follows the control surface's
//! conventions: a missing string defaults to `""`, a missing number to `0`, a
//! missing `requestId` is generated. A value of the wrong JSON type is a
//! validation error.

use crate::error::{DispatchError, ErrorCategory, Result};
use cardlink_core::{CreditOperation, LicenseRequest, OperationKind, RequestId, ServerUrl};
use serde_json::Value;
use std::fmt;

/// Named arguments of one command invocation.
pub type ArgumentBag = serde_json::Map<String, Value>;

/// Every command the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    CheckLicense,
    AcquireLicense,
    ActivateReader,
    DeactivateReader,
    ReadCard,
    WriteCard,
    SetServerUrl,
    GetServerUrl,
}

impl CommandName {
    pub const ALL: [CommandName; 8] = [
        CommandName::CheckLicense,
        CommandName::AcquireLicense,
        CommandName::ActivateReader,
        CommandName::DeactivateReader,
        CommandName::ReadCard,
        CommandName::WriteCard,
        CommandName::SetServerUrl,
        CommandName::GetServerUrl,
    ];

    /// Name used on the inbound command surface.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::CheckLicense => "checkLicense",
            Self::AcquireLicense => "getLicense",
            Self::ActivateReader => "activateNFC",
            Self::DeactivateReader => "deactivateNFC",
            Self::ReadCard => "readCard",
            Self::WriteCard => "writeCard",
            Self::SetServerUrl => "setUrl",
            Self::GetServerUrl => "getUrl",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.wire_name() == name)
    }

    /// Category of errors raised while invoking the driver for this command.
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::CheckLicense | Self::AcquireLicense => ErrorCategory::LicenseError,
            Self::ActivateReader => ErrorCategory::NfcActivationError,
            Self::DeactivateReader => ErrorCategory::NfcDeactivationError,
            Self::ReadCard => ErrorCategory::ReadCardError,
            Self::WriteCard => ErrorCategory::WriteCardError,
            Self::SetServerUrl | Self::GetServerUrl => ErrorCategory::UrlError,
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A validated command, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CheckLicense,
    AcquireLicense(LicenseRequest),
    ActivateReader,
    DeactivateReader,
    ReadCard(RequestId),
    WriteCard(CreditOperation),
    SetServerUrl(ServerUrl),
    GetServerUrl,
}

impl Command {
    pub fn name(&self) -> CommandName {
        match self {
            Self::CheckLicense => CommandName::CheckLicense,
            Self::AcquireLicense(_) => CommandName::AcquireLicense,
            Self::ActivateReader => CommandName::ActivateReader,
            Self::DeactivateReader => CommandName::DeactivateReader,
            Self::ReadCard(_) => CommandName::ReadCard,
            Self::WriteCard(_) => CommandName::WriteCard,
            Self::SetServerUrl(_) => CommandName::SetServerUrl,
            Self::GetServerUrl => CommandName::GetServerUrl,
        }
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::AcquireLicense(request) => Some(&request.request_id),
            Self::ReadCard(request_id) => Some(request_id),
            Self::WriteCard(operation) => Some(&operation.request_id),
            _ => None,
        }
    }

    /// Build a command from its argument bag.
    ///
    /// Unknown argument names are ignored.
    ///
    /// # Errors
    /// `ValidationError` for a wrong argument type, an empty `requestId`,
    /// an empty `licenseKey` or an empty `url`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cardlink_bridge::{Command, CommandName};
    /// use cardlink_core::OperationKind;
    /// use serde_json::json;
    ///
    /// let args = json!({ "operationType": 9, "credit": 12.5 });
    /// let command = Command::from_arguments(CommandName::WriteCard, args.as_object().unwrap())
    ///     .unwrap();
    ///
    /// match command {
    ///     Command::WriteCard(operation) => {
    ///         assert_eq!(operation.kind, OperationKind::None);
    ///         assert_eq!(operation.amount, 12.5);
    ///     }
    ///     _ => unreachable!(),
    /// }
    /// ```
    pub fn from_arguments(name: CommandName, args: &ArgumentBag) -> Result<Self> {
        let command = match name {
            CommandName::CheckLicense => Self::CheckLicense,
            CommandName::AcquireLicense => {
                let request_id = request_id(args)?;
                let key = opt_str(args, "licenseKey")?.unwrap_or_default();
                Self::AcquireLicense(LicenseRequest::new(request_id, key)?)
            }
            CommandName::ActivateReader => Self::ActivateReader,
            CommandName::DeactivateReader => Self::DeactivateReader,
            CommandName::ReadCard => Self::ReadCard(request_id(args)?),
            CommandName::WriteCard => {
                let kind = OperationKind::from_code(opt_i64(args, "operationType")?.unwrap_or(0));
                let mut operation = CreditOperation::new(request_id(args)?, kind)
                    .with_amount(opt_f64(args, "credit")?.unwrap_or(0.0))
                    .with_limits(
                        opt_f64(args, "reserveCreditLimit")?.unwrap_or(0.0),
                        opt_f64(args, "criticalCreditLimit")?.unwrap_or(0.0),
                    );
                if let Some(paydesk_code) = opt_str(args, "paydeskCode")? {
                    operation = operation.with_paydesk_code(paydesk_code);
                }
                if let Some(customer_type) = opt_str(args, "customerType")? {
                    operation = operation.with_customer_type(customer_type);
                }
                Self::WriteCard(operation)
            }
            CommandName::SetServerUrl => {
                let url = opt_str(args, "url")?.unwrap_or_default();
                Self::SetServerUrl(ServerUrl::new(url)?)
            }
            CommandName::GetServerUrl => Self::GetServerUrl,
        };
        Ok(command)
    }

    /// Check the command's arguments before anything reaches the driver.
    ///
    /// # Errors
    /// `ValidationError` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::AcquireLicense(request) if request.license_key.trim().is_empty() => Err(
                DispatchError::validation("Invalid argument licenseKey: license key must not be empty"),
            ),
            Self::WriteCard(operation) => Ok(operation.validate()?),
            _ => Ok(()),
        }
    }
}

fn type_error(field: &str, expected: &str, value: &Value) -> DispatchError {
    DispatchError::validation(format!(
        "Invalid argument {field}: expected {expected}, got {value}"
    ))
}

/// String argument. `null` and absent both read as `None`.
pub fn opt_str(args: &ArgumentBag, field: &str) -> Result<Option<String>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(type_error(field, "a string", other)),
    }
}

/// Numeric argument as a float.
pub fn opt_f64(args: &ArgumentBag, field: &str) -> Result<Option<f64>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_f64()
            .map(Some)
            .ok_or_else(|| type_error(field, "a number", &Value::Number(number.clone()))),
        Some(other) => Err(type_error(field, "a number", other)),
    }
}

/// Numeric argument as an integer. Floats with no fractional part are
/// accepted.
pub fn opt_i64(args: &ArgumentBag, field: &str) -> Result<Option<i64>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => {
            if let Some(value) = number.as_i64() {
                return Ok(Some(value));
            }
            match number.as_f64() {
                Some(value) if value.fract() == 0.0 && value.is_finite() => {
                    Ok(Some(value as i64))
                }
                _ => Err(type_error(
                    field,
                    "an integer",
                    &Value::Number(number.clone()),
                )),
            }
        }
        Some(other) => Err(type_error(field, "an integer", other)),
    }
}

/// `requestId` argument, generated when absent.
pub fn request_id(args: &ArgumentBag) -> Result<RequestId> {
    match opt_str(args, "requestId")? {
        Some(value) => Ok(RequestId::new(value)?),
        None => Ok(RequestId::generate()),
    }
}
