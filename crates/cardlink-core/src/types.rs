use crate::{Result, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque request identifier used to correlate driver results in logs.
///
/// The driver never echoes it back; it only travels with the command and
/// whatever in-flight bookkeeping the bridge keeps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Create a request id from a caller-supplied value.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the value is empty or whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::invalid_argument(
                "requestId",
                "request id must not be empty",
            ));
        }
        Ok(RequestId(id))
    }

    /// Generate a fresh random request id.
    #[must_use]
    pub fn generate() -> Self {
        RequestId(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result code reported by the driver on every asynchronous event.
///
/// The transport form is the variant name (e.g. `"CardError"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    Success,
    CardNotPresent,
    CardError,
    CommunicationError,
    LicenseInvalid,
    ReaderNotActive,
    NfcNotSupported,
    NfcDisabled,
    AuthenticationError,
    WrongCardType,
    Timeout,
    UnknownError,
}

impl ResultCode {
    /// Every result code, in declaration order.
    pub const ALL: [ResultCode; 12] = [
        ResultCode::Success,
        ResultCode::CardNotPresent,
        ResultCode::CardError,
        ResultCode::CommunicationError,
        ResultCode::LicenseInvalid,
        ResultCode::ReaderNotActive,
        ResultCode::NfcNotSupported,
        ResultCode::NfcDisabled,
        ResultCode::AuthenticationError,
        ResultCode::WrongCardType,
        ResultCode::Timeout,
        ResultCode::UnknownError,
    ];

    /// Transport name of this code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Success => "Success",
            ResultCode::CardNotPresent => "CardNotPresent",
            ResultCode::CardError => "CardError",
            ResultCode::CommunicationError => "CommunicationError",
            ResultCode::LicenseInvalid => "LicenseInvalid",
            ResultCode::ReaderNotActive => "ReaderNotActive",
            ResultCode::NfcNotSupported => "NfcNotSupported",
            ResultCode::NfcDisabled => "NfcDisabled",
            ResultCode::AuthenticationError => "AuthenticationError",
            ResultCode::WrongCardType => "WrongCardType",
            ResultCode::Timeout => "Timeout",
            ResultCode::UnknownError => "UnknownError",
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ResultCode::Success)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResultCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResultCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| Error::UnknownResultCode(s.to_string()))
    }
}

/// Result code set of the license server calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LicenseCode {
    LicenseValid,
    LicenseInvalid,
    LicenseExpired,
    LicenseNotFound,
    DeviceMismatch,
    ServerUnreachable,
    UnknownError,
}

impl LicenseCode {
    pub const ALL: [LicenseCode; 7] = [
        LicenseCode::LicenseValid,
        LicenseCode::LicenseInvalid,
        LicenseCode::LicenseExpired,
        LicenseCode::LicenseNotFound,
        LicenseCode::DeviceMismatch,
        LicenseCode::ServerUnreachable,
        LicenseCode::UnknownError,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseCode::LicenseValid => "LicenseValid",
            LicenseCode::LicenseInvalid => "LicenseInvalid",
            LicenseCode::LicenseExpired => "LicenseExpired",
            LicenseCode::LicenseNotFound => "LicenseNotFound",
            LicenseCode::DeviceMismatch => "DeviceMismatch",
            LicenseCode::ServerUnreachable => "ServerUnreachable",
            LicenseCode::UnknownError => "UnknownError",
        }
    }
}

impl fmt::Display for LicenseCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LicenseCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LicenseCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| Error::UnknownLicenseCode(s.to_string()))
    }
}

/// Outcome of a license check or license acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseStatus {
    pub code: LicenseCode,
    pub message: Option<String>,
}

impl LicenseStatus {
    pub fn new(code: LicenseCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// True only for [`LicenseCode::LicenseValid`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.code == LicenseCode::LicenseValid
    }
}

/// License acquisition request relayed to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRequest {
    pub request_id: RequestId,
    pub license_key: String,
}

impl LicenseRequest {
    /// # Errors
    /// Returns `Error::InvalidArgument` if the license key is empty.
    pub fn new(request_id: RequestId, license_key: impl Into<String>) -> Result<Self> {
        let license_key = license_key.into();
        if license_key.trim().is_empty() {
            return Err(Error::invalid_argument(
                "licenseKey",
                "license key must not be empty",
            ));
        }
        Ok(Self {
            request_id,
            license_key,
        })
    }
}

/// Server URL handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerUrl(String);

impl ServerUrl {
    /// # Errors
    /// Returns `Error::InvalidArgument` if the URL is empty.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::invalid_argument("url", "url must not be empty"));
        }
        Ok(ServerUrl(url))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerUrl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of credit operation written to a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationKind {
    None = 0,
    AddCredit = 1,
    ClearCredits = 2,
    SetCredit = 3,
}

impl OperationKind {
    /// Map a wire code to a kind. Unrecognized codes become `None`.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => OperationKind::AddCredit,
            2 => OperationKind::ClearCredits,
            3 => OperationKind::SetCredit,
            _ => OperationKind::None,
        }
    }

    #[must_use]
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            OperationKind::None => "None",
            OperationKind::AddCredit => "AddCredit",
            OperationKind::ClearCredits => "ClearCredits",
            OperationKind::SetCredit => "SetCredit",
        };
        f.write_str(name)
    }
}

/// Credit write request.
///
/// Amount and limits are decimals in the meter's currency unit. Use
/// [`validate`](CreditOperation::validate) before handing it to a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditOperation {
    pub request_id: RequestId,
    pub kind: OperationKind,
    pub amount: f64,
    pub reserve_limit: f64,
    pub critical_limit: f64,
    pub paydesk_code: Option<String>,
    pub customer_type: Option<String>,
}

impl CreditOperation {
    /// Create an operation with zero amount and limits.
    pub fn new(request_id: RequestId, kind: OperationKind) -> Self {
        Self {
            request_id,
            kind,
            amount: 0.0,
            reserve_limit: 0.0,
            critical_limit: 0.0,
            paydesk_code: None,
            customer_type: None,
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_limits(mut self, reserve_limit: f64, critical_limit: f64) -> Self {
        self.reserve_limit = reserve_limit;
        self.critical_limit = critical_limit;
        self
    }

    pub fn with_paydesk_code(mut self, paydesk_code: impl Into<String>) -> Self {
        self.paydesk_code = Some(paydesk_code.into());
        self
    }

    pub fn with_customer_type(mut self, customer_type: impl Into<String>) -> Self {
        self.customer_type = Some(customer_type.into());
        self
    }

    /// Check amount and limits.
    ///
    /// The amount is ignored for [`OperationKind::ClearCredits`]. NaN and
    /// infinite values are rejected everywhere they are checked.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.kind != OperationKind::ClearCredits {
            check_non_negative("credit", self.amount)?;
        }
        check_non_negative("reserveCreditLimit", self.reserve_limit)?;
        check_non_negative("criticalCreditLimit", self.critical_limit)?;
        Ok(())
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::invalid_argument(
            field,
            format!("must be a finite value >= 0, got {value}"),
        ));
    }
    Ok(())
}
