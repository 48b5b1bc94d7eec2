//! Constants shared by the command surface and the event surface.
//!
//! Acknowledgement tokens are the literal strings returned to the control
//! surface when an asynchronous operation has been handed to the driver. The
//! card field names are the transport names of a [`CardRecord`], in the order
//! the marshaler emits them.
//!
//! ```
//! use cardlink_core::constants::*;
//!
//! assert_eq!(CARD_FIELD_NAMES.len(), CARD_FIELD_COUNT);
//! assert_eq!(READ_STARTED, "READ_STARTED");
//! ```
//!
//! [`CardRecord`]: crate::CardRecord

// ============================================================================
// Acknowledgement Tokens
// ============================================================================

/// Returned by `readCard` once the read has been handed to the driver.
pub const READ_STARTED: &str = "READ_STARTED";

/// Returned by `writeCard` once the credit operation has been handed to the driver.
pub const WRITE_STARTED: &str = "WRITE_STARTED";

/// Returned by `setUrl` after the driver accepted the new server URL.
pub const URL_SET: &str = "URL_SET";

// ============================================================================
// Card Layout
// ============================================================================

/// Number of trailing monthly consumption samples stored on a card.
pub const MONTHLY_CONSUMPTION_SAMPLES: usize = 24;

/// Total number of fields in the transport form of a card.
pub const CARD_FIELD_COUNT: usize = 54;

/// Text format of non-null card dates in the transport form.
pub const DATE_TEXT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Transport field names of a card, in emission order.
pub const CARD_FIELD_NAMES: [&str; CARD_FIELD_COUNT] = [
    "reserveCreditLimit",
    "cardSeriNo",
    "customerNo",
    "meterNo",
    "term",
    "mainCredit",
    "reserveCredit",
    "criticalCreditLimit",
    "mainCreditTenThousandDigits",
    "diameter",
    "cardType",
    "paydeskCode",
    "customerType",
    "battery",
    "reserveBattery",
    "meterDate",
    "lastCreditDecreaseDate",
    "lastCreditChargeDate",
    "remainingCreditOnMeter",
    "spentCreditbyMeter",
    "termCreditInMeter",
    "debtCredit",
    "totalConsumption",
    "termConsumption",
    "termDay",
    "monthlyConsumption1",
    "monthlyConsumption2",
    "monthlyConsumption3",
    "monthlyConsumption4",
    "monthlyConsumption5",
    "monthlyConsumption6",
    "monthlyConsumption7",
    "monthlyConsumption8",
    "monthlyConsumption9",
    "monthlyConsumption10",
    "monthlyConsumption11",
    "monthlyConsumption12",
    "monthlyConsumption13",
    "monthlyConsumption14",
    "monthlyConsumption15",
    "monthlyConsumption16",
    "monthlyConsumption17",
    "monthlyConsumption18",
    "monthlyConsumption19",
    "monthlyConsumption20",
    "monthlyConsumption21",
    "monthlyConsumption22",
    "monthlyConsumption23",
    "monthlyConsumption24",
    "valveOpenCount",
    "valveCloseCount",
    "version",
    "meterType",
    "authorityCode",
];

/// Names of the card fields that may carry the absent marker.
pub const NULLABLE_DATE_FIELDS: [&str; 3] =
    ["meterDate", "lastCreditDecreaseDate", "lastCreditChargeDate"];
