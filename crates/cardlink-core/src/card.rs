//! Meter card snapshot produced by a successful read.

use crate::constants::MONTHLY_CONSUMPTION_SAMPLES;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of the values stored on a prepaid meter card.
///
/// The driver produces one per successful read and hands ownership to the
/// caller. The bridge does not interpret any of these values; it only
/// marshals them for the control surface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CardRecord {
    // Credit balances and limits
    pub main_credit: f64,
    pub reserve_credit: f64,
    pub reserve_credit_limit: f64,
    pub critical_credit_limit: f64,
    pub main_credit_ten_thousand_digits: i64,
    pub remaining_credit_on_meter: f64,
    pub spent_credit_by_meter: f64,
    pub term_credit_in_meter: f64,
    pub debt_credit: f64,

    // Identifiers
    pub card_serial_no: i64,
    pub customer_no: i64,
    pub meter_no: i64,
    pub paydesk_code: String,
    pub customer_type: String,

    // Meter hardware
    pub term: i64,
    pub term_day: i64,
    pub diameter: i64,
    pub battery: i64,
    pub reserve_battery: i64,
    pub valve_open_count: i64,
    pub valve_close_count: i64,

    // Dates, each independently absent
    pub meter_date: Option<NaiveDateTime>,
    pub last_credit_decrease_date: Option<NaiveDateTime>,
    pub last_credit_charge_date: Option<NaiveDateTime>,

    // Consumption
    pub total_consumption: f64,
    pub term_consumption: f64,
    /// Index 0 is the most recent month.
    pub monthly_consumption: [f64; MONTHLY_CONSUMPTION_SAMPLES],

    // Types and codes
    pub card_type: i64,
    pub meter_type: i64,
    pub version: i64,
    pub authority_code: i64,
}

impl CardRecord {
    /// Consumption sample for `month` (1-based, as numbered on the card).
    #[must_use]
    pub fn monthly(&self, month: usize) -> Option<f64> {
        month
            .checked_sub(1)
            .and_then(|index| self.monthly_consumption.get(index).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_is_one_based() {
        let mut card = CardRecord::default();
        card.monthly_consumption[0] = 1.5;
        card.monthly_consumption[23] = 24.5;

        assert_eq!(card.monthly(1), Some(1.5));
        assert_eq!(card.monthly(24), Some(24.5));
        assert_eq!(card.monthly(0), None);
        assert_eq!(card.monthly(25), None);
    }

    #[test]
    fn test_default_card_has_no_dates() {
        let card = CardRecord::default();
        assert!(card.meter_date.is_none());
        assert!(card.last_credit_decrease_date.is_none());
        assert!(card.last_credit_charge_date.is_none());
    }
}
