//! Card data marshaling.
//!
//! Converts a [`CardRecord`] into a transport-neutral, insertion-ordered map
//! of named fields for the control surface. The conversion is total, pure and
//! deterministic: every field is always present, and a date that is not set on
//! the card becomes [`TransportValue::Absent`] rather than being left out.
//!
//! There is no inverse direction; the control surface never sends cards back.
//!
//! # Examples
//!
//! ```
//! use cardlink_bridge::marshal::{TransportValue, to_transport};
//! use cardlink_core::CardRecord;
//!
//! assert_eq!(to_transport(None), TransportValue::Absent);
//!
//! let card = CardRecord::default();
//! let map = to_transport(Some(&card));
//! let fields = map.as_map().unwrap();
//! assert_eq!(fields.get("meterDate"), Some(&TransportValue::Absent));
//! ```

use cardlink_core::CardRecord;
use cardlink_core::constants::{CARD_FIELD_COUNT, DATE_TEXT_FORMAT};
use chrono::NaiveDateTime;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A value in transport form.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportValue {
    /// Explicit absent marker. Serializes as `null`.
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Map(FieldMap),
}

impl TransportValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_map(&self) -> Option<&FieldMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl Serialize for TransportValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Int(value) => serializer.serialize_i64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Text(value) => serializer.serialize_str(value),
            Self::Map(map) => map.serialize(serializer),
        }
    }
}

impl From<i64> for TransportValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for TransportValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for TransportValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Option<NaiveDateTime>> for TransportValue {
    fn from(value: Option<NaiveDateTime>) -> Self {
        match value {
            Some(date) => Self::Text(date.format(DATE_TEXT_FORMAT).to_string()),
            None => Self::Absent,
        }
    }
}

/// Insertion-ordered map of named transport values.
///
/// Serializes as an object whose keys keep insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMap {
    fields: Vec<(String, TransportValue)>,
}

impl FieldMap {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Insert a field, replacing the value of an existing field with the same
    /// name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<TransportValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TransportValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TransportValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Transport form of an optional card.
///
/// `None` (a read that failed and produced no card) becomes the absent marker.
pub fn to_transport(card: Option<&CardRecord>) -> TransportValue {
    match card {
        Some(card) => TransportValue::Map(card_fields(card)),
        None => TransportValue::Absent,
    }
}

/// Field map of a card, in the order of
/// [`CARD_FIELD_NAMES`](cardlink_core::constants::CARD_FIELD_NAMES).
pub fn card_fields(card: &CardRecord) -> FieldMap {
    let mut map = FieldMap::with_capacity(CARD_FIELD_COUNT);

    map.insert("reserveCreditLimit", card.reserve_credit_limit);
    map.insert("cardSeriNo", card.card_serial_no);
    map.insert("customerNo", card.customer_no);
    map.insert("meterNo", card.meter_no);
    map.insert("term", card.term);
    map.insert("mainCredit", card.main_credit);
    map.insert("reserveCredit", card.reserve_credit);
    map.insert("criticalCreditLimit", card.critical_credit_limit);
    map.insert(
        "mainCreditTenThousandDigits",
        card.main_credit_ten_thousand_digits,
    );
    map.insert("diameter", card.diameter);
    map.insert("cardType", card.card_type);
    map.insert("paydeskCode", card.paydesk_code.as_str());
    map.insert("customerType", card.customer_type.as_str());
    map.insert("battery", card.battery);
    map.insert("reserveBattery", card.reserve_battery);
    map.insert("meterDate", card.meter_date);
    map.insert("lastCreditDecreaseDate", card.last_credit_decrease_date);
    map.insert("lastCreditChargeDate", card.last_credit_charge_date);
    map.insert("remainingCreditOnMeter", card.remaining_credit_on_meter);
    map.insert("spentCreditbyMeter", card.spent_credit_by_meter);
    map.insert("termCreditInMeter", card.term_credit_in_meter);
    map.insert("debtCredit", card.debt_credit);
    map.insert("totalConsumption", card.total_consumption);
    map.insert("termConsumption", card.term_consumption);
    map.insert("termDay", card.term_day);
    for (index, sample) in card.monthly_consumption.iter().enumerate() {
        map.insert(format!("monthlyConsumption{}", index + 1), *sample);
    }
    map.insert("valveOpenCount", card.valve_open_count);
    map.insert("valveCloseCount", card.valve_close_count);
    map.insert("version", card.version);
    map.insert("meterType", card.meter_type);
    map.insert("authorityCode", card.authority_code);

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlink_core::constants::{CARD_FIELD_NAMES, NULLABLE_DATE_FIELDS};
    use cardlink_driver::mock::sample_card;

    #[test]
    fn test_absent_card_is_absent_marker() {
        assert_eq!(to_transport(None), TransportValue::Absent);
        assert_eq!(serde_json::to_string(&to_transport(None)).unwrap(), "null");
    }

    #[test]
    fn test_field_set_and_order_match_schema() {
        let fields = card_fields(&sample_card());
        let names: Vec<&str> = fields.names().collect();
        assert_eq!(names, CARD_FIELD_NAMES.to_vec());
    }

    #[test]
    fn test_null_dates_render_absent() {
        let card = CardRecord::default();
        let fields = card_fields(&card);

        for name in NULLABLE_DATE_FIELDS {
            assert_eq!(fields.get(name), Some(&TransportValue::Absent), "{name}");
        }
        assert_eq!(fields.len(), CARD_FIELD_COUNT);
    }

    #[test]
    fn test_set_dates_render_text() {
        let fields = card_fields(&sample_card());

        assert_eq!(
            fields.get("meterDate").and_then(TransportValue::as_str),
            Some("2026-09-30T08:15:00")
        );
        assert_eq!(
            fields.get("lastCreditChargeDate").and_then(TransportValue::as_str),
            Some("2026-09-02T14:03:27")
        );
        assert!(fields.get("lastCreditDecreaseDate").unwrap().is_absent());
    }

    #[test]
    fn test_values_are_preserved() {
        let card = sample_card();
        let fields = card_fields(&card);

        assert_eq!(fields.get("mainCredit").and_then(TransportValue::as_f64), Some(125.75));
        assert_eq!(fields.get("cardSeriNo").and_then(TransportValue::as_i64), Some(40_211_873));
        assert_eq!(fields.get("paydeskCode").and_then(TransportValue::as_str), Some("PD-04"));
        assert_eq!(
            fields.get("spentCreditbyMeter").and_then(TransportValue::as_f64),
            Some(card.spent_credit_by_meter)
        );
        assert_eq!(
            fields.get("monthlyConsumption1").and_then(TransportValue::as_f64),
            card.monthly(1)
        );
        assert_eq!(
            fields.get("monthlyConsumption24").and_then(TransportValue::as_f64),
            card.monthly(24)
        );
    }

    #[test]
    fn test_marshaling_is_deterministic() {
        let card = sample_card();
        assert_eq!(card_fields(&card), card_fields(&card));
    }

    #[test]
    fn test_json_keeps_field_order() {
        let json = serde_json::to_string(&to_transport(Some(&sample_card()))).unwrap();

        let first = json.find("\"reserveCreditLimit\"").unwrap();
        let middle = json.find("\"meterDate\"").unwrap();
        let last = json.find("\"authorityCode\"").unwrap();
        assert!(first < middle && middle < last);
        assert!(json.contains("\"lastCreditDecreaseDate\":null"));
    }

    #[test]
    fn test_field_map_insert_replaces_in_place() {
        let mut map = FieldMap::default();
        map.insert("a", 1i64);
        map.insert("b", 2i64);
        map.insert("a", 3i64);

        assert_eq!(map.len(), 2);
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&TransportValue::Int(3)));
    }
}
