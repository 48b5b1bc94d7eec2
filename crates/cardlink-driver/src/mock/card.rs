//! Sample card data for tests and the simulator.

use cardlink_core::CardRecord;
use chrono::NaiveDate;

/// A fully populated meter card.
///
/// `meter_date` and `last_credit_charge_date` are set,
/// `last_credit_decrease_date` is absent, so both date renderings are covered.
pub fn sample_card() -> CardRecord {
    let mut monthly_consumption = [0.0; 24];
    for (index, sample) in monthly_consumption.iter_mut().enumerate() {
        *sample = 10.0 + index as f64 * 0.5;
    }

    CardRecord {
        main_credit: 125.75,
        reserve_credit: 10.0,
        reserve_credit_limit: 15.0,
        critical_credit_limit: 5.0,
        main_credit_ten_thousand_digits: 0,
        remaining_credit_on_meter: 98.25,
        spent_credit_by_meter: 1204.5,
        term_credit_in_meter: 40.0,
        debt_credit: 0.0,
        card_serial_no: 40_211_873,
        customer_no: 100_482,
        meter_no: 7_700_123,
        paydesk_code: "PD-04".to_string(),
        customer_type: "RESIDENTIAL".to_string(),
        term: 3,
        term_day: 12,
        diameter: 20,
        battery: 92,
        reserve_battery: 88,
        valve_open_count: 31,
        valve_close_count: 30,
        meter_date: NaiveDate::from_ymd_opt(2026, 9, 30).and_then(|d| d.and_hms_opt(8, 15, 0)),
        last_credit_decrease_date: None,
        last_credit_charge_date: NaiveDate::from_ymd_opt(2026, 9, 2)
            .and_then(|d| d.and_hms_opt(14, 3, 27)),
        total_consumption: 3120.4,
        term_consumption: 86.2,
        monthly_consumption,
        card_type: 1,
        meter_type: 2,
        version: 7,
        authority_code: 34,
    }
}
