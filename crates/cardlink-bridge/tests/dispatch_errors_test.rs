//! Integration tests for error isolation in command dispatch.
//!
//! Driver failures and driver panics must come back as a categorized error for
//! the command that triggered them, leaving the bridge usable.

mod common;

use cardlink_bridge::{BridgeConfig, CardOperation, ErrorCategory, ErrorKind};
use cardlink_driver::{DriverError, DriverOperation};
use common::harness;
use rstest::rstest;
use serde_json::{Value, json};

fn arguments_for(name: &str) -> Value {
    match name {
        "getLicense" => json!({"licenseKey": "KEY"}),
        "writeCard" => json!({"operationType": 3, "credit": 10}),
        "setUrl" => json!({"url": "https://lic.example"}),
        _ => json!({}),
    }
}

#[rstest]
#[case("checkLicense", DriverOperation::CheckLicense, ErrorCategory::LicenseError)]
#[case("getLicense", DriverOperation::AcquireLicense, ErrorCategory::LicenseError)]
#[case("activateNFC", DriverOperation::ActivateReader, ErrorCategory::NfcActivationError)]
#[case("deactivateNFC", DriverOperation::DeactivateReader, ErrorCategory::NfcDeactivationError)]
#[case("readCard", DriverOperation::StartRead, ErrorCategory::ReadCardError)]
#[case("writeCard", DriverOperation::StartWrite, ErrorCategory::WriteCardError)]
#[case("setUrl", DriverOperation::SetUrl, ErrorCategory::UrlError)]
#[case("getUrl", DriverOperation::GetUrl, ErrorCategory::UrlError)]
#[tokio::test]
async fn test_driver_failure_category(
    #[case] name: &str,
    #[case] operation: DriverOperation,
    #[case] category: ErrorCategory,
) {
    let h = harness(BridgeConfig::default());
    h.driver
        .fail_next(operation, DriverError::communication("link lost"));

    let error = h.dispatch(name, arguments_for(name)).await.unwrap_err();

    assert_eq!(error.category, category);
    assert_eq!(error.kind(), ErrorKind::DriverInvocation);
    assert!(error.message.contains("link lost"), "{error}");
    assert_eq!(h.driver.count_of(operation), 1);
}

#[rstest]
#[case("checkLicense", DriverOperation::CheckLicense, ErrorCategory::LicenseError)]
#[case("readCard", DriverOperation::StartRead, ErrorCategory::ReadCardError)]
#[case("getUrl", DriverOperation::GetUrl, ErrorCategory::UrlError)]
#[tokio::test]
async fn test_driver_panic_is_contained(
    #[case] name: &str,
    #[case] operation: DriverOperation,
    #[case] category: ErrorCategory,
) {
    let h = harness(BridgeConfig::default());
    h.driver.panic_next(operation);

    let error = h.dispatch(name, arguments_for(name)).await.unwrap_err();

    assert_eq!(error.category, category);
    assert!(error.message.starts_with("driver panicked"), "{error}");

    // The bridge keeps working after the panic
    assert!(h.dispatch(name, arguments_for(name)).await.is_ok());
}

#[tokio::test]
async fn test_failed_read_leaves_no_in_flight_entry() {
    let h = harness(BridgeConfig::default().single_flight(true));
    h.driver.fail_next(
        DriverOperation::StartRead,
        DriverError::timeout(3000),
    );

    let error = h
        .dispatch("readCard", json!({"requestId": "r1"}))
        .await
        .unwrap_err();
    assert_eq!(error.category, ErrorCategory::ReadCardError);
    assert!(h.bridge.in_flight(CardOperation::Read).is_empty());

    // The single-flight slot was released
    assert!(h.dispatch("readCard", json!({"requestId": "r2"})).await.is_ok());
}

#[rstest]
#[case(json!({"operationType": 1, "credit": -0.01}))]
#[case(json!({"operationType": 3, "credit": 5, "reserveCreditLimit": -1}))]
#[case(json!({"operationType": 0, "credit": 5, "criticalCreditLimit": -2}))]
#[case(json!({"operationType": 1, "credit": "ten"}))]
#[case(json!({"requestId": "", "operationType": 1, "credit": 1}))]
#[tokio::test]
async fn test_invalid_write_never_reaches_driver(#[case] arguments: Value) {
    let h = harness(BridgeConfig::default());

    let error = h.dispatch("writeCard", arguments).await.unwrap_err();

    assert_eq!(error.category, ErrorCategory::ValidationError);
    assert_eq!(h.driver.call_count(), 0);
}

#[tokio::test]
async fn test_clear_credits_ignores_negative_amount() {
    let h = harness(BridgeConfig::default());

    let outcome = h
        .dispatch("writeCard", json!({"operationType": 2, "credit": -50}))
        .await
        .unwrap();

    assert_eq!(outcome.payload(), Some(json!("WRITE_STARTED")));
    assert_eq!(h.driver.count_of(DriverOperation::StartWrite), 1);
}

#[tokio::test]
async fn test_set_url_with_empty_value_is_validation_error() {
    let h = harness(BridgeConfig::default());

    let error = h.dispatch("setUrl", json!({"url": ""})).await.unwrap_err();

    assert_eq!(error.category, ErrorCategory::ValidationError);
    assert_eq!(h.driver.call_count(), 0);
}
