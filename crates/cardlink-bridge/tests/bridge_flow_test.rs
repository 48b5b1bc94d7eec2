//! Integration tests for command/event flows through the bridge.
//!
//! Each test drives the bridge through its name-based command surface against
//! the mock driver, fires driver callbacks the way the vendor library would
//! and checks what the subscriber receives on the main context.

mod common;

use cardlink_bridge::{BridgeConfig, BridgeEvent, CardOperation, ErrorCategory, ReaderState};
use cardlink_core::constants::CARD_FIELD_COUNT;
use cardlink_core::{LicenseCode, LicenseStatus, RequestId, ResultCode};
use cardlink_driver::DriverOperation;
use cardlink_driver::mock::{AutoComplete, DriverCall, sample_card};
use common::{Received, collector, harness};
use serde_json::json;
use std::time::Duration;

// ============================================================================
// License
// ============================================================================

#[tokio::test]
async fn test_check_license_valid() {
    let h = harness(BridgeConfig::default());
    h.driver
        .set_license_status(LicenseStatus::new(LicenseCode::LicenseValid).with_message("ok"));

    let outcome = h.dispatch("checkLicense", json!({})).await.unwrap();

    assert_eq!(
        outcome.payload(),
        Some(json!({"resultCode": "LicenseValid", "message": "ok", "isValid": true}))
    );
}

#[tokio::test]
async fn test_get_license_with_empty_key_never_reaches_driver() {
    let h = harness(BridgeConfig::default());

    let error = h
        .dispatch("getLicense", json!({"requestId": "r1", "licenseKey": ""}))
        .await
        .unwrap_err();

    assert_eq!(error.category, ErrorCategory::ValidationError);
    assert_eq!(h.driver.call_count(), 0);
}

#[tokio::test]
async fn test_get_license_relays_request() {
    let h = harness(BridgeConfig::default());
    h.driver
        .set_license_status(LicenseStatus::new(LicenseCode::DeviceMismatch));

    let outcome = h
        .dispatch("getLicense", json!({"requestId": "r1", "licenseKey": "KEY-123"}))
        .await
        .unwrap();

    assert_eq!(
        outcome.payload(),
        Some(json!({"resultCode": "DeviceMismatch", "message": null, "isValid": false}))
    );
    match &h.driver.calls()[0] {
        DriverCall::AcquireLicense(request) => {
            assert_eq!(request.request_id.as_str(), "r1");
            assert_eq!(request.license_key, "KEY-123");
        }
        other => panic!("unexpected call {other:?}"),
    }
}

// ============================================================================
// Read / write
// ============================================================================

#[tokio::test]
async fn test_failed_read_delivers_null_card() {
    let mut h = harness(BridgeConfig::default());

    let outcome = h
        .dispatch("readCard", json!({"requestId": "abc"}))
        .await
        .unwrap();
    assert_eq!(outcome.payload(), Some(json!("READ_STARTED")));

    h.driver
        .complete_read_in_background(None, ResultCode::CardError)
        .join()
        .unwrap();
    h.drain();

    assert_eq!(
        h.wire_events(),
        vec![json!({"type": "onReadCard", "cardData": null, "resultCode": "CardError"})]
    );
    assert_eq!(
        h.events()[0].request_id(),
        Some(&RequestId::new("abc").unwrap())
    );
}

#[tokio::test]
async fn test_successful_read_delivers_full_card() {
    let mut h = harness(BridgeConfig::default());
    h.dispatch("activateNFC", json!({})).await.unwrap();
    h.dispatch("readCard", json!({})).await.unwrap();
    assert_eq!(h.bridge.reader_state(), ReaderState::ReadPending);

    h.driver
        .complete_read_in_background(Some(sample_card()), ResultCode::Success)
        .join()
        .unwrap();
    h.drain();

    let wire = &h.wire_events()[0];
    let card = wire["cardData"].as_object().unwrap();
    assert_eq!(card.len(), CARD_FIELD_COUNT);
    assert_eq!(card["meterDate"], json!("2026-09-30T08:15:00"));
    assert_eq!(card["lastCreditDecreaseDate"], json!(null));
    assert_eq!(h.bridge.reader_state(), ReaderState::ReaderActive);
}

#[tokio::test]
async fn test_two_writes_yield_two_events() {
    let mut h = harness(BridgeConfig::default());
    let write = json!({
        "operationType": 1,
        "credit": 25.0,
        "reserveCreditLimit": 5.0,
        "criticalCreditLimit": 1.0,
    });

    for _ in 0..2 {
        let outcome = h.dispatch("writeCard", write.clone()).await.unwrap();
        assert_eq!(outcome.payload(), Some(json!("WRITE_STARTED")));
        h.driver.complete_write(ResultCode::Success);
    }
    h.drain();

    let events = h.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event.event_type() == "onWriteCard"));
    assert_eq!(h.driver.count_of(DriverOperation::StartWrite), 2);
    assert!(h.bridge.in_flight(CardOperation::Write).is_empty());
}

#[tokio::test]
async fn test_read_without_activation_is_forwarded() {
    let h = harness(BridgeConfig::default());

    let outcome = h.dispatch("readCard", json!({})).await.unwrap();

    assert_eq!(outcome.payload(), Some(json!("READ_STARTED")));
    assert_eq!(h.driver.count_of(DriverOperation::StartRead), 1);
    assert_eq!(h.bridge.reader_state(), ReaderState::Uninitialized);
}

#[tokio::test]
async fn test_auto_complete_read_from_driver_thread() {
    let mut h = harness(BridgeConfig::default());
    h.driver.enable_auto_complete(
        AutoComplete::succeed_with(sample_card()).with_delay(Duration::from_millis(5)),
    );

    h.dispatch("readCard", json!({"requestId": "auto-1"}))
        .await
        .unwrap();
    h.wait_for_events(1, Duration::from_secs(2)).await;

    let events = h.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].result_code(), Some(ResultCode::Success));
    assert_eq!(
        events[0].request_id(),
        Some(&RequestId::new("auto-1").unwrap())
    );
}

// ============================================================================
// Subscription
// ============================================================================

#[tokio::test]
async fn test_replacing_subscriber_routes_to_new_one() {
    let mut h = harness(BridgeConfig::default());
    let second = Received::default();

    h.bridge.subscribe(collector(&second));
    h.driver.emit_status(Some("tap"), ResultCode::Success);
    h.drain();

    assert!(h.events().is_empty());
    assert_eq!(
        *second.lock().unwrap(),
        vec![BridgeEvent::status("tap", ResultCode::Success)]
    );
}

#[tokio::test]
async fn test_event_without_subscriber_is_dropped() {
    let mut h = harness(BridgeConfig::default());
    assert!(h.bridge.unsubscribe());

    h.driver.emit_status(None, ResultCode::ReaderNotActive);
    assert_eq!(h.drain(), 0);

    let late = Received::default();
    h.bridge.subscribe(collector(&late));
    h.drain();

    assert!(late.lock().unwrap().is_empty());
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn test_legacy_channel_sees_every_event() {
    let mut h = harness(BridgeConfig::default().legacy_channel(true));
    let mut legacy = h.bridge.take_legacy_events().unwrap();
    h.bridge.unsubscribe();

    h.driver.emit_status(None, ResultCode::Timeout);
    h.driver.complete_write(ResultCode::CardNotPresent);
    h.drain();

    assert_eq!(
        legacy.try_recv().unwrap(),
        BridgeEvent::status("", ResultCode::Timeout)
    );
    assert_eq!(legacy.try_recv().unwrap().event_type(), "onWriteCard");
    assert!(h.events().is_empty());
}

// ============================================================================
// Start-up
// ============================================================================

#[tokio::test]
async fn test_initialize_reports_activation() {
    let mut h = harness(BridgeConfig::default());

    h.bridge.initialize().await.unwrap();
    h.drain();

    assert_eq!(
        h.wire_events(),
        vec![json!({"type": "onReaderInitialized", "resultCode": "Success", "error": null})]
    );
    assert_eq!(h.bridge.reader_state(), ReaderState::ReaderActive);
}

#[tokio::test]
async fn test_initialize_reports_activation_failure() {
    let mut h = harness(BridgeConfig::default());
    h.driver.fail_next(
        DriverOperation::ActivateReader,
        cardlink_driver::DriverError::disconnected("nfc0"),
    );

    h.bridge.initialize().await.unwrap();
    h.drain();

    let events = h.events();
    match &events[0] {
        BridgeEvent::ReaderInitialized { result_code, error } => {
            assert_eq!(*result_code, None);
            let error = error.as_deref().unwrap();
            assert!(error.starts_with("NfcActivationError"));
            assert!(error.contains("nfc0"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(h.bridge.reader_state(), ReaderState::Uninitialized);
}

#[tokio::test]
async fn test_initialize_without_activation_is_silent() {
    let mut h = harness(BridgeConfig::default().activate_on_start(false));

    h.bridge.initialize().await.unwrap();
    h.drain();

    assert!(h.events().is_empty());
    assert_eq!(h.driver.call_count(), 0);
}

// ============================================================================
// Single-flight
// ============================================================================

#[tokio::test]
async fn test_single_flight_rejects_second_read() {
    let mut h = harness(BridgeConfig::default().single_flight(true));

    h.dispatch("readCard", json!({"requestId": "first"}))
        .await
        .unwrap();
    let error = h
        .dispatch("readCard", json!({"requestId": "second"}))
        .await
        .unwrap_err();

    assert_eq!(error.category, ErrorCategory::ReadCardError);
    assert_eq!(error.message, "card operation already in flight");
    assert_eq!(h.driver.count_of(DriverOperation::StartRead), 1);

    // Completion frees the slot
    h.driver.complete_read(None, ResultCode::CardNotPresent);
    h.drain();
    h.dispatch("readCard", json!({"requestId": "third"}))
        .await
        .unwrap();
    assert_eq!(h.driver.count_of(DriverOperation::StartRead), 2);
}

#[tokio::test]
async fn test_unknown_command_is_not_implemented() {
    let h = harness(BridgeConfig::default());

    let outcome = h.dispatch("formatCard", json!({})).await.unwrap();

    assert!(outcome.is_not_implemented());
    assert_eq!(h.driver.call_count(), 0);
}
