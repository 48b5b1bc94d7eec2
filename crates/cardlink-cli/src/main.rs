//! Line-oriented command surface for the card bridge.
//!
//! Drives a bridge over the simulated driver: JSON requests on stdin, JSON
//! responses and events on stdout, logs on stderr.
//!
//! ```sh
//! echo '{"method":"readCard","arguments":{"requestId":"r1"}}' | cardlink
//! ```

mod protocol;
mod settings;

use anyhow::Result;
use cardlink_bridge::{BridgeEvent, CardBridge, CardOperation, MainContext};
use cardlink_driver::mock::{AutoComplete, MockDriver, sample_card};
use serde_json::Value;
use settings::Settings;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Extra time granted to operations still in flight when input ends.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env()?;
    info!(version = cardlink_core::VERSION, ?settings, "cardlink starting");

    let mut simulator = None;
    let (bridge, mut main_context) = CardBridge::new(settings.bridge.clone(), |callbacks| {
        let (driver, handle) = MockDriver::new(callbacks);
        simulator = Some(handle);
        driver
    });
    if let Some(handle) = &simulator {
        handle.enable_auto_complete(
            AutoComplete::succeed_with(sample_card()).with_delay(settings.simulated_delay),
        );
    }

    bridge.subscribe(|event: BridgeEvent| write_line(&protocol::event(&event)));
    if let Some(mut legacy) = bridge.take_legacy_events() {
        tokio::spawn(async move {
            while let Some(event) = legacy.recv().await {
                info!(event_type = event.event_type(), "legacy event");
            }
        });
    }

    bridge.initialize().await?;
    main_context.run_pending();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    let response = protocol::handle_line(&bridge, &line).await;
                    write_line(&response);
                    main_context.run_pending();
                }
                None => break,
            },
            running = main_context.next() => {
                if !running {
                    break;
                }
            }
        }
    }

    drain(&bridge, &mut main_context, settings.simulated_delay + SHUTDOWN_GRACE).await;
    info!("cardlink stopped");
    Ok(())
}

/// Deliver events of operations still in flight, up to `grace`.
async fn drain(bridge: &CardBridge, main_context: &mut MainContext, grace: Duration) {
    let pending = || {
        !bridge.in_flight(CardOperation::Read).is_empty()
            || !bridge.in_flight(CardOperation::Write).is_empty()
    };

    let finished = tokio::time::timeout(grace, async {
        while pending() {
            if !main_context.next().await {
                break;
            }
        }
    })
    .await;
    if finished.is_err() {
        warn!("input closed with card operations still in flight");
    }
    main_context.run_pending();
}

fn write_line(value: &Value) {
    let mut stdout = std::io::stdout().lock();
    if let Err(error) = writeln!(stdout, "{value}").and_then(|()| stdout.flush()) {
        warn!(%error, "failed to write to stdout");
    }
}
