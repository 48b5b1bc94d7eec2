//! JSON-lines protocol of the command surface.
//!
//! One request object per input line, one response object per output line.
//! Events are written as `{"event": <wire form>}` between responses.

use cardlink_bridge::{BridgeEvent, CardBridge, DispatchError, ErrorCategory, Outcome};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

/// Parse one input line.
pub fn parse_request(line: &str) -> Result<Request, serde_json::Error> {
    serde_json::from_str(line)
}

/// Handle one input line and build its response.
pub async fn handle_line(bridge: &CardBridge, line: &str) -> Value {
    let request = match parse_request(line) {
        Ok(request) => request,
        Err(error) => {
            debug!(%error, "malformed request line");
            return malformed(&error.to_string());
        }
    };

    let arguments = request.arguments.unwrap_or_default();
    match bridge.dispatch(&request.method, &arguments).await {
        Ok(outcome) => response(&request.method, &outcome),
        Err(error) => failure(&request.method, &error),
    }
}

pub fn response(method: &str, outcome: &Outcome) -> Value {
    match outcome.payload() {
        Some(payload) => json!({ "method": method, "result": payload }),
        None => json!({ "method": method, "notImplemented": true }),
    }
}

pub fn failure(method: &str, error: &DispatchError) -> Value {
    json!({
        "method": method,
        "error": { "category": error.category, "message": error.message },
    })
}

pub fn malformed(message: &str) -> Value {
    json!({
        "error": { "category": ErrorCategory::ValidationError, "message": message },
    })
}

pub fn event(event: &BridgeEvent) -> Value {
    json!({ "event": event })
}
