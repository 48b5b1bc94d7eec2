//! Bridge configuration.

/// Configuration of a [`CardBridge`](crate::CardBridge).
///
/// # Examples
///
/// ```
/// use cardlink_bridge::BridgeConfig;
///
/// let config = BridgeConfig::default()
///     .single_flight(true)
///     .server_url("https://license.example");
///
/// assert!(config.single_flight);
/// assert!(config.activate_on_start);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Activate the reader during [`initialize`](crate::CardBridge::initialize).
    pub activate_on_start: bool,

    /// Reject a read or write while another one is still in flight.
    pub single_flight: bool,

    /// Also send every event to a secondary channel, subscriber or not.
    pub legacy_channel: bool,

    /// Server URL handed to the driver during initialization.
    pub server_url: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            activate_on_start: true,
            single_flight: false,
            legacy_channel: false,
            server_url: None,
        }
    }
}

impl BridgeConfig {
    pub fn activate_on_start(mut self, enabled: bool) -> Self {
        self.activate_on_start = enabled;
        self
    }

    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    pub fn legacy_channel(mut self, enabled: bool) -> Self {
        self.legacy_channel = enabled;
        self
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }
}
