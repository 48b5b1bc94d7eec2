//! Environment configuration of the simulator.
//!
//! Variables carry the `CARDLINK_` prefix, e.g. `CARDLINK_SINGLE_FLIGHT=1`.
//! Empty values count as unset.

use anyhow::{Context, Result};
use cardlink_bridge::BridgeConfig;
use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;

pub const ENV_PREFIX: &str = "CARDLINK";

/// Raw variables, keyed by their name without the prefix.
#[derive(Debug, Deserialize)]
struct EnvSettings {
    #[serde(default)]
    server_url: Option<String>,
    #[serde(default)]
    single_flight: bool,
    #[serde(default)]
    legacy_channel: bool,
    #[serde(default = "default_simulated_delay_ms")]
    simulated_delay_ms: u64,
}

fn default_simulated_delay_ms() -> u64 {
    250
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bridge: BridgeConfig,
    /// Delay before the simulated card completes a read or write.
    pub simulated_delay: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    fn load(environment: Environment) -> Result<Self> {
        let env: EnvSettings = Config::builder()
            .add_source(environment.try_parsing(true).ignore_empty(true))
            .build()
            .and_then(|config| config.try_deserialize())
            .with_context(|| format!("invalid {ENV_PREFIX}_* configuration"))?;

        let mut bridge = BridgeConfig::default()
            .single_flight(env.single_flight)
            .legacy_channel(env.legacy_channel);
        if let Some(url) = env.server_url.filter(|url| !url.trim().is_empty()) {
            bridge = bridge.server_url(url);
        }

        Ok(Self {
            bridge,
            simulated_delay: Duration::from_millis(env.simulated_delay_ms),
        })
    }
}
