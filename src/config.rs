//! Configuration module

use std::env;
use std::time::Duration;

use crate::venue::Venue;

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Venue the demo binary activates at startup.
    pub venue: Venue,

    /// Symbol to subscribe to, in the venue's own naming.
    pub symbol: String,

    /// Per-venue endpoint overrides; adapters fall back to production URLs.
    pub okx_endpoint: Option<String>,
    pub bybit_endpoint: Option<String>,
    pub deribit_endpoint: Option<String>,

    /// Simulated execution latency applied to submitted orders.
    pub sim_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let venue: Venue = env::var("VENUE")
            .unwrap_or_else(|_| "okx".to_string())
            .parse()?;

        Ok(Self {
            venue,
            symbol: env::var("SYMBOL").unwrap_or_else(|_| "BTC-USDT".to_string()),
            okx_endpoint: env::var("OKX_WS_ENDPOINT").ok(),
            bybit_endpoint: env::var("BYBIT_WS_ENDPOINT").ok(),
            deribit_endpoint: env::var("DERIBIT_WS_ENDPOINT").ok(),
            sim_delay_ms: env::var("SIM_DELAY_MS")
                .unwrap_or_else(|_| "700".to_string())
                .parse()
                .unwrap_or(700),
        })
    }

    pub fn endpoint_for(&self, venue: Venue) -> Option<&str> {
        match venue {
            Venue::Okx => self.okx_endpoint.as_deref(),
            Venue::Bybit => self.bybit_endpoint.as_deref(),
            Venue::Deribit => self.deribit_endpoint.as_deref(),
        }
    }

    pub fn sim_delay(&self) -> Duration {
        Duration::from_millis(self.sim_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            venue: Venue::Okx,
            symbol: "BTC-USDT".to_string(),
            okx_endpoint: None,
            bybit_endpoint: None,
            deribit_endpoint: None,
            sim_delay_ms: 700,
        }
    }
}
