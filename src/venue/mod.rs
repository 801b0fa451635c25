//! Venue adapters
//!
//! One adapter per exchange. Each knows that venue's subscribe/unsubscribe
//! message shapes, keep-alive protocol, and raw book payload layout, and maps
//! inbound frames into the canonical ladder. Malformed input is dropped at
//! this boundary: adapters report "no update" instead of failing.

mod bybit;
mod deribit;
mod okx;

pub use bybit::BybitAdapter;
pub use deribit::DeribitAdapter;
pub use okx::OkxAdapter;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::book::{CanonicalBook, PriceLevel};
use crate::error::FeedError;

/// Supported venues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Okx,
    Bybit,
    Deribit,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Venue::Okx => "okx",
            Venue::Bybit => "bybit",
            Venue::Deribit => "deribit",
        };
        f.write_str(name)
    }
}

impl FromStr for Venue {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "okx" => Ok(Venue::Okx),
            "bybit" => Ok(Venue::Bybit),
            "deribit" => Ok(Venue::Deribit),
            other => Err(FeedError::Config(format!("unknown venue: {other}"))),
        }
    }
}

/// Client-initiated keep-alive obligation for venues that require one.
#[derive(Debug, Clone)]
pub struct ClientPing {
    pub interval: Duration,
    pub payload: String,
}

/// Per-venue wire protocol capability set.
///
/// Selected once at session-activation time; the session manager drives the
/// same adapter for the life of the connection.
pub trait VenueAdapter: Send + Sync {
    fn venue(&self) -> Venue;

    /// WebSocket endpoint for this venue.
    fn endpoint(&self) -> &str;

    /// Outbound subscription message in the venue's exact wire shape.
    fn subscribe_payload(&self, symbol: &str) -> String;

    /// Outbound unsubscribe message in the venue's exact wire shape.
    fn unsubscribe_payload(&self, symbol: &str) -> String;

    /// Whether an inbound frame is a ping/pong/heartbeat rather than data.
    fn is_keep_alive(&self, raw: &str) -> bool;

    /// Reply owed for a keep-alive frame, if the venue expects one.
    fn keep_alive_reply(&self, raw: &str) -> Option<String> {
        let _ = raw;
        None
    }

    /// Periodic ping the client must send while the session is open.
    fn client_ping(&self) -> Option<ClientPing> {
        None
    }

    /// Map an inbound frame to a canonical book, or `None` when the frame is
    /// not a book update for the subscribed channel (ack, keep-alive,
    /// unrelated channel, or malformed payload).
    fn parse_update(&self, raw: &str) -> Option<CanonicalBook>;
}

/// Build the adapter for a venue, optionally overriding its endpoint.
pub fn adapter_for(venue: Venue, endpoint: Option<&str>) -> Box<dyn VenueAdapter> {
    match venue {
        Venue::Okx => Box::new(match endpoint {
            Some(url) => OkxAdapter::with_endpoint(url),
            None => OkxAdapter::default(),
        }),
        Venue::Bybit => Box::new(match endpoint {
            Some(url) => BybitAdapter::with_endpoint(url),
            None => BybitAdapter::default(),
        }),
        Venue::Deribit => Box::new(match endpoint {
            Some(url) => DeribitAdapter::with_endpoint(url),
            None => DeribitAdapter::default(),
        }),
    }
}

/// Coerce a JSON value to a decimal. Venues deliver prices and sizes either
/// as strings or as native numbers; numbers go through their JSON text so the
/// decimal keeps the exact digits that were on the wire.
pub(crate) fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s).ok(),
        serde_json::Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .ok()
                .or_else(|| Decimal::from_scientific(&text).ok())
        }
        _ => None,
    }
}

/// Parse an array of `[price, size, ...]` entries. Trailing per-level
/// metadata (order counts, liquidation flags) is ignored. Any malformed or
/// negative entry invalidates the whole batch so a garbled message never
/// yields a partial ladder.
pub(crate) fn parse_levels(raw: &[serde_json::Value]) -> Option<Vec<PriceLevel>> {
    raw.iter()
        .map(|entry| {
            let pair = entry.as_array()?;
            let price = decimal_from_json(pair.first()?)?;
            let size = decimal_from_json(pair.get(1)?)?;
            if price < Decimal::ZERO || size < Decimal::ZERO {
                return None;
            }
            Some(PriceLevel::new(price, size))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_venue_round_trips_through_str() {
        for venue in [Venue::Okx, Venue::Bybit, Venue::Deribit] {
            assert_eq!(venue.to_string().parse::<Venue>().unwrap(), venue);
        }
        assert!("kraken".parse::<Venue>().is_err());
    }

    #[test]
    fn test_decimal_from_string_and_number() {
        let s: serde_json::Value = serde_json::json!("50000.50");
        let n: serde_json::Value = serde_json::json!(50000.50);
        assert_eq!(decimal_from_json(&s), Some(dec!(50000.50)));
        assert_eq!(decimal_from_json(&n), Some(dec!(50000.5)));
        assert_eq!(decimal_from_json(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_parse_levels_ignores_trailing_metadata() {
        let raw = serde_json::json!([["100.5", "1.5", "0", "4"]]);
        let levels = parse_levels(raw.as_array().unwrap()).unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].price, dec!(100.5));
        assert_eq!(levels[0].size, dec!(1.5));
    }

    #[test]
    fn test_parse_levels_rejects_whole_batch_on_bad_entry() {
        let raw = serde_json::json!([["100.5", "1.5"], ["not-a-price", "2"]]);
        assert!(parse_levels(raw.as_array().unwrap()).is_none());

        let negative = serde_json::json!([["100.5", "-1"]]);
        assert!(parse_levels(negative.as_array().unwrap()).is_none());
    }
}
