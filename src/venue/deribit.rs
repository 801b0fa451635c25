//! Deribit venue adapter
//!
//! JSON-RPC 2.0 framing. Book data arrives as `subscription` notifications on
//! `book.<symbol>.100ms` channels with native-number price/size pairs. The
//! server drives keep-alive via `method: "heartbeat"` messages; a
//! `test_request` heartbeat expects a `public/test` call in response.

use serde::Deserialize;
use tracing::{debug, trace};

use crate::book::{CanonicalBook, PriceLevel};
use crate::error::Result;

use super::{decimal_from_json, Venue, VenueAdapter};

const DEFAULT_ENDPOINT: &str = "wss://www.deribit.com/ws/api/v2";

#[derive(Debug, Deserialize)]
struct DeribitMessage {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<DeribitParams>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DeribitParams {
    #[serde(default)]
    channel: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Option<DeribitBookData>,
}

#[derive(Debug, Deserialize)]
struct DeribitBookData {
    #[serde(default)]
    bids: Vec<serde_json::Value>,
    #[serde(default)]
    asks: Vec<serde_json::Value>,
}

pub struct DeribitAdapter {
    endpoint: String,
}

impl Default for DeribitAdapter {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl DeribitAdapter {
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }

    fn channel_for(symbol: &str) -> String {
        format!("book.{symbol}.100ms")
    }

    fn rpc(method: &str, symbol: &str) -> String {
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": { "channels": [Self::channel_for(symbol)] }
        })
        .to_string()
    }

    /// Level entries are `[price, size]` number pairs; the raw channel may
    /// prefix each with an action tag, which is skipped.
    fn parse_numeric_levels(raw: &[serde_json::Value]) -> Option<Vec<PriceLevel>> {
        raw.iter()
            .map(|entry| {
                let fields = entry.as_array()?;
                let offset = usize::from(fields.first()?.is_string());
                let price = decimal_from_json(fields.get(offset)?)?;
                let size = decimal_from_json(fields.get(offset + 1)?)?;
                if price.is_sign_negative() || size.is_sign_negative() {
                    return None;
                }
                Some(PriceLevel::new(price, size))
            })
            .collect()
    }

    fn try_parse(&self, raw: &str) -> Result<Option<CanonicalBook>> {
        let msg: DeribitMessage = serde_json::from_str(raw)?;

        if msg.result.is_some() {
            debug!("deribit rpc ack");
            return Ok(None);
        }

        if msg.method.as_deref() != Some("subscription") {
            return Ok(None);
        }

        let Some(params) = msg.params else {
            return Ok(None);
        };
        let on_book_channel = params
            .channel
            .as_deref()
            .map(|channel| channel.starts_with("book."))
            .unwrap_or(false);
        if !on_book_channel {
            return Ok(None);
        }

        let Some(data) = params.data else {
            return Ok(None);
        };

        let (Some(bids), Some(asks)) = (
            Self::parse_numeric_levels(&data.bids),
            Self::parse_numeric_levels(&data.asks),
        ) else {
            return Ok(None);
        };

        let book = CanonicalBook::from_levels(bids, asks);
        if book.is_crossed() {
            return Ok(None);
        }
        Ok(Some(book))
    }
}

impl VenueAdapter for DeribitAdapter {
    fn venue(&self) -> Venue {
        Venue::Deribit
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn subscribe_payload(&self, symbol: &str) -> String {
        Self::rpc("public/subscribe", symbol)
    }

    fn unsubscribe_payload(&self, symbol: &str) -> String {
        Self::rpc("public/unsubscribe", symbol)
    }

    fn is_keep_alive(&self, raw: &str) -> bool {
        serde_json::from_str::<DeribitMessage>(raw)
            .map(|msg| msg.method.as_deref() == Some("heartbeat"))
            .unwrap_or(false)
    }

    fn keep_alive_reply(&self, raw: &str) -> Option<String> {
        let msg: DeribitMessage = serde_json::from_str(raw).ok()?;
        if msg.method.as_deref() != Some("heartbeat") {
            return None;
        }
        // Only test_request heartbeats expect an answer.
        if msg.params.and_then(|p| p.kind).as_deref() != Some("test_request") {
            return None;
        }
        Some(
            serde_json::json!({
                "jsonrpc": "2.0",
                "method": "public/test",
                "params": {}
            })
            .to_string(),
        )
    }

    fn parse_update(&self, raw: &str) -> Option<CanonicalBook> {
        match self.try_parse(raw) {
            Ok(update) => update,
            Err(e) => {
                trace!(error = %e, "dropping malformed deribit message");
                None
            }
        }
    }
}
