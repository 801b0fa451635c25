//! Bybit venue adapter
//!
//! Book data arrives on `orderbook.50.<symbol>` topics. Bybit requires the
//! client to send `{"op":"ping"}` every 20 seconds while the connection is
//! open; the server answers with an `op: "pong"` frame.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::book::CanonicalBook;
use crate::error::Result;

use super::{parse_levels, ClientPing, Venue, VenueAdapter};

const DEFAULT_ENDPOINT: &str = "wss://stream.bybit.com/v5/public/spot";

const TOPIC_PREFIX: &str = "orderbook.50.";

const PING_INTERVAL: Duration = Duration::from_secs(20);

/// Top-level envelope: data frames carry `topic` + `data`, command acks
/// carry `op` + `success`.
#[derive(Debug, Deserialize)]
struct BybitMessage {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    ret_msg: Option<String>,
    #[serde(default)]
    data: Option<BybitBookData>,
}

#[derive(Debug, Deserialize)]
struct BybitBookData {
    #[serde(default)]
    b: Vec<serde_json::Value>,
    #[serde(default)]
    a: Vec<serde_json::Value>,
}

pub struct BybitAdapter {
    endpoint: String,
}

impl Default for BybitAdapter {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl BybitAdapter {
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }

    fn try_parse(&self, raw: &str) -> Result<Option<CanonicalBook>> {
        let msg: BybitMessage = serde_json::from_str(raw)?;

        if let Some(op) = &msg.op {
            debug!(op = %op, success = ?msg.success, "bybit ack");
            return Ok(None);
        }

        let on_book_topic = msg
            .topic
            .as_deref()
            .map(|topic| topic.starts_with(TOPIC_PREFIX))
            .unwrap_or(false);
        if !on_book_topic {
            return Ok(None);
        }

        let Some(data) = msg.data else {
            return Ok(None);
        };

        let (Some(bids), Some(asks)) = (parse_levels(&data.b), parse_levels(&data.a)) else {
            return Ok(None);
        };

        let book = CanonicalBook::from_levels(bids, asks);
        if book.is_crossed() {
            return Ok(None);
        }
        Ok(Some(book))
    }
}

impl VenueAdapter for BybitAdapter {
    fn venue(&self) -> Venue {
        Venue::Bybit
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn subscribe_payload(&self, symbol: &str) -> String {
        serde_json::json!({
            "op": "subscribe",
            "args": [format!("{TOPIC_PREFIX}{symbol}")]
        })
        .to_string()
    }

    fn unsubscribe_payload(&self, symbol: &str) -> String {
        serde_json::json!({
            "op": "unsubscribe",
            "args": [format!("{TOPIC_PREFIX}{symbol}")]
        })
        .to_string()
    }

    fn is_keep_alive(&self, raw: &str) -> bool {
        serde_json::from_str::<BybitMessage>(raw)
            .map(|msg| {
                matches!(msg.op.as_deref(), Some("ping") | Some("pong"))
                    || msg.ret_msg.as_deref() == Some("pong")
            })
            .unwrap_or(false)
    }

    fn client_ping(&self) -> Option<ClientPing> {
        Some(ClientPing {
            interval: PING_INTERVAL,
            payload: serde_json::json!({ "op": "ping" }).to_string(),
        })
    }

    fn parse_update(&self, raw: &str) -> Option<CanonicalBook> {
        match self.try_parse(raw) {
            Ok(update) => update,
            Err(e) => {
                trace!(error = %e, "dropping malformed bybit message");
                None
            }
        }
    }
}
