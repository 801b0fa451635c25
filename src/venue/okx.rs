//! OKX venue adapter
//!
//! Book data arrives on the `books` channel keyed by `instId`. Keep-alive is
//! server-driven: the server emits `pong` frames, no client ping is required.

use serde::Deserialize;
use tracing::{debug, trace};

use crate::book::CanonicalBook;
use crate::error::Result;

use super::{parse_levels, ClientPing, Venue, VenueAdapter};

const DEFAULT_ENDPOINT: &str = "wss://ws.okx.com:8443/ws/v5/public";

const BOOK_CHANNEL: &str = "books";

/// Inbound message envelope. Acks carry `event`, data frames carry
/// `arg` + `data`.
#[derive(Debug, Deserialize)]
struct OkxMessage {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    arg: Option<OkxArg>,
    #[serde(default)]
    data: Option<Vec<OkxBookData>>,
}

#[derive(Debug, Deserialize)]
struct OkxArg {
    channel: String,
}

#[derive(Debug, Deserialize)]
struct OkxBookData {
    #[serde(default)]
    bids: Vec<serde_json::Value>,
    #[serde(default)]
    asks: Vec<serde_json::Value>,
}

pub struct OkxAdapter {
    endpoint: String,
}

impl Default for OkxAdapter {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl OkxAdapter {
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }

    fn try_parse(&self, raw: &str) -> Result<Option<CanonicalBook>> {
        let msg: OkxMessage = serde_json::from_str(raw)?;

        if let Some(event) = msg.event {
            debug!(event = %event, "okx ack");
            return Ok(None);
        }

        let channel = msg.arg.map(|arg| arg.channel);
        if channel.as_deref() != Some(BOOK_CHANNEL) {
            return Ok(None);
        }

        // Full visible depth per message; only the first batch matters.
        let Some(data) = msg.data.and_then(|mut d| {
            if d.is_empty() {
                None
            } else {
                Some(d.remove(0))
            }
        }) else {
            return Ok(None);
        };

        let (Some(bids), Some(asks)) = (parse_levels(&data.bids), parse_levels(&data.asks))
        else {
            return Ok(None);
        };

        let book = CanonicalBook::from_levels(bids, asks);
        if book.is_crossed() {
            return Ok(None);
        }
        Ok(Some(book))
    }
}

impl VenueAdapter for OkxAdapter {
    fn venue(&self) -> Venue {
        Venue::Okx
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn subscribe_payload(&self, symbol: &str) -> String {
        serde_json::json!({
            "op": "subscribe",
            "args": [{ "channel": BOOK_CHANNEL, "instId": symbol }]
        })
        .to_string()
    }

    fn unsubscribe_payload(&self, symbol: &str) -> String {
        serde_json::json!({
            "op": "unsubscribe",
            "args": [{ "channel": BOOK_CHANNEL, "instId": symbol }]
        })
        .to_string()
    }

    fn is_keep_alive(&self, raw: &str) -> bool {
        if raw.trim() == "pong" {
            return true;
        }
        serde_json::from_str::<OkxMessage>(raw)
            .map(|msg| {
                msg.op.as_deref() == Some("pong") || msg.event.as_deref() == Some("pong")
            })
            .unwrap_or(false)
    }

    fn client_ping(&self) -> Option<ClientPing> {
        // Server-driven keep-alive.
        None
    }

    fn parse_update(&self, raw: &str) -> Option<CanonicalBook> {
        match self.try_parse(raw) {
            Ok(update) => update,
            Err(e) => {
                trace!(error = %e, "dropping malformed okx message");
                None
            }
        }
    }
}
