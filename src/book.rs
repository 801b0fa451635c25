//! Canonical order book model
//!
//! A venue-independent two-sided price ladder. Adapters normalize every
//! parseable feed message into this shape; the ladder is replaced wholesale
//! on each update rather than patched incrementally.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// A single level in the ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Canonical two-sided ladder.
///
/// Invariants held by construction: bids strictly descending by price, asks
/// strictly ascending, no duplicate price within a side, no empty levels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalBook {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl CanonicalBook {
    /// Build a book from raw per-side levels in whatever order the venue
    /// delivered them. Zero-size levels are dropped, each side is sorted into
    /// canonical order, and duplicate prices keep the first occurrence.
    pub fn from_levels(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        let mut bids: Vec<PriceLevel> = bids
            .into_iter()
            .filter(|level| level.size > Decimal::ZERO)
            .collect();
        let mut asks: Vec<PriceLevel> = asks
            .into_iter()
            .filter(|level| level.size > Decimal::ZERO)
            .collect();

        bids.sort_by(|a, b| b.price.cmp(&a.price));
        bids.dedup_by(|a, b| a.price == b.price);
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        asks.dedup_by(|a, b| a.price == b.price);

        Self { bids, asks }
    }

    pub fn side(&self, side: Side) -> &[PriceLevel] {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|level| level.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|level| level.price)
    }

    /// Mid price (average of best bid and ask)
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }

    /// Spread in basis points
    pub fn spread_bps(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask(), self.mid_price()) {
            (Some(bid), Some(ask), Some(mid)) if mid > Decimal::ZERO => {
                Some((ask - bid) / mid * Decimal::from(10000))
            }
            _ => None,
        }
    }

    /// Total bid volume
    pub fn bid_depth(&self) -> Decimal {
        self.bids.iter().map(|level| level.size).sum()
    }

    /// Total ask volume
    pub fn ask_depth(&self) -> Decimal {
        self.asks.iter().map(|level| level.size).sum()
    }

    /// A crossed book (best bid at or above best ask) indicates a garbled
    /// update and is rejected at the adapter boundary.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
