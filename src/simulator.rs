//! Order impact simulation
//!
//! Pure computation: walks the canonical ladder to estimate how a
//! hypothetical order would fill against the liquidity the book currently
//! shows. No I/O, no state; deterministic for a given order and book.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::book::CanonicalBook;
use crate::error::FeedError;

/// Slippage (percent) above which the result carries a warning.
fn slippage_warn_threshold() -> Decimal {
    Decimal::new(5, 1) // 0.5%
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
}

/// What the caller submits. Validated into a [`SimulatedOrder`] before any
/// simulation is scheduled.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
}

/// A validated, timestamped order. Immutable once constructed; a new
/// submission fully replaces any prior pending one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedOrder {
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub submitted_at: DateTime<Utc>,
    pub effective_at: DateTime<Utc>,
}

impl SimulatedOrder {
    /// Validate a request, stamping it with submission time and the
    /// configured execution delay.
    pub fn new(request: OrderRequest, delay: Duration) -> Result<Self, FeedError> {
        if request.quantity <= Decimal::ZERO {
            return Err(FeedError::InvalidOrder(
                "quantity must be positive".to_string(),
            ));
        }
        match request.kind {
            OrderKind::Limit => match request.limit_price {
                Some(price) if price > Decimal::ZERO => {}
                Some(_) => {
                    return Err(FeedError::InvalidOrder(
                        "limit price must be positive".to_string(),
                    ))
                }
                None => {
                    return Err(FeedError::InvalidOrder(
                        "limit order requires a limit price".to_string(),
                    ))
                }
            },
            OrderKind::Market => {}
        }

        let submitted_at = Utc::now();
        let effective_at = submitted_at + chrono::Duration::milliseconds(delay.as_millis() as i64);
        Ok(Self {
            side: request.side,
            kind: request.kind,
            quantity: request.quantity,
            limit_price: request.limit_price,
            submitted_at,
            effective_at,
        })
    }
}

/// Execution-quality metrics for a simulated order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactResult {
    pub filled_quantity: Decimal,
    /// Filled fraction of the requested quantity, in [0, 100].
    pub fill_percent: Decimal,
    /// Volume-weighted fill price; zero when nothing filled.
    pub average_fill_price: Decimal,
    /// Deviation of the average fill from the touch price, percent.
    /// Always zero for limit orders.
    pub slippage_percent: Decimal,
    /// Absolute deviation of the average fill from the touch price.
    /// Always zero for limit orders.
    pub price_impact: Decimal,
    pub warning: Option<String>,
    /// Index in the same-side ladder where a resting order would display,
    /// or -1 when no level qualifies.
    pub book_locator_index: i64,
}

/// Simulate `order` against `book`.
///
/// A buy consumes asks, a sell consumes bids. Each level fills
/// `min(remaining, level size)`; limit orders skip levels beyond their limit
/// price without consuming quantity. An empty opposite side degrades to a
/// zero fill rather than an error.
pub fn simulate(order: &SimulatedOrder, book: &CanonicalBook) -> ImpactResult {
    let consumed = match order.side {
        OrderSide::Buy => &book.asks,
        OrderSide::Sell => &book.bids,
    };
    let entry_price = consumed
        .first()
        .map(|level| level.price)
        .unwrap_or(Decimal::ZERO);

    let mut remaining = order.quantity;
    let mut filled = Decimal::ZERO;
    let mut total_cost = Decimal::ZERO;

    for level in consumed {
        if remaining <= Decimal::ZERO {
            break;
        }
        if order.kind == OrderKind::Limit {
            let limit = order.limit_price.unwrap_or(Decimal::ZERO);
            let eligible = match order.side {
                OrderSide::Buy => level.price <= limit,
                OrderSide::Sell => level.price >= limit,
            };
            if !eligible {
                continue;
            }
        }
        let take = remaining.min(level.size);
        filled += take;
        total_cost += take * level.price;
        remaining -= take;
    }

    let average_fill_price = if filled > Decimal::ZERO {
        total_cost / filled
    } else {
        Decimal::ZERO
    };

    // Limit orders cannot slip past their own limit; their deviation fields
    // stay zero.
    let (slippage_percent, price_impact) = if order.kind == OrderKind::Market
        && filled > Decimal::ZERO
        && entry_price > Decimal::ZERO
    {
        let impact = (average_fill_price - entry_price).abs();
        (impact / entry_price * Decimal::ONE_HUNDRED, impact)
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    let fill_percent = if order.quantity > Decimal::ZERO {
        (filled / order.quantity * Decimal::ONE_HUNDRED).min(Decimal::ONE_HUNDRED)
    } else {
        Decimal::ZERO
    };

    let warning = if slippage_percent > slippage_warn_threshold() {
        Some(format!(
            "slippage {}% exceeds {}% threshold",
            slippage_percent.round_dp(2),
            slippage_warn_threshold()
        ))
    } else {
        None
    };

    ImpactResult {
        filled_quantity: filled,
        fill_percent,
        average_fill_price,
        slippage_percent,
        price_impact,
        warning,
        book_locator_index: locate_in_book(order, book, entry_price),
    }
}

/// Index of the first level in the side the order would rest on (bids for a
/// buy, asks for a sell) that the order's price sits at or ahead of. A market
/// order is located by the entry price it would execute at.
fn locate_in_book(order: &SimulatedOrder, book: &CanonicalBook, entry_price: Decimal) -> i64 {
    let resting = match order.side {
        OrderSide::Buy => &book.bids,
        OrderSide::Sell => &book.asks,
    };
    let locator_price = order.limit_price.unwrap_or(entry_price);

    resting
        .iter()
        .position(|level| match order.side {
            OrderSide::Buy => locator_price >= level.price,
            OrderSide::Sell => locator_price <= level.price,
        })
        .map(|index| index as i64)
        .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::PriceLevel;
    use rust_decimal_macros::dec;

    fn book(bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> CanonicalBook {
        CanonicalBook::from_levels(
            bids.iter().map(|&(p, s)| PriceLevel::new(p, s)).collect(),
            asks.iter().map(|&(p, s)| PriceLevel::new(p, s)).collect(),
        )
    }

    fn market(side: OrderSide, quantity: Decimal) -> SimulatedOrder {
        SimulatedOrder::new(
            OrderRequest {
                side,
                kind: OrderKind::Market,
                quantity,
                limit_price: None,
            },
            Duration::ZERO,
        )
        .unwrap()
    }

    fn limit(side: OrderSide, quantity: Decimal, price: Decimal) -> SimulatedOrder {
        SimulatedOrder::new(
            OrderRequest {
                side,
                kind: OrderKind::Limit,
                quantity,
                limit_price: Some(price),
            },
            Duration::ZERO,
        )
        .unwrap()
    }

    fn ladder() -> CanonicalBook {
        book(
            &[],
            &[
                (dec!(100), dec!(1)),
                (dec!(101), dec!(2)),
                (dec!(102), dec!(5)),
            ],
        )
    }

    #[test]
    fn test_market_buy_within_depth() {
        let result = simulate(&market(OrderSide::Buy, dec!(2)), &ladder());

        assert_eq!(result.filled_quantity, dec!(2));
        assert_eq!(result.fill_percent, dec!(100));
        assert_eq!(result.average_fill_price, dec!(100.5));
        assert_eq!(result.slippage_percent, dec!(0.5));
        assert_eq!(result.price_impact, dec!(0.5));
    }

    #[test]
    fn test_market_buy_exceeding_depth() {
        let result = simulate(&market(OrderSide::Buy, dec!(10)), &ladder());

        assert_eq!(result.filled_quantity, dec!(8));
        assert_eq!(result.fill_percent, dec!(80));
        // (100*1 + 101*2 + 102*5) / 8
        assert_eq!(result.average_fill_price, dec!(812) / dec!(8));
    }

    #[test]
    fn test_market_sell_walks_bids() {
        let book = book(&[(dec!(99), dec!(1)), (dec!(98), dec!(2))], &[]);
        let result = simulate(&market(OrderSide::Sell, dec!(2)), &book);

        assert_eq!(result.filled_quantity, dec!(2));
        // 1 @ 99 + 1 @ 98
        assert_eq!(result.average_fill_price, dec!(98.5));
    }

    #[test]
    fn test_limit_sell_with_unreachable_price() {
        let book = book(&[(dec!(99), dec!(1)), (dec!(98), dec!(2))], &[]);
        let result = simulate(&limit(OrderSide::Sell, dec!(1), dec!(100)), &book);

        assert_eq!(result.filled_quantity, dec!(0));
        assert_eq!(result.fill_percent, dec!(0));
        assert_eq!(result.average_fill_price, dec!(0));
    }

    #[test]
    fn test_limit_buy_skips_ineligible_levels() {
        let result = simulate(&limit(OrderSide::Buy, dec!(4), dec!(101)), &ladder());

        // 1 @ 100 + 2 @ 101; the 102 level is beyond the limit.
        assert_eq!(result.filled_quantity, dec!(3));
        assert_eq!(result.fill_percent, dec!(75));
        assert_eq!(result.average_fill_price, dec!(302) / dec!(3));
    }

    #[test]
    fn test_limit_orders_report_zero_slippage() {
        let result = simulate(&limit(OrderSide::Buy, dec!(8), dec!(102)), &ladder());

        assert_eq!(result.filled_quantity, dec!(8));
        assert_eq!(result.slippage_percent, dec!(0));
        assert_eq!(result.price_impact, dec!(0));
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_slippage_at_threshold_has_no_warning() {
        // Average 100.5 vs entry 100 is exactly 0.5%.
        let result = simulate(&market(OrderSide::Buy, dec!(2)), &ladder());
        assert_eq!(result.slippage_percent, dec!(0.5));
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_slippage_above_threshold_sets_warning() {
        let result = simulate(&market(OrderSide::Buy, dec!(10)), &ladder());
        assert!(result.slippage_percent > dec!(0.5));
        let warning = result.warning.expect("warning must be set");
        assert!(!warning.is_empty());
    }

    #[test]
    fn test_empty_book_degrades_to_zero_fill() {
        let empty = CanonicalBook::default();
        let result = simulate(&market(OrderSide::Buy, dec!(5)), &empty);

        assert_eq!(result.filled_quantity, dec!(0));
        assert_eq!(result.fill_percent, dec!(0));
        assert_eq!(result.slippage_percent, dec!(0));
        assert!(result.warning.is_none());
        assert_eq!(result.book_locator_index, -1);
    }

    #[test]
    fn test_locator_for_resting_buy() {
        let book = book(
            &[
                (dec!(100), dec!(1)),
                (dec!(99), dec!(1)),
                (dec!(98), dec!(1)),
            ],
            &[(dec!(101), dec!(1))],
        );

        // A 99.5 buy would display between the 100 and 99 bids.
        let result = simulate(&limit(OrderSide::Buy, dec!(1), dec!(99.5)), &book);
        assert_eq!(result.book_locator_index, 1);

        // Ahead of every bid.
        let result = simulate(&limit(OrderSide::Buy, dec!(1), dec!(100.5)), &book);
        assert_eq!(result.book_locator_index, 0);
    }

    #[test]
    fn test_locator_for_resting_sell() {
        let book = book(
            &[(dec!(99), dec!(1))],
            &[(dec!(100), dec!(1)), (dec!(101), dec!(1))],
        );

        let result = simulate(&limit(OrderSide::Sell, dec!(1), dec!(100.5)), &book);
        assert_eq!(result.book_locator_index, 1);

        // Below every ask: sits ahead of the whole ladder.
        let result = simulate(&limit(OrderSide::Sell, dec!(1), dec!(99.5)), &book);
        assert_eq!(result.book_locator_index, 0);
    }

    #[test]
    fn test_locator_with_no_qualifying_level() {
        let book = book(&[(dec!(100), dec!(1))], &[(dec!(101), dec!(1))]);

        // A 99 buy sits behind every displayed bid.
        let result = simulate(&limit(OrderSide::Buy, dec!(1), dec!(99)), &book);
        assert_eq!(result.book_locator_index, -1);

        // A 102 sell likewise falls off the ask ladder.
        let result = simulate(&limit(OrderSide::Sell, dec!(1), dec!(102)), &book);
        assert_eq!(result.book_locator_index, -1);
    }

    #[test]
    fn test_validation_rejects_bad_orders() {
        let zero_qty = SimulatedOrder::new(
            OrderRequest {
                side: OrderSide::Buy,
                kind: OrderKind::Market,
                quantity: dec!(0),
                limit_price: None,
            },
            Duration::ZERO,
        );
        assert!(matches!(zero_qty, Err(FeedError::InvalidOrder(_))));

        let missing_limit = SimulatedOrder::new(
            OrderRequest {
                side: OrderSide::Sell,
                kind: OrderKind::Limit,
                quantity: dec!(1),
                limit_price: None,
            },
            Duration::ZERO,
        );
        assert!(matches!(missing_limit, Err(FeedError::InvalidOrder(_))));

        let negative_limit = SimulatedOrder::new(
            OrderRequest {
                side: OrderSide::Sell,
                kind: OrderKind::Limit,
                quantity: dec!(1),
                limit_price: Some(dec!(-5)),
            },
            Duration::ZERO,
        );
        assert!(matches!(negative_limit, Err(FeedError::InvalidOrder(_))));
    }

    #[test]
    fn test_effective_time_carries_delay() {
        let order = SimulatedOrder::new(
            OrderRequest {
                side: OrderSide::Buy,
                kind: OrderKind::Market,
                quantity: dec!(1),
                limit_price: None,
            },
            Duration::from_millis(700),
        )
        .unwrap();

        assert_eq!(
            order.effective_at - order.submitted_at,
            chrono::Duration::milliseconds(700)
        );
    }
}
