//! lobsim demo service
//!
//! Activates the configured venue, logs the top of book as updates arrive,
//! and runs one sample market-order simulation once liquidity shows up.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lobsim::{
    spawn_feed, Config, OrderKind, OrderRequest, OrderSide, WsConnector,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let config = Config::load()?;
    info!(venue = %config.venue, symbol = %config.symbol, "starting lobsim feed");

    let handle = spawn_feed(&config, Arc::new(WsConnector));
    handle.activate(config.venue, config.symbol.clone()).await?;

    let mut book_rx = handle.book();
    let mut report_rx = handle.simulation();
    let mut submitted = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            changed = book_rx.changed() => {
                if changed.is_err() {
                    warn!("feed engine stopped");
                    break;
                }
                let book = book_rx.borrow().clone();
                info!(
                    best_bid = ?book.best_bid(),
                    best_ask = ?book.best_ask(),
                    mid = ?book.mid_price(),
                    spread_bps = ?book.spread_bps(),
                    "book update"
                );

                if !submitted && !book.asks.is_empty() {
                    submitted = true;
                    let order = handle
                        .submit_order(OrderRequest {
                            side: OrderSide::Buy,
                            kind: OrderKind::Market,
                            quantity: Decimal::ONE,
                            limit_price: None,
                        })
                        .await?;
                    info!(effective_at = %order.effective_at, "sample order submitted");
                }
            }
            changed = report_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(report) = report_rx.borrow().clone() {
                    info!(
                        filled = %report.result.filled_quantity,
                        fill_percent = %report.result.fill_percent,
                        avg_price = %report.result.average_fill_price,
                        slippage = %report.result.slippage_percent,
                        warning = ?report.result.warning,
                        locator = report.result.book_locator_index,
                        "simulation report"
                    );
                }
            }
        }
    }

    handle.deactivate().await?;
    Ok(())
}
