//! lobsim - live order book normalization and order impact simulation
//!
//! Connects to one cryptocurrency venue at a time over WebSocket, normalizes
//! that venue's book feed into a canonical bid/ask ladder, and simulates how
//! a hypothetical order would execute against the latest book.

pub mod book;
pub mod config;
pub mod error;
pub mod session;
pub mod simulator;
pub mod venue;

pub use book::{CanonicalBook, PriceLevel, Side};
pub use config::Config;
pub use error::{FeedError, Result};
pub use session::{
    spawn_feed, ConnectionState, Connector, FeedHandle, SimulationReport, Transport,
    TransportEvent, WsConnector,
};
pub use simulator::{
    simulate, ImpactResult, OrderKind, OrderRequest, OrderSide, SimulatedOrder,
};
pub use venue::{adapter_for, ClientPing, Venue, VenueAdapter};
