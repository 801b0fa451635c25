//! Feed session manager
//!
//! Owns the single live venue session and the single pending simulated
//! order. The engine runs as one task reacting to commands, transport
//! events, and timers through one `select!` loop, so the published book,
//! connection state, and simulation report each change in exactly one place.

mod transport;

pub use transport::{Connector, Transport, TransportEvent, WsConnector, WsTransport};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::book::CanonicalBook;
use crate::config::Config;
use crate::error::{FeedError, Result};
use crate::simulator::{simulate, ImpactResult, OrderRequest, SimulatedOrder};
use crate::venue::{adapter_for, Venue, VenueAdapter};

const COMMAND_BUFFER: usize = 32;

/// Connection lifecycle of the venue session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Errored,
}

/// Published outcome of a simulation: the order it corresponds to plus its
/// execution-quality metrics.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub order: SimulatedOrder,
    pub result: ImpactResult,
}

enum Command {
    Activate { venue: Venue, symbol: String },
    Deactivate,
    SubmitOrder(SimulatedOrder),
}

/// Caller-facing handle to the feed engine. Cloneable; all clones talk to
/// the same engine task.
#[derive(Clone)]
pub struct FeedHandle {
    cmd_tx: mpsc::Sender<Command>,
    delay: Duration,
    book_rx: watch::Receiver<CanonicalBook>,
    state_rx: watch::Receiver<ConnectionState>,
    report_rx: watch::Receiver<Option<SimulationReport>>,
}

impl FeedHandle {
    /// Bring up a session for `venue`/`symbol`, tearing down any prior
    /// session first.
    pub async fn activate(&self, venue: Venue, symbol: impl Into<String>) -> Result<()> {
        self.send(Command::Activate {
            venue,
            symbol: symbol.into(),
        })
        .await
    }

    /// Tear down the active session. No-op when already idle.
    pub async fn deactivate(&self) -> Result<()> {
        self.send(Command::Deactivate).await
    }

    /// Validate and queue an order for delayed simulation. Replaces any
    /// pending submission. Validation failures surface here, synchronously.
    pub async fn submit_order(&self, request: OrderRequest) -> Result<SimulatedOrder> {
        let order = SimulatedOrder::new(request, self.delay)?;
        self.send(Command::SubmitOrder(order.clone())).await?;
        Ok(order)
    }

    /// Latest canonical book for the active session.
    pub fn book(&self) -> watch::Receiver<CanonicalBook> {
        self.book_rx.clone()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Latest simulation report, if any submission has fired.
    pub fn simulation(&self) -> watch::Receiver<Option<SimulationReport>> {
        self.report_rx.clone()
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.cmd_tx
            .send(command)
            .await
            .map_err(|_| FeedError::Transport("feed engine stopped".to_string()))
    }
}

/// Spawn the feed engine task and return its handle.
pub fn spawn_feed(config: &Config, connector: Arc<dyn Connector>) -> FeedHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (book_tx, book_rx) = watch::channel(CanonicalBook::default());
    let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
    let (report_tx, report_rx) = watch::channel(None);

    let engine = FeedEngine {
        cmd_rx,
        connector,
        config: config.clone(),
        book_tx,
        state_tx,
        report_tx,
        session: None,
        pending: None,
    };
    tokio::spawn(engine.run());

    FeedHandle {
        cmd_tx,
        delay: config.sim_delay(),
        book_rx,
        state_rx,
        report_rx,
    }
}

struct ActiveSession {
    venue: Venue,
    symbol: String,
    adapter: Box<dyn VenueAdapter>,
    transport: Box<dyn Transport>,
    /// Next client-initiated keep-alive deadline; armed only while Open.
    next_ping: Option<Instant>,
}

struct PendingOrder {
    order: SimulatedOrder,
    fire_at: Instant,
}

enum Step {
    Command(Option<Command>),
    Transport(TransportEvent),
    Ping,
    Simulate,
}

struct FeedEngine {
    cmd_rx: mpsc::Receiver<Command>,
    connector: Arc<dyn Connector>,
    config: Config,
    book_tx: watch::Sender<CanonicalBook>,
    state_tx: watch::Sender<ConnectionState>,
    report_tx: watch::Sender<Option<SimulationReport>>,
    /// The single owned session slot; at most one venue is ever Open.
    session: Option<ActiveSession>,
    /// The single pending delayed simulation slot.
    pending: Option<PendingOrder>,
}

impl FeedEngine {
    async fn run(mut self) {
        loop {
            let step = {
                let session = &mut self.session;
                let cmd_rx = &mut self.cmd_rx;
                let ping_at = session.as_ref().and_then(|s| s.next_ping);
                let sim_at = self.pending.as_ref().map(|p| p.fire_at);

                tokio::select! {
                    command = cmd_rx.recv() => Step::Command(command),
                    event = async {
                        match session.as_mut() {
                            Some(s) => s.transport.next_event().await,
                            None => std::future::pending().await,
                        }
                    } => Step::Transport(event),
                    _ = sleep_until_opt(ping_at) => Step::Ping,
                    _ = sleep_until_opt(sim_at) => Step::Simulate,
                }
            };

            match step {
                Step::Command(Some(Command::Activate { venue, symbol })) => {
                    self.activate(venue, symbol).await;
                }
                Step::Command(Some(Command::Deactivate)) => {
                    self.deactivate().await;
                }
                Step::Command(Some(Command::SubmitOrder(order))) => {
                    self.queue_order(order);
                }
                Step::Command(None) => {
                    // All handles dropped; shut the session down and stop.
                    self.deactivate().await;
                    return;
                }
                Step::Transport(event) => self.handle_transport_event(event).await,
                Step::Ping => self.send_ping().await,
                Step::Simulate => self.fire_simulation(),
            }
        }
    }

    async fn activate(&mut self, venue: Venue, symbol: String) {
        // Single-session invariant: the prior occupant goes down first.
        self.deactivate().await;

        info!(venue = %venue, symbol = %symbol, "activating venue session");
        self.set_state(ConnectionState::Connecting);

        let adapter = adapter_for(venue, self.config.endpoint_for(venue));
        let mut transport = match self.connector.connect(adapter.endpoint()).await {
            Ok(transport) => transport,
            Err(e) => {
                warn!(venue = %venue, error = %e, "connect failed");
                self.set_state(ConnectionState::Errored);
                self.set_state(ConnectionState::Idle);
                return;
            }
        };

        if let Err(e) = transport.send(adapter.subscribe_payload(&symbol)).await {
            warn!(venue = %venue, error = %e, "subscribe failed");
            transport.close().await;
            self.set_state(ConnectionState::Errored);
            self.set_state(ConnectionState::Idle);
            return;
        }

        let next_ping = adapter
            .client_ping()
            .map(|ping| Instant::now() + ping.interval);
        self.session = Some(ActiveSession {
            venue,
            symbol,
            adapter,
            transport,
            next_ping,
        });
        self.set_state(ConnectionState::Open);
        info!(venue = %venue, "venue session open");
    }

    async fn deactivate(&mut self) {
        if let Some(mut session) = self.session.take() {
            self.set_state(ConnectionState::Closing);
            // Best-effort unsubscribe while the transport is still writable.
            let unsubscribe = session.adapter.unsubscribe_payload(&session.symbol);
            if let Err(e) = session.transport.send(unsubscribe).await {
                debug!(error = %e, "unsubscribe not delivered");
            }
            session.transport.close().await;
            self.book_tx.send_replace(CanonicalBook::default());
            info!(venue = %session.venue, "venue session closed");
        }
        self.set_state(ConnectionState::Idle);
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(raw) => self.on_message(raw).await,
            TransportEvent::Error(reason) => {
                warn!(reason = %reason, "transport error");
                self.fail_session().await;
            }
            TransportEvent::Closed => {
                warn!("transport closed by peer");
                self.fail_session().await;
            }
        }
    }

    /// No auto-reconnect: the session drops to Idle and reactivation is the
    /// caller's decision.
    async fn fail_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.transport.close().await;
            self.book_tx.send_replace(CanonicalBook::default());
        }
        self.set_state(ConnectionState::Errored);
        self.set_state(ConnectionState::Idle);
    }

    /// The single point where the published book changes.
    async fn on_message(&mut self, raw: String) {
        let reply = {
            let Some(session) = self.session.as_mut() else {
                return;
            };

            if session.adapter.is_keep_alive(&raw) {
                session.adapter.keep_alive_reply(&raw)
            } else {
                if let Some(book) = session.adapter.parse_update(&raw) {
                    debug!(
                        venue = %session.venue,
                        bids = book.bids.len(),
                        asks = book.asks.len(),
                        best_bid = ?book.best_bid(),
                        best_ask = ?book.best_ask(),
                        "book replaced"
                    );
                    self.book_tx.send_replace(book);
                }
                return;
            }
        };

        if let Some(reply) = reply {
            let failed = match self.session.as_mut() {
                Some(session) => session.transport.send(reply).await.is_err(),
                None => false,
            };
            if failed {
                warn!("keep-alive reply failed");
                self.fail_session().await;
            }
        }
    }

    async fn send_ping(&mut self) {
        let failed = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let Some(ping) = session.adapter.client_ping() else {
                session.next_ping = None;
                return;
            };
            match session.transport.send(ping.payload).await {
                Ok(()) => {
                    session.next_ping = Some(Instant::now() + ping.interval);
                    false
                }
                Err(e) => {
                    warn!(error = %e, "keep-alive send failed");
                    true
                }
            }
        };
        if failed {
            self.fail_session().await;
        }
    }

    /// Single-slot delayed execution: a new submission cancels and replaces
    /// whatever was pending.
    fn queue_order(&mut self, order: SimulatedOrder) {
        let fire_at = Instant::now() + self.config.sim_delay();
        if self
            .pending
            .replace(PendingOrder { order, fire_at })
            .is_some()
        {
            debug!("pending simulation replaced");
        }
    }

    /// Runs the simulation against whatever book is current at effective
    /// time, then publishes the report.
    fn fire_simulation(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let book = self.book_tx.borrow().clone();
        let result = simulate(&pending.order, &book);
        info!(
            filled = %result.filled_quantity,
            fill_percent = %result.fill_percent,
            slippage = %result.slippage_percent,
            "simulation complete"
        );
        self.report_tx.send_replace(Some(SimulationReport {
            order: pending.order,
            result,
        }));
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current != state {
                debug!(from = ?current, to = ?state, "connection state");
                *current = state;
                true
            } else {
                false
            }
        });
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
