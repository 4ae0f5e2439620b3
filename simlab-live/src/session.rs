//! One isolated paper-trading session per client.
//!
//! Each session is a tokio task that exclusively owns its ledger and trade
//! history; the only way in is a command channel or the market-data
//! subscription, so no locks guard session state. Status machine:
//! `active ⇄ paused`, `any → stopped` (terminal).

use crate::feed::{MarketFeed, MarketTick};
use crate::persistence::{SessionSnapshot, SessionStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use simlab_core::domain::{ExecutedTrade, PositionSide, SignalType, TradeOrder};
use simlab_core::execution::{ExecutionConfig, ExecutionSimulator};
use simlab_core::ledger::{Ledger, PositionSizing};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Errors surfaced to session clients.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("session is already stopped")]
    AlreadyStopped,
    #[error("session is already active")]
    AlreadyActive,
    #[error("session is already paused")]
    AlreadyPaused,
    #[error("session '{0}' not found")]
    NotFound(String),
    #[error("session '{0}' already exists")]
    DuplicateId(String),
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}

/// Lifecycle state of a session. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Stopped,
}

/// Configuration for one paper-trading session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub session_id: String,
    /// Opaque reference to the strategy definition driving this session.
    pub strategy: String,
    pub symbol: String,
    pub initial_capital: f64,
    pub sizing: PositionSizing,
    pub execution: ExecutionConfig,
    /// Cadence of best-effort snapshot persistence.
    pub snapshot_interval: Duration,
}

/// An externally evaluated signal pushed into a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveSignal {
    pub signal_type: SignalType,
    pub side: PositionSide,
}

/// Point-in-time view of a session's accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub session_id: String,
    pub status: SessionStatus,
    pub equity: f64,
    pub available_capital: f64,
    pub total_realized_pnl: f64,
    pub total_unrealized_pnl: f64,
    pub total_fees: f64,
    pub open_positions: usize,
    pub trade_count: usize,
    pub last_price: Option<f64>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

enum Command {
    Pause(oneshot::Sender<Result<(), SessionError>>),
    Resume(oneshot::Sender<Result<(), SessionError>>),
    Stop(oneshot::Sender<Result<SessionMetrics, SessionError>>),
    Status(oneshot::Sender<SessionStatus>),
    Trades(oneshot::Sender<Vec<ExecutedTrade>>),
    Metrics(oneshot::Sender<SessionMetrics>),
    Signal(LiveSignal),
}

/// Client handle to a running session. Cheap to clone; every method is a
/// message to the session's own task.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    session_id: String,
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn pause(&self) -> Result<(), SessionError> {
        self.request(Command::Pause).await?
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        self.request(Command::Resume).await?
    }

    /// Stop the session: liquidate at the last known price, persist a
    /// final snapshot, terminate the task. Fails `AlreadyStopped` on a
    /// second call.
    pub async fn stop(&self) -> Result<SessionMetrics, SessionError> {
        self.request(Command::Stop).await?
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        self.request(Command::Status).await
    }

    pub async fn trades(&self) -> Result<Vec<ExecutedTrade>, SessionError> {
        self.request(Command::Trades).await
    }

    pub async fn metrics(&self) -> Result<SessionMetrics, SessionError> {
        self.request(Command::Metrics).await
    }

    /// Push an externally evaluated signal into the session.
    pub async fn signal(&self, signal: LiveSignal) -> Result<(), SessionError> {
        self.tx
            .send(Command::Signal(signal))
            .await
            .map_err(|_| SessionError::AlreadyStopped)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::AlreadyStopped)?;
        reply_rx.await.map_err(|_| SessionError::AlreadyStopped)
    }
}

/// Spawn a session actor. Returns the client handle and the join handle of
/// the owning task (used by the registry for lifecycle cleanup).
pub fn spawn_session(
    config: SessionConfig,
    feed: Arc<dyn MarketFeed>,
    store: Arc<dyn SessionStore>,
) -> Result<(SessionHandle, JoinHandle<()>), SessionError> {
    if config.session_id.is_empty() {
        return Err(SessionError::InvalidConfig("session id must not be empty".into()));
    }
    if config.symbol.is_empty() {
        return Err(SessionError::InvalidConfig("symbol must not be empty".into()));
    }
    let ledger = Ledger::new(config.initial_capital, config.sizing)
        .map_err(|e| SessionError::InvalidConfig(e.to_string()))?;

    let (tx, rx) = mpsc::channel(64);
    let handle = SessionHandle {
        session_id: config.session_id.clone(),
        tx,
    };

    let actor = SessionActor {
        simulator: ExecutionSimulator::new(config.execution),
        ledger,
        trades: Vec::new(),
        status: SessionStatus::Active,
        last_price: None,
        last_timestamp: None,
        config,
        feed,
        store,
    };
    let join = tokio::spawn(actor.run(rx));
    Ok((handle, join))
}

struct SessionActor {
    config: SessionConfig,
    status: SessionStatus,
    ledger: Ledger,
    simulator: ExecutionSimulator,
    trades: Vec<ExecutedTrade>,
    last_price: Option<f64>,
    last_timestamp: Option<DateTime<Utc>>,
    feed: Arc<dyn MarketFeed>,
    store: Arc<dyn SessionStore>,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let session_id = self.config.session_id.clone();
        tracing::info!(session = %session_id, symbol = %self.config.symbol, "session started");

        self.persist_async("create");

        let mut ticks: Option<broadcast::Receiver<MarketTick>> =
            Some(self.feed.subscribe(&self.config.symbol));
        let mut snapshots = tokio::time::interval(self.config.snapshot_interval);
        snapshots.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick completes immediately; the create above
        // already covers it.
        snapshots.tick().await;

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        None => {
                            // Every handle dropped: treat as a stop request
                            // so open positions are not silently abandoned.
                            tracing::warn!(session = %session_id, "all handles dropped, stopping");
                            self.liquidate();
                            self.status = SessionStatus::Stopped;
                            self.persist_final().await;
                            break;
                        }
                        Some(cmd) => {
                            if self.handle_command(cmd, &mut ticks).await {
                                break;
                            }
                        }
                    }
                }
                tick = recv_or_pending(&mut ticks) => {
                    match tick {
                        Ok(tick) => self.on_tick(tick),
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(session = %session_id, missed, "feed lagged, continuing");
                        }
                        Err(RecvError::Closed) => {
                            tracing::warn!(session = %session_id, "feed topic closed");
                            ticks = None;
                        }
                    }
                }
                _ = snapshots.tick() => {
                    self.persist_async("periodic");
                }
            }
        }

        tracing::info!(session = %session_id, "session ended");
    }

    /// Handle one command; returns true when the actor must terminate.
    async fn handle_command(
        &mut self,
        cmd: Command,
        ticks: &mut Option<broadcast::Receiver<MarketTick>>,
    ) -> bool {
        match cmd {
            Command::Pause(reply) => {
                let result = match self.status {
                    SessionStatus::Active => {
                        // Unsubscribe; ledger and trade history stay as-is.
                        *ticks = None;
                        self.status = SessionStatus::Paused;
                        tracing::info!(session = %self.config.session_id, "paused");
                        Ok(())
                    }
                    SessionStatus::Paused => Err(SessionError::AlreadyPaused),
                    SessionStatus::Stopped => Err(SessionError::AlreadyStopped),
                };
                let _ = reply.send(result);
                false
            }
            Command::Resume(reply) => {
                let result = match self.status {
                    SessionStatus::Paused => {
                        *ticks = Some(self.feed.subscribe(&self.config.symbol));
                        self.status = SessionStatus::Active;
                        tracing::info!(session = %self.config.session_id, "resumed");
                        Ok(())
                    }
                    SessionStatus::Active => Err(SessionError::AlreadyActive),
                    SessionStatus::Stopped => Err(SessionError::AlreadyStopped),
                };
                let _ = reply.send(result);
                false
            }
            Command::Stop(reply) => {
                *ticks = None;
                self.liquidate();
                self.status = SessionStatus::Stopped;
                self.persist_final().await;
                let _ = reply.send(Ok(self.metrics()));
                true
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status);
                false
            }
            Command::Trades(reply) => {
                let _ = reply.send(self.trades.clone());
                false
            }
            Command::Metrics(reply) => {
                let _ = reply.send(self.metrics());
                false
            }
            Command::Signal(signal) => {
                self.on_signal(signal);
                false
            }
        }
    }

    fn on_tick(&mut self, tick: MarketTick) {
        if tick.symbol != self.config.symbol {
            return;
        }
        self.last_price = Some(tick.price);
        self.last_timestamp = Some(tick.timestamp);

        let mut prices = HashMap::new();
        prices.insert(self.config.symbol.clone(), tick.price);
        self.ledger.mark_to_market(&prices);
    }

    fn on_signal(&mut self, signal: LiveSignal) {
        if self.status != SessionStatus::Active {
            tracing::info!(
                session = %self.config.session_id,
                status = ?self.status,
                "signal ignored while not active"
            );
            return;
        }
        let Some(price) = self.last_price else {
            tracing::warn!(
                session = %self.config.session_id,
                "signal ignored: no market price seen yet"
            );
            return;
        };
        let timestamp = self.last_timestamp.unwrap_or_else(Utc::now);

        match signal.signal_type {
            SignalType::Entry => {
                // One open position per symbol; an entry while one is open
                // is a policy-level no-op, not an error.
                if self.ledger.has_open_position(&self.config.symbol) {
                    tracing::info!(
                        session = %self.config.session_id,
                        "entry ignored: position already open"
                    );
                    return;
                }
                self.open_position(signal.side, price, timestamp);
            }
            SignalType::Exit | SignalType::Stop => {
                self.close_all(signal.signal_type, price, timestamp);
            }
        }
    }

    fn open_position(&mut self, side: PositionSide, price: f64, timestamp: DateTime<Utc>) {
        let quantity = self.ledger.derive_quantity(price);
        let order = TradeOrder::new(&self.config.symbol, side, quantity, SignalType::Entry);
        let trade = match self.simulator.execute(&order, price, timestamp) {
            Ok(trade) => trade,
            Err(err) => {
                tracing::warn!(session = %self.config.session_id, %err, "entry rejected");
                return;
            }
        };

        let required = trade.gross_value() + trade.fee;
        if required > self.ledger.available_capital {
            tracing::warn!(
                session = %self.config.session_id,
                required,
                available = self.ledger.available_capital,
                "entry rejected: insufficient capital"
            );
            return;
        }

        match self.ledger.open_position(
            &self.config.symbol,
            side,
            trade.execution_price,
            timestamp,
            Some(quantity),
        ) {
            Ok(position) => {
                let _ = self.ledger.debit_fee(trade.fee);
                tracing::info!(
                    session = %self.config.session_id,
                    position = %position.id,
                    side = ?side,
                    price = trade.execution_price,
                    quantity,
                    "position opened"
                );
                self.trades.push(trade);
            }
            Err(err) => {
                tracing::warn!(session = %self.config.session_id, %err, "entry rejected");
            }
        }
    }

    fn close_all(&mut self, signal_type: SignalType, price: f64, timestamp: DateTime<Utc>) {
        let open: Vec<_> = self
            .ledger
            .open_positions_for_symbol(&self.config.symbol)
            .map(|p| (p.id, p.quantity, p.side))
            .collect();
        for (id, quantity, side) in open {
            let order = TradeOrder::new(&self.config.symbol, side, quantity, signal_type);
            let trade = match self.simulator.execute(&order, price, timestamp) {
                Ok(trade) => trade,
                Err(err) => {
                    tracing::warn!(session = %self.config.session_id, %err, "close rejected");
                    continue;
                }
            };
            match self
                .ledger
                .close_position(id, trade.execution_price, timestamp)
            {
                Ok(closed) => {
                    let _ = self.ledger.debit_fee(trade.fee);
                    tracing::info!(
                        session = %self.config.session_id,
                        position = %id,
                        realized = closed.realized_pnl,
                        "position closed"
                    );
                    self.trades.push(trade);
                }
                Err(err) => {
                    tracing::warn!(session = %self.config.session_id, %err, "close failed");
                }
            }
        }
    }

    /// Close every open position at the last known price, if there is one.
    fn liquidate(&mut self) {
        if self.ledger.open_position_count() == 0 {
            return;
        }
        match self.last_price {
            Some(price) => {
                let timestamp = self.last_timestamp.unwrap_or_else(Utc::now);
                self.close_all(SignalType::Exit, price, timestamp);
            }
            None => {
                tracing::error!(
                    session = %self.config.session_id,
                    open = self.ledger.open_position_count(),
                    "stopping with open positions but no market price ever seen"
                );
            }
        }
    }

    fn metrics(&self) -> SessionMetrics {
        SessionMetrics {
            session_id: self.config.session_id.clone(),
            status: self.status,
            equity: self.ledger.calculate_equity(),
            available_capital: self.ledger.available_capital,
            total_realized_pnl: self.ledger.total_realized_pnl,
            total_unrealized_pnl: self.ledger.total_unrealized_pnl,
            total_fees: self.ledger.total_fees,
            open_positions: self.ledger.open_position_count(),
            trade_count: self.trades.len(),
            last_price: self.last_price,
            last_timestamp: self.last_timestamp,
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.config.session_id.clone(),
            strategy: self.config.strategy.clone(),
            symbol: self.config.symbol.clone(),
            status: self.status,
            ledger: self.ledger.clone(),
            trades: self.trades.clone(),
            last_price: self.last_price,
            last_timestamp: self.last_timestamp,
            saved_at: Utc::now(),
        }
    }

    /// Fire-and-forget persistence: the event loop never waits on the
    /// durable store, and failures are only logged.
    fn persist_async(&self, reason: &'static str) {
        let store = Arc::clone(&self.store);
        let snapshot = self.snapshot();
        let session_id = self.config.session_id.clone();
        tokio::spawn(async move {
            let result = if reason == "create" {
                store.create(&snapshot).await
            } else {
                store.update(&snapshot).await
            };
            if let Err(err) = result {
                tracing::warn!(session = %session_id, reason, %err, "snapshot persistence failed");
            }
        });
    }

    /// Final snapshot on stop. Awaited so the terminal state has its best
    /// chance of landing, but a failure still only logs.
    async fn persist_final(&self) {
        if let Err(err) = self.store.finalize(&self.snapshot()).await {
            tracing::warn!(
                session = %self.config.session_id,
                %err,
                "final snapshot persistence failed"
            );
        }
    }
}

/// Receive from the subscription when there is one; pend forever when
/// paused so the select loop only wakes for commands and snapshots.
async fn recv_or_pending(
    ticks: &mut Option<broadcast::Receiver<MarketTick>>,
) -> Result<MarketTick, RecvError> {
    match ticks {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
