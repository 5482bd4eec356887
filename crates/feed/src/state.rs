//! Monitor state container
//!
//! All writes go through one lock so the log, the price cache and the
//! wallet cache never see unguarded concurrent mutation. Readers take
//! cloned snapshots. Once torn down, every update is discarded.

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use monitor_core::{
    format_decimal, Channel, ConnectionState, FeedEvent, LogBuffer, LogCategory, LogEntry,
    NormalizeError, PriceTick, SignalAction, TradeSignal, WalletSnapshot,
};

/// Running counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub price_updates: u64,
    pub wallet_updates: u64,
    pub signals: u64,
    pub dropped_payloads: u64,
    pub reconnects: u64,
}

/// Read-only copy of the state handed to renderers
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub connection: ConnectionState,
    pub price: Option<PriceTick>,
    pub wallet: WalletSnapshot,
    /// Newest first
    pub logs: Vec<LogEntry>,
    pub stats: MonitorStats,
    pub revision: u64,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Connecting,
            price: None,
            wallet: WalletSnapshot::default(),
            logs: Vec::new(),
            stats: MonitorStats::default(),
            revision: 0,
        }
    }
}

#[derive(Debug)]
struct Inner {
    connection: ConnectionState,
    price: Option<PriceTick>,
    wallet: WalletSnapshot,
    logs: LogBuffer,
    stats: MonitorStats,
    torn_down: bool,
}

/// Shared monitor state
#[derive(Debug)]
pub struct MonitorState {
    inner: RwLock<Inner>,
    revision: watch::Sender<u64>,
}

impl MonitorState {
    pub fn new(log_capacity: usize) -> Self {
        let (revision, _) = watch::channel(0);

        Self {
            inner: RwLock::new(Inner {
                connection: ConnectionState::Connecting,
                price: None,
                wallet: WalletSnapshot::default(),
                logs: LogBuffer::with_capacity(log_capacity),
                stats: MonitorStats::default(),
                torn_down: false,
            }),
            revision,
        }
    }

    /// Receiver bumped after every applied update
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Option<R> {
        let mut inner = self.inner.write();
        if inner.torn_down {
            debug!("State torn down, discarding update");
            return None;
        }
        let result = f(&mut inner);
        drop(inner);

        self.revision.send_modify(|revision| *revision += 1);
        Some(result)
    }

    pub fn set_connection(&self, connection: ConnectionState) -> bool {
        self.mutate(|inner| inner.connection = connection).is_some()
    }

    pub fn set_price(&self, tick: PriceTick) -> bool {
        self.mutate(|inner| {
            inner.price = Some(tick);
            inner.stats.price_updates += 1;
        })
        .is_some()
    }

    /// Replace the wallet snapshot wholesale
    pub fn set_wallet(&self, wallet: WalletSnapshot) -> bool {
        self.mutate(|inner| {
            inner.wallet = wallet;
            inner.stats.wallet_updates += 1;
        })
        .is_some()
    }

    /// Append a log entry, returning its id
    pub fn append_log(&self, message: impl Into<String>, category: LogCategory) -> Option<u64> {
        let message = message.into();
        self.mutate(|inner| inner.logs.record(message, category).id())
    }

    pub fn connecting(&self, attempt: u32) -> bool {
        self.mutate(|inner| {
            inner.connection = ConnectionState::Connecting;
            if attempt > 0 {
                inner.stats.reconnects += 1;
                inner
                    .logs
                    .record(format!("Reconnecting (attempt {})", attempt), LogCategory::Info);
            }
        })
        .is_some()
    }

    pub fn connected(&self, client_id: &str) -> bool {
        self.mutate(|inner| {
            inner.connection = ConnectionState::Connected {
                client_id: client_id.to_string(),
            };
            inner.logs.record(
                format!("Connected to server (client id {})", client_id),
                LogCategory::Success,
            );
        })
        .is_some()
    }

    pub fn disconnected(&self, reason: &str) -> bool {
        self.mutate(|inner| {
            inner.connection = ConnectionState::Disconnected {
                reason: reason.to_string(),
            };
            inner
                .logs
                .record(format!("Connection lost: {}", reason), LogCategory::Error);
        })
        .is_some()
    }

    pub fn record_signal(&self, signal: &TradeSignal) -> bool {
        let category = match signal.action {
            SignalAction::Buy => LogCategory::Buy,
            SignalAction::Sell => LogCategory::Sell,
        };
        let message = format!(
            "SIGNAL: {} - {} ({})",
            signal.raw_action.trim().to_uppercase(),
            signal.reason,
            signal.symbol
        );

        self.mutate(|inner| {
            inner.stats.signals += 1;
            inner.logs.record(message, category);
        })
        .is_some()
    }

    pub fn record_dropped(&self, channel: Channel, error: &NormalizeError) -> bool {
        self.mutate(|inner| {
            inner.stats.dropped_payloads += 1;
            inner.logs.record(
                format!("Dropped malformed {} payload: {}", channel, error),
                LogCategory::Warning,
            );
        })
        .is_some()
    }

    /// Apply a normalized event, logging it where the event is user-visible
    pub fn apply(&self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::Price(tick) => self.set_price(tick),
            FeedEvent::Wallet(wallet) => self
                .mutate(|inner| {
                    inner.wallet = wallet;
                    inner.stats.wallet_updates += 1;
                    inner.logs.record(
                        format!(
                            "Wallet updated: {} USDT / {} BTC",
                            format_decimal(wallet.usdt, 2),
                            format_decimal(wallet.btc, 5)
                        ),
                        LogCategory::Success,
                    );
                })
                .is_some(),
            FeedEvent::Signal(signal) => self.record_signal(&signal),
        }
    }

    /// Stop accepting updates
    pub fn teardown(&self) {
        let mut inner = self.inner.write();
        if !inner.torn_down {
            inner.torn_down = true;
            debug!("Monitor state torn down");
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.read().torn_down
    }

    pub fn connection(&self) -> ConnectionState {
        self.inner.read().connection.clone()
    }

    pub fn price(&self) -> Option<PriceTick> {
        self.inner.read().price.clone()
    }

    pub fn wallet(&self) -> WalletSnapshot {
        self.inner.read().wallet
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.inner.read().logs.to_vec()
    }

    pub fn stats(&self) -> MonitorStats {
        self.inner.read().stats
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.read();
        StateSnapshot {
            connection: inner.connection.clone(),
            price: inner.price.clone(),
            wallet: inner.wallet,
            logs: inner.logs.to_vec(),
            stats: inner.stats,
            revision: *self.revision.borrow(),
        }
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new(monitor_core::DEFAULT_LOG_CAPACITY)
    }
}
