//! Live monitor - wires the transport session to the state container

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use monitor_core::{Channel, FeedError, FeedEvent, FeedResult, LogCategory, MonitorConfig};

use crate::normalizer;
use crate::session::{SessionConfig, SessionListener, TransportSession};
use crate::state::{MonitorState, StateSnapshot};

/// Reflects transport lifecycle into the state
struct StateListener {
    state: Arc<MonitorState>,
}

impl SessionListener for StateListener {
    fn on_connecting(&self, attempt: u32) {
        self.state.connecting(attempt);
    }

    fn on_connected(&self, client_id: &str) {
        self.state.connected(client_id);
    }

    fn on_disconnected(&self, reason: &str) {
        self.state.disconnected(reason);
    }

    fn on_subscription_error(&self, channel: &str, message: &str) {
        self.state.append_log(
            format!("Subscription to {} failed: {}", channel, message),
            LogCategory::Error,
        );
    }
}

/// Normalize one publication and apply it. Returns true when the state
/// changed.
pub fn apply_publication(state: &MonitorState, channel: Channel, data: &Value) -> bool {
    match normalizer::normalize(channel, data) {
        Ok(Some(event)) => {
            if let FeedEvent::Signal(signal) = &event {
                if !signal.is_recognized() {
                    warn!(
                        "Unrecognized signal action {:?} for {}, logging as {}",
                        signal.raw_action, signal.symbol, signal.action
                    );
                }
            }
            state.apply(event)
        }
        Ok(None) => {
            debug!("Ignoring {} payload without usable data", channel);
            false
        }
        Err(e) => {
            warn!("Dropping {} payload: {}", channel, e);
            state.record_dropped(channel, &e)
        }
    }
}

/// Live feed monitor
pub struct LiveMonitor {
    config: MonitorConfig,
    state: Arc<MonitorState>,
    session: Option<TransportSession>,
}

impl LiveMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let state = Arc::new(MonitorState::new(config.log.capacity));
        Self {
            config,
            state,
            session: None,
        }
    }

    /// Get shared state reference
    pub fn state(&self) -> Arc<MonitorState> {
        Arc::clone(&self.state)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Revision receiver for re-rendering
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.state.subscribe()
    }

    /// Open the session and subscribe the three channels
    pub fn start(&mut self) -> FeedResult<()> {
        if self.session.is_some() {
            return Err(FeedError::AlreadyOpen);
        }
        if self.state.is_torn_down() {
            return Err(FeedError::Closed);
        }

        info!("Starting live monitor for {}", self.config.endpoint.url);

        let listener = Arc::new(StateListener {
            state: Arc::clone(&self.state),
        });
        let mut session = TransportSession::new(SessionConfig::from(&self.config), listener);

        for channel in Channel::ALL {
            let state = Arc::clone(&self.state);
            let name = self.config.channels.name(channel).to_string();
            session.subscribe(name, move |data: &Value| {
                apply_publication(&state, channel, data);
            })?;
        }

        session.open()?;
        self.session = Some(session);
        Ok(())
    }

    /// Close the session and tear the state down. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            info!("Stopping live monitor");
            session.close().await;
        }
        self.state.teardown();
    }

    pub fn is_running(&self) -> bool {
        self.session.as_ref().map_or(false, TransportSession::is_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::{ConnectionState, LogCategory};
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_buy_signal_logged() {
        let state = MonitorState::default();
        let applied = apply_publication(
            &state,
            Channel::Signals,
            &json!({"action": "buy", "reason": "rsi_oversold", "symbol": "BTCUSDT"}),
        );
        assert!(applied);

        let entry = state.logs().into_iter().next().unwrap();
        assert_eq!(entry.category(), LogCategory::Buy);
        assert!(entry.message().contains("BUY"));
        assert!(entry.message().contains("rsi_oversold"));
        assert!(entry.message().contains("BTCUSDT"));
    }

    #[test]
    fn test_alternate_casing_signal_is_sell() {
        let state = MonitorState::default();
        apply_publication(
            &state,
            Channel::Signals,
            &json!({"Action": "SELL", "Reason": "take_profit", "Symbol": "ETHUSDT"}),
        );

        let entry = state.logs().into_iter().next().unwrap();
        assert_eq!(entry.category(), LogCategory::Sell);
        assert!(entry.message().contains("take_profit"));
    }

    #[test]
    fn test_price_without_close_keeps_cache() {
        let state = MonitorState::default();
        apply_publication(&state, Channel::Kline, &json!({"close": "96012.5"}));
        let before = state.snapshot();

        assert!(!apply_publication(&state, Channel::Kline, &json!({"open": "1"})));

        let after = state.snapshot();
        assert_eq!(after.price, before.price);
        assert_eq!(after.revision, before.revision);
        assert!(after.logs.is_empty());
    }

    #[test]
    fn test_wallet_snapshot_replaces() {
        let state = MonitorState::default();
        apply_publication(&state, Channel::Wallet, &json!({"usdt": "123.456", "btc": "0.00123"}));
        assert_eq!(state.wallet().usdt, Decimal::from_str("123.456").unwrap());
        assert!(state.logs()[0].message().contains("123.46"));
        assert!(state.logs()[0].message().contains("0.00123"));

        apply_publication(&state, Channel::Wallet, &json!({"usdt": "0", "btc": "0.5"}));
        let wallet = state.wallet();
        assert_eq!(wallet.usdt, Decimal::ZERO);
        assert_eq!(wallet.btc, Decimal::from_str("0.5").unwrap());
    }

    #[test]
    fn test_malformed_wallet_dropped_with_warning() {
        let state = MonitorState::default();
        apply_publication(&state, Channel::Wallet, &json!({"usdt": "10", "btc": "1"}));
        let before = state.wallet();

        assert!(apply_publication(&state, Channel::Wallet, &json!({"usdt": "oops"})));

        assert_eq!(state.wallet(), before);
        let entry = state.logs().into_iter().next().unwrap();
        assert_eq!(entry.category(), LogCategory::Warning);
        assert_eq!(state.stats().dropped_payloads, 1);
    }

    #[test]
    fn test_listener_reflects_disconnect() {
        let state = Arc::new(MonitorState::default());
        let listener = StateListener {
            state: Arc::clone(&state),
        };

        listener.on_connected("client-1");
        listener.on_disconnected("ping timeout");

        assert_eq!(
            state.connection(),
            ConnectionState::Disconnected {
                reason: "ping timeout".to_string()
            }
        );
        let entry = state.logs().into_iter().next().unwrap();
        assert_eq!(entry.category(), LogCategory::Error);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let mut monitor = LiveMonitor::new(MonitorConfig::default());
        monitor.stop().await;
        monitor.stop().await;

        assert!(!monitor.is_running());
        assert!(monitor.state().is_torn_down());
        assert!(matches!(monitor.start(), Err(FeedError::Closed)));
    }
}
