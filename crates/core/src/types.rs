//! Core type definitions

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection lifecycle as reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected { client_id: String },
    Disconnected { reason: String },
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected { .. } => "connected",
            ConnectionState::Disconnected { .. } => "disconnected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }

    /// Human-readable status line
    pub fn status_text(&self) -> String {
        match self {
            ConnectionState::Connecting => "CONNECTING...".to_string(),
            ConnectionState::Connected { client_id } => {
                format!("CONNECTED (client id: {})", client_id)
            }
            ConnectionState::Disconnected { reason } => format!("DISCONNECTED: {}", reason),
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Connecting
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_text())
    }
}

/// Latest candle close published on the price channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub close: Decimal,
    pub symbol: Option<String>,
    pub interval: Option<String>,
    pub event_time: Option<DateTime<Utc>>,
}

impl PriceTick {
    pub fn new(close: Decimal) -> Self {
        Self {
            close,
            symbol: None,
            interval: None,
            event_time: None,
        }
    }
}

/// Full wallet snapshot; always replaces the previous one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub usdt: Decimal,
    pub btc: Decimal,
}

impl WalletSnapshot {
    pub fn new(usdt: Decimal, btc: Decimal) -> Self {
        Self { usdt, btc }
    }
}

/// Round half away from zero and render with exactly `dp` decimals
pub fn format_decimal(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", dp as usize, rounded)
}

/// Direction of a trade signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
}

impl SignalAction {
    /// Classify a raw action string. Anything that is not `buy` (any case)
    /// is classified as a sell.
    pub fn classify(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("buy") {
            SignalAction::Buy
        } else {
            SignalAction::Sell
        }
    }

    /// True when `raw` spells one of the known actions
    pub fn is_known(raw: &str) -> bool {
        let raw = raw.trim();
        raw.eq_ignore_ascii_case("buy") || raw.eq_ignore_ascii_case("sell")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
        }
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trade signal emitted by the strategy engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub action: SignalAction,
    /// Action exactly as the producer sent it
    pub raw_action: String,
    pub reason: String,
    pub symbol: String,
    pub price: Option<Decimal>,
}

impl TradeSignal {
    pub fn new(raw_action: impl Into<String>, reason: impl Into<String>, symbol: impl Into<String>) -> Self {
        let raw_action = raw_action.into();
        Self {
            action: SignalAction::classify(&raw_action),
            raw_action,
            reason: reason.into(),
            symbol: symbol.into(),
            price: None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        SignalAction::is_known(&self.raw_action)
    }
}

/// Channels the monitor listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Kline,
    Signals,
    Wallet,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Kline, Channel::Signals, Channel::Wallet];

    pub fn default_name(&self) -> &'static str {
        match self {
            Channel::Kline => "kline",
            Channel::Signals => "signals",
            Channel::Wallet => "wallet",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.default_name())
    }
}

/// A normalized publication
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Price(PriceTick),
    Wallet(WalletSnapshot),
    Signal(TradeSignal),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_classification() {
        assert_eq!(SignalAction::classify("BUY"), SignalAction::Buy);
        assert_eq!(SignalAction::classify("buy"), SignalAction::Buy);
        assert_eq!(SignalAction::classify("Buy"), SignalAction::Buy);
        assert_eq!(SignalAction::classify("SELL"), SignalAction::Sell);
        assert_eq!(SignalAction::classify("sell"), SignalAction::Sell);

        // Unrecognized actions fall through to sell
        assert_eq!(SignalAction::classify("HOLD"), SignalAction::Sell);
        assert_eq!(SignalAction::classify(""), SignalAction::Sell);
    }

    #[test]
    fn test_signal_recognition() {
        assert!(TradeSignal::new("sell", "take_profit", "ETHUSDT").is_recognized());
        assert!(!TradeSignal::new("HOLD", "flat", "BTCUSDT").is_recognized());
    }

    #[test]
    fn test_format_decimal() {
        use std::str::FromStr;

        let usdt = Decimal::from_str("123.456").unwrap();
        assert_eq!(format_decimal(usdt, 2), "123.46");

        let btc = Decimal::from_str("0.00123").unwrap();
        assert_eq!(format_decimal(btc, 5), "0.00123");
        assert_eq!(format_decimal(Decimal::ZERO, 2), "0.00");
    }

    #[test]
    fn test_status_text() {
        let state = ConnectionState::Disconnected {
            reason: "ping timeout".to_string(),
        };
        assert!(state.status_text().contains("ping timeout"));
        assert!(!state.is_connected());

        let state = ConnectionState::Connected {
            client_id: "abc".to_string(),
        };
        assert!(state.status_text().contains("abc"));
        assert!(state.is_connected());
    }
}
