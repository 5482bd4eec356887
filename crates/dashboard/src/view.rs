//! View projection - state snapshot to render-ready strings
//!
//! Pure and cheap enough to run on every state revision.

use monitor_core::{format_decimal, ConnectionState, LogCategory, LogEntry};
use monitor_feed::StateSnapshot;

pub const TITLE: &str = "V2 TRADING BOT";
pub const PRICE_PLACEHOLDER: &str = "---";
pub const WAITING_HINT: &str = "Waiting for data... (connected, listening for signals)";

/// Display colour, independent of the terminal library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Green,
    Red,
    Yellow,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStyle {
    pub tone: Tone,
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub text: String,
    pub connected: bool,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLineView {
    pub id: u64,
    pub time: String,
    pub prefix: &'static str,
    pub message: String,
    pub style: LineStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub title: &'static str,
    pub status: StatusView,
    pub price: String,
    pub usdt: String,
    pub btc: String,
    pub logs: Vec<LogLineView>,
    pub empty_hint: Option<&'static str>,
    pub footer: String,
}

pub fn status_view(connection: &ConnectionState) -> StatusView {
    let tone = match connection {
        ConnectionState::Connected { .. } => Tone::Green,
        ConnectionState::Connecting => Tone::Yellow,
        ConnectionState::Disconnected { .. } => Tone::Red,
    };

    StatusView {
        text: connection.status_text(),
        connected: connection.is_connected(),
        tone,
    }
}

pub fn style_for(category: LogCategory) -> LineStyle {
    match category {
        LogCategory::Success => LineStyle { tone: Tone::Green, bold: false },
        LogCategory::Error => LineStyle { tone: Tone::Red, bold: false },
        LogCategory::Warning => LineStyle { tone: Tone::Yellow, bold: true },
        LogCategory::Buy => LineStyle { tone: Tone::Green, bold: true },
        LogCategory::Sell => LineStyle { tone: Tone::Red, bold: true },
        LogCategory::Info => LineStyle { tone: Tone::Gray, bold: false },
    }
}

pub fn log_line(entry: &LogEntry) -> LogLineView {
    let category = entry.category();
    let (prefix, message) = if category.is_trade() {
        ("⚡ ", entry.message().to_uppercase())
    } else {
        ("> ", entry.message().to_string())
    };

    LogLineView {
        id: entry.id(),
        time: entry.timestamp().format("%H:%M:%S").to_string(),
        prefix,
        message,
        style: style_for(category),
    }
}

/// Project a snapshot into the dashboard view
pub fn project(snapshot: &StateSnapshot) -> DashboardView {
    let logs: Vec<LogLineView> = snapshot.logs.iter().map(log_line).collect();
    let empty_hint = logs.is_empty().then_some(WAITING_HINT);

    let stats = &snapshot.stats;
    let footer = format!(
        "prices {} | signals {} | wallet {} | dropped {} | reconnects {}",
        stats.price_updates,
        stats.signals,
        stats.wallet_updates,
        stats.dropped_payloads,
        stats.reconnects
    );

    DashboardView {
        title: TITLE,
        status: status_view(&snapshot.connection),
        price: snapshot
            .price
            .as_ref()
            .map(|tick| format_decimal(tick.close, 2))
            .unwrap_or_else(|| PRICE_PLACEHOLDER.to_string()),
        usdt: format_decimal(snapshot.wallet.usdt, 2),
        btc: format_decimal(snapshot.wallet.btc, 5),
        logs,
        empty_hint,
        footer,
    }
}
