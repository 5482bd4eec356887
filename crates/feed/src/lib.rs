//! Live feed for the trading monitor
//!
//! Features:
//! - Centrifuge JSON protocol over a single WebSocket connection
//! - Per-channel publication handlers, in-order within a channel
//! - Reconnect with exponential backoff and ping timeout detection
//! - Case-tolerant payload normalization
//! - Lock-guarded state with a bounded activity log

pub mod monitor;
pub mod normalizer;
pub mod protocol;
pub mod session;
pub mod state;

pub use monitor::LiveMonitor;
pub use session::{SessionConfig, SessionListener, TransportSession};
pub use state::{MonitorState, MonitorStats, StateSnapshot};
