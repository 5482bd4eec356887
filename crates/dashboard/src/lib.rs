//! Terminal dashboard for the trading bot live feed
//!
//! Renders connection status, latest price, wallet balances and the
//! activity log from read-only state snapshots.

pub mod tui;
pub mod view;

pub use tui::Tui;
pub use view::{project, DashboardView};
