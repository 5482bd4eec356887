//! Core types and utilities for the trading monitor
//!
//! This crate provides shared types used across all components:
//! - Connection state and normalized feed events
//! - The bounded activity log
//! - Configuration and error types

pub mod types;
pub mod log;
pub mod config;
pub mod errors;

pub use crate::types::*;
pub use crate::log::*;
pub use crate::config::*;
pub use crate::errors::*;
