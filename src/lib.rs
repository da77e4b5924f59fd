//! matchbook - in-memory central limit order book with a matching engine
//! for spot trading.
//!
//! # Modules
//!
//! - [`core_types`] - Core type aliases (OrderId, PriceTicks)
//! - [`config`] - Application and market-policy configuration
//! - [`tick`] - Tick grid arithmetic
//! - [`models`] - Order and trade types
//! - [`balance`] - Enforced per-asset balance slot pair
//! - [`accounts`] - Per-(user, asset) balance ledger
//! - [`orderbook`] - Price-time priority book, one per trading pair
//! - [`engine`] - Matching engine: placement, matching, cancel, settlement
//! - [`gateway`] - HTTP/JSON surface
//! - [`logging`] - Tracing setup

// Core types - must be first!
pub mod core_types;

// Configuration
pub mod config;

// Trading components
pub mod accounts;
pub mod balance;
pub mod engine;
pub mod models;
pub mod orderbook;
pub mod tick;

// Service surface
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use accounts::AccountManager;
pub use balance::Balance;
pub use config::{AppConfig, MarketConfig};
pub use core_types::{OrderId, PriceTicks};
pub use engine::{Engine, EngineError, OrderbookSnapshot, Pair};
pub use models::{Order, OrderState, OrderType, Side, Trade};
pub use orderbook::OrderBook;
