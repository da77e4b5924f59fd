//! Order and trade types.
//!
//! Orders are value records: the book owns the resting copy, the engine
//! returns post-matching snapshots to the caller. Order ids come from a
//! process-wide atomic counter so uniqueness holds without any lock.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::OrderId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("user id cannot be empty")]
    InvalidUserId,
    #[error("side must be 'bid' or 'ask'")]
    InvalidSide,
    #[error("type must be 'limit' or 'market'")]
    InvalidOrderType,
    #[error("price must be greater than 0")]
    InvalidPrice,
    #[error("amount must be greater than 0")]
    InvalidAmount,
}

/// Order side. `Bid` buys the base asset, `Ask` sells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bid" => Ok(Side::Bid),
            "ask" => Ok(Side::Ask),
            _ => Err(OrderError::InvalidSide),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Market => "market",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "limit" => Ok(OrderType::Limit),
            "market" => Ok(OrderType::Market),
            _ => Err(OrderError::InvalidOrderType),
        }
    }
}

/// Order lifecycle state.
///
/// Legal transitions:
/// open -> partially_filled -> filled; open -> filled; open -> cancelled;
/// partially_filled -> cancelled. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Open => "open",
            OrderState::PartiallyFilled => "partially_filled",
            OrderState::Filled => "filled",
            OrderState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static ORDER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Allocates the next order id. Monotonic and unique process-wide;
/// market orders consume ids even though they never rest.
fn next_order_id() -> OrderId {
    ORDER_ID_COUNTER.fetch_add(1, Ordering::Relaxed) + 1
}

/// A single order. `price` is 0 for market orders; `amount` is immutable
/// after construction and `filled_amount` only ever grows toward it.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user_id: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: f64,
    pub amount: f64,
    pub filled_amount: f64,
    pub state: OrderState,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    /// Creates a limit order in the `Open` state.
    pub fn limit(user_id: &str, side: Side, price: f64, amount: f64) -> Result<Self, OrderError> {
        if user_id.is_empty() {
            return Err(OrderError::InvalidUserId);
        }
        if price <= 0.0 {
            return Err(OrderError::InvalidPrice);
        }
        if amount <= 0.0 {
            return Err(OrderError::InvalidAmount);
        }

        Ok(Self {
            id: next_order_id(),
            user_id: user_id.to_string(),
            side,
            order_type: OrderType::Limit,
            price,
            amount,
            filled_amount: 0.0,
            state: OrderState::Open,
            timestamp: Utc::now(),
        })
    }

    /// Creates a market order in the `Open` state. Market orders carry no
    /// price bound and are never inserted into the book.
    pub fn market(user_id: &str, side: Side, amount: f64) -> Result<Self, OrderError> {
        if user_id.is_empty() {
            return Err(OrderError::InvalidUserId);
        }
        if amount <= 0.0 {
            return Err(OrderError::InvalidAmount);
        }

        Ok(Self {
            id: next_order_id(),
            user_id: user_id.to_string(),
            side,
            order_type: OrderType::Market,
            price: 0.0,
            amount,
            filled_amount: 0.0,
            state: OrderState::Open,
            timestamp: Utc::now(),
        })
    }

    #[inline]
    pub fn remaining(&self) -> f64 {
        self.amount - self.filled_amount
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.filled_amount >= self.amount
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order_type {
            OrderType::Market => write!(
                f,
                "[#{} {} {} MARKET {:.8} filled:{:.8} {}]",
                self.id, self.user_id, self.side, self.amount, self.filled_amount, self.state
            ),
            OrderType::Limit => write!(
                f,
                "[#{} {} {} LIMIT {:.8}@{:.2} filled:{:.8} {}]",
                self.id,
                self.user_id,
                self.side,
                self.amount,
                self.price,
                self.filled_amount,
                self.state
            ),
        }
    }
}

/// A trade produced by the matching routine. `price` is the resting
/// order's price, never the aggressor's.
#[derive(Debug, Clone)]
pub struct Trade {
    pub bid_order_id: OrderId,
    pub ask_order_id: OrderId,
    pub bid_user_id: String,
    pub ask_user_id: String,
    pub price: f64,
    pub size: f64,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Trade: {:.8} @ {:.2} | buyer:{} seller:{}]",
            self.size, self.price, self.bid_user_id, self.ask_user_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_order_valid() {
        let order = Order::limit("1", Side::Bid, 50_000.0, 1.0).unwrap();
        assert!(order.id > 0);
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.state, OrderState::Open);
        assert_eq!(order.filled_amount, 0.0);
        assert_eq!(order.remaining(), 1.0);
        assert!(!order.is_filled());
    }

    #[test]
    fn test_limit_order_rejects_bad_inputs() {
        assert_eq!(
            Order::limit("", Side::Bid, 50_000.0, 1.0).unwrap_err(),
            OrderError::InvalidUserId
        );
        assert_eq!(
            Order::limit("1", Side::Bid, 0.0, 1.0).unwrap_err(),
            OrderError::InvalidPrice
        );
        assert_eq!(
            Order::limit("1", Side::Bid, -1.0, 1.0).unwrap_err(),
            OrderError::InvalidPrice
        );
        assert_eq!(
            Order::limit("1", Side::Bid, 50_000.0, 0.0).unwrap_err(),
            OrderError::InvalidAmount
        );
    }

    #[test]
    fn test_market_order_valid() {
        let order = Order::market("1", Side::Ask, 0.5).unwrap();
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.price, 0.0);
        assert_eq!(order.state, OrderState::Open);
    }

    #[test]
    fn test_market_order_rejects_bad_inputs() {
        assert_eq!(
            Order::market("", Side::Bid, 1.0).unwrap_err(),
            OrderError::InvalidUserId
        );
        assert_eq!(
            Order::market("1", Side::Bid, -0.1).unwrap_err(),
            OrderError::InvalidAmount
        );
    }

    #[test]
    fn test_order_ids_are_unique_and_increasing() {
        let a = Order::limit("1", Side::Bid, 1.0, 1.0).unwrap();
        let b = Order::market("1", Side::Ask, 1.0).unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn test_side_parse() {
        assert_eq!("bid".parse::<Side>().unwrap(), Side::Bid);
        assert_eq!("ASK".parse::<Side>().unwrap(), Side::Ask);
        assert_eq!("buy".parse::<Side>().unwrap_err(), OrderError::InvalidSide);
    }

    #[test]
    fn test_order_type_parse() {
        assert_eq!("limit".parse::<OrderType>().unwrap(), OrderType::Limit);
        assert_eq!("Market".parse::<OrderType>().unwrap(), OrderType::Market);
        assert_eq!(
            "stop".parse::<OrderType>().unwrap_err(),
            OrderError::InvalidOrderType
        );
    }
}
