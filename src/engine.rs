//! Matching engine: one order book per pair plus the account ledger.
//!
//! Every mutating operation runs under a single writer-exclusive section
//! covering both the book and the ledger, so settlement always observes
//! the book state that produced its trades and the refund arithmetic sees
//! the final fill. Read operations share the lock with each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rustc_hash::FxHashMap;
use serde::Serialize;
use thiserror::Error;

use crate::accounts::{AccountError, AccountManager};
use crate::balance::Balance;
use crate::config::MarketConfig;
use crate::core_types::OrderId;
use crate::models::{Order, OrderError, Side, Trade};
use crate::orderbook::{LevelSnapshot, OrderBook};
use crate::tick;

/// Refunds below this many quote units stay locked rather than risk dust
/// unlocks from float arithmetic.
pub const MIN_REFUND: f64 = 0.01;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid pair")]
    InvalidPair,
    #[error("price not aligned to tick")]
    InvalidPriceTick,
    #[error("amount not aligned to tick")]
    InvalidAmountTick,
    #[error("order not found")]
    OrderNotFound,
    #[error("unauthorized: order belongs to another user")]
    Unauthorized,
    #[error("insufficient liquidity to fill market order")]
    InsufficientLiquidity,
    #[error("transfer failed: {0}")]
    TransferFailed(String),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Order(#[from] OrderError),
}

/// An ordered (base, quote) of uppercase asset codes, e.g. BTC/BRL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub base: String,
    pub quote: String,
}

impl Pair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
        }
    }

    /// Parses a "BASE/QUOTE" string. Structural check only; whether the
    /// quote asset is tradeable is the engine's policy.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        let (base, quote) = s.split_once('/').ok_or(EngineError::InvalidPair)?;
        if base.is_empty() || quote.is_empty() {
            return Err(EngineError::InvalidPair);
        }
        Ok(Self::new(base, quote))
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Reporting shape for one book: levels best-first on both sides.
#[derive(Debug, Clone, Serialize)]
pub struct OrderbookSnapshot {
    pub pair: String,
    pub bids: Vec<LevelSnapshot>,
    pub asks: Vec<LevelSnapshot>,
    pub spread: f64,
    pub bid_total_volume: f64,
    pub ask_total_volume: f64,
}

struct EngineInner {
    books: FxHashMap<String, OrderBook>,
    accounts: AccountManager,
}

pub struct Engine {
    market: MarketConfig,
    inner: RwLock<EngineInner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(MarketConfig::default())
    }
}

impl Engine {
    pub fn new(market: MarketConfig) -> Self {
        Self {
            market,
            inner: RwLock::new(EngineInner {
                books: FxHashMap::default(),
                accounts: AccountManager::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_valid_pair(&self, pair: &Pair) -> bool {
        !pair.base.is_empty()
            && !pair.quote.is_empty()
            && self.market.quote_assets.iter().any(|q| q == &pair.quote)
    }

    /// Places a limit order: normalize to the tick grid, lock the worst
    /// case of the order, match, settle every trade, refund any price
    /// improvement on bids. Returns the post-matching order and trades.
    pub fn place_limit(
        &self,
        user_id: &str,
        pair: &Pair,
        side: Side,
        price: f64,
        amount: f64,
    ) -> Result<(Order, Vec<Trade>), EngineError> {
        if !self.is_valid_pair(pair) {
            return Err(EngineError::InvalidPair);
        }

        let norm_price = tick::floor_to_tick(price, self.market.price_tick);
        if !tick::is_valid_tick(price, self.market.price_tick) {
            return Err(EngineError::InvalidPriceTick);
        }
        let norm_amount = tick::floor_to_tick(amount, self.market.amount_tick);
        if !tick::is_valid_tick(amount, self.market.amount_tick) {
            return Err(EngineError::InvalidAmountTick);
        }

        let mut order = Order::limit(user_id, side, norm_price, norm_amount)?;

        let (lock_asset, lock_amount) = match side {
            Side::Bid => (pair.quote.as_str(), norm_price * norm_amount),
            Side::Ask => (pair.base.as_str(), norm_amount),
        };

        let mut guard = self.write();
        let inner = &mut *guard;

        inner.accounts.lock(user_id, lock_asset, lock_amount)?;

        let book = inner
            .books
            .entry(pair.to_string())
            .or_insert_with(|| OrderBook::new(self.market.price_tick));
        let trades = book.place_limit(&mut order);

        let executed =
            Self::settle(&mut inner.accounts, pair, &trades, side, user_id, lock_asset, lock_amount)?;

        // Price-improvement refund, bids only: trades executed at prices
        // at or below the limit, so part of the quote lock is now surplus.
        // The ask lock is denominated in base and never over-reserves.
        if side == Side::Bid {
            let still_locked = norm_price * order.remaining();
            let refund = lock_amount - executed - still_locked;
            if refund >= MIN_REFUND {
                if let Err(err) = inner.accounts.unlock(user_id, &pair.quote, refund) {
                    tracing::error!(
                        user_id,
                        order_id = order.id,
                        refund,
                        %err,
                        "price-improvement refund failed, ledger inconsistent"
                    );
                    return Err(EngineError::TransferFailed(err.to_string()));
                }
            }
        }

        tracing::debug!(
            user_id,
            order_id = order.id,
            %pair,
            side = %side,
            price = norm_price,
            amount = norm_amount,
            trades = trades.len(),
            state = %order.state,
            "limit order placed"
        );

        Ok((order, trades))
    }

    /// Places a market order. Executable liquidity (the user's own resting
    /// orders excluded) is verified and the worst-case cost locked before
    /// the book is touched; any unspent part of the lock is released after
    /// settlement.
    pub fn place_market(
        &self,
        user_id: &str,
        pair: &Pair,
        side: Side,
        amount: f64,
    ) -> Result<(Order, Vec<Trade>), EngineError> {
        if !self.is_valid_pair(pair) {
            return Err(EngineError::InvalidPair);
        }

        let norm_amount = tick::floor_to_tick(amount, self.market.amount_tick);
        if !tick::is_valid_tick(amount, self.market.amount_tick) {
            return Err(EngineError::InvalidAmountTick);
        }

        let mut order = Order::market(user_id, side, norm_amount)?;
        let key = pair.to_string();

        let mut guard = self.write();
        let inner = &mut *guard;

        let Some(book) = inner.books.get_mut(&key) else {
            return Err(EngineError::InsufficientLiquidity);
        };

        let (lock_asset, lock_amount) = match side {
            Side::Bid => {
                let cost = book
                    .estimate_market_buy_cost(user_id, norm_amount)
                    .ok_or(EngineError::InsufficientLiquidity)?;
                (pair.quote.as_str(), cost)
            }
            Side::Ask => {
                if book.executable_bid_volume(user_id) < norm_amount {
                    return Err(EngineError::InsufficientLiquidity);
                }
                (pair.base.as_str(), norm_amount)
            }
        };

        inner.accounts.lock(user_id, lock_asset, lock_amount)?;

        let trades = book.place_market(&mut order);

        let executed =
            Self::settle(&mut inner.accounts, pair, &trades, side, user_id, lock_asset, lock_amount)?;

        // The pre-lock was sized against the same liquidity the fill just
        // consumed, so this is normally zero; it protects the caller from
        // stranded funds if the order came back short.
        let unspent = lock_amount - executed;
        if unspent > 0.0 {
            if let Err(err) = inner.accounts.unlock(user_id, lock_asset, unspent) {
                tracing::error!(
                    user_id,
                    order_id = order.id,
                    unspent,
                    %err,
                    "failed to release unspent market-order lock"
                );
                return Err(EngineError::TransferFailed(err.to_string()));
            }
        }

        tracing::debug!(
            user_id,
            order_id = order.id,
            %pair,
            side = %side,
            amount = norm_amount,
            trades = trades.len(),
            state = %order.state,
            "market order placed"
        );

        Ok((order, trades))
    }

    /// Cancels a resting order owned by `user_id` and releases the lock
    /// still backing its unfilled remainder.
    pub fn cancel(&self, user_id: &str, pair: &Pair, order_id: OrderId) -> Result<Order, EngineError> {
        if !self.is_valid_pair(pair) {
            return Err(EngineError::InvalidPair);
        }

        let mut guard = self.write();
        let inner = &mut *guard;

        let Some(book) = inner.books.get_mut(&pair.to_string()) else {
            return Err(EngineError::OrderNotFound);
        };
        let order = book.get_order(order_id).ok_or(EngineError::OrderNotFound)?;
        if order.user_id != user_id {
            return Err(EngineError::Unauthorized);
        }

        let cancelled = book
            .cancel(order_id)
            .map_err(|_| EngineError::OrderNotFound)?;

        let (unlock_asset, unlock_amount) = match cancelled.side {
            Side::Bid => (pair.quote.as_str(), cancelled.remaining() * cancelled.price),
            Side::Ask => (pair.base.as_str(), cancelled.remaining()),
        };
        if unlock_amount > 0.0 {
            // The order is already out of the book; a failed unlock is a
            // ledger bug to surface, not a reason to resurrect the order.
            if let Err(err) = inner.accounts.unlock(user_id, unlock_asset, unlock_amount) {
                tracing::error!(
                    user_id,
                    order_id,
                    unlock_amount,
                    %err,
                    "failed to unlock balance after cancel"
                );
            }
        }

        tracing::debug!(user_id, order_id, %pair, "order cancelled");

        Ok(cancelled)
    }

    /// Snapshot of the book for a pair, or `None` if no order has ever
    /// touched it.
    pub fn get_orderbook(&self, pair: &Pair) -> Option<OrderbookSnapshot> {
        let guard = self.read();
        let book = guard.books.get(&pair.to_string())?;
        Some(OrderbookSnapshot {
            pair: pair.to_string(),
            bids: book.bids(),
            asks: book.asks(),
            spread: book.spread(),
            bid_total_volume: book.bid_total_volume(),
            ask_total_volume: book.ask_total_volume(),
        })
    }

    // Ledger passthrough for operator provisioning.

    pub fn credit(&self, user_id: &str, asset: &str, amount: f64) -> Result<(), AccountError> {
        self.write().accounts.credit(user_id, asset, amount)
    }

    pub fn debit(&self, user_id: &str, asset: &str, amount: f64) -> Result<(), AccountError> {
        self.write().accounts.debit(user_id, asset, amount)
    }

    pub fn get_balance(&self, user_id: &str, asset: &str) -> Balance {
        self.read().accounts.get_balance(user_id, asset)
    }

    pub fn get_all_balances(&self, user_id: &str) -> HashMap<String, Balance> {
        self.read().accounts.get_all_balances(user_id)
    }

    /// Settles every trade in order: the seller's locked base moves out
    /// and quote comes back available; the buyer's locked quote moves out
    /// and base comes back available.
    ///
    /// Returns how much of the aggressor's lock the trades consumed. A
    /// primitive failing mid-stream is a lock-accounting bug: the book is
    /// left as matched, the remaining initial lock is released best-effort
    /// and the inconsistency is surfaced as `TransferFailed`.
    fn settle(
        accounts: &mut AccountManager,
        pair: &Pair,
        trades: &[Trade],
        aggressor_side: Side,
        aggressor: &str,
        lock_asset: &str,
        lock_amount: f64,
    ) -> Result<f64, EngineError> {
        let mut spent = 0.0;

        for trade in trades {
            if let Err(err) = settle_trade(accounts, pair, trade) {
                tracing::error!(
                    %pair,
                    bid_order_id = trade.bid_order_id,
                    ask_order_id = trade.ask_order_id,
                    size = trade.size,
                    price = trade.price,
                    %err,
                    "trade settlement failed, ledger inconsistent"
                );
                let unspent = (lock_amount - spent).max(0.0);
                if unspent > 0.0 {
                    if let Err(unlock_err) = accounts.unlock(aggressor, lock_asset, unspent) {
                        tracing::error!(user_id = aggressor, %unlock_err, "mitigation unlock failed");
                    }
                }
                return Err(EngineError::TransferFailed(err.to_string()));
            }
            spent += match aggressor_side {
                Side::Bid => trade.size * trade.price,
                Side::Ask => trade.size,
            };
        }

        Ok(spent)
    }
}

fn settle_trade(accounts: &mut AccountManager, pair: &Pair, trade: &Trade) -> Result<(), AccountError> {
    let base_amount = trade.size;
    let quote_amount = trade.size * trade.price;

    // Seller: locked base out, quote in.
    accounts.debit_locked(&trade.ask_user_id, &pair.base, base_amount)?;
    accounts.credit(&trade.ask_user_id, &pair.quote, quote_amount)?;

    // Buyer: locked quote out, base in.
    accounts.debit_locked(&trade.bid_user_id, &pair.quote, quote_amount)?;
    accounts.credit(&trade.bid_user_id, &pair.base, base_amount)?;

    Ok(())
}
