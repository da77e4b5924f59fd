//! Price-time priority order book for one trading pair.
//!
//! Each side is a `BTreeMap` of price levels keyed by integer ticks; bid
//! keys are negated so that ascending iteration walks both sides best-first.
//! Resting orders are owned by their level. The id index maps an order id
//! to a (side, ticks) locator, the non-owning stand-in for a back-pointer
//! from order to level: an id is present iff the order is resting.

use std::collections::{BTreeMap, VecDeque};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::core_types::{OrderId, PriceTicks};
use crate::models::{Order, OrderState, Side, Trade};
use crate::tick;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookError {
    #[error("order not found")]
    OrderNotFound,
}

/// One price level: FIFO queue of resting orders plus the aggregate
/// remaining volume.
#[derive(Debug)]
pub struct Limit {
    price_ticks: PriceTicks,
    orders: VecDeque<Order>,
    total_volume: f64,
}

impl Limit {
    fn new(price_ticks: PriceTicks) -> Self {
        Self {
            price_ticks,
            orders: VecDeque::new(),
            total_volume: 0.0,
        }
    }

    #[inline]
    pub fn price_ticks(&self) -> PriceTicks {
        self.price_ticks
    }

    #[inline]
    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn add_order(&mut self, order: Order) {
        self.total_volume += order.remaining();
        self.orders.push_back(order);
    }

    fn remove_order(&mut self, order_id: OrderId) -> Option<Order> {
        let pos = self.orders.iter().position(|o| o.id == order_id)?;
        let order = self.orders.remove(pos)?;
        self.total_volume -= order.remaining();
        Some(order)
    }

    /// Consumes resting liquidity at this level to satisfy `incoming`.
    ///
    /// Resting orders are visited in FIFO order; orders owned by the
    /// incoming user are skipped and stay resting (self-trade prevention).
    /// Returns the trades in consumption order plus the ids of resting
    /// orders that reached `filled` and left the level.
    fn fill(&mut self, incoming: &mut Order, level_price: f64) -> (Vec<Trade>, Vec<OrderId>) {
        let mut trades = Vec::new();
        let mut consumed = 0.0;

        for resting in self.orders.iter_mut() {
            if incoming.is_filled() {
                break;
            }
            if resting.user_id == incoming.user_id {
                continue;
            }

            let fill_size = incoming.remaining().min(resting.remaining());

            incoming.filled_amount += fill_size;
            resting.filled_amount += fill_size;

            incoming.state = if incoming.is_filled() {
                OrderState::Filled
            } else {
                OrderState::PartiallyFilled
            };
            resting.state = if resting.is_filled() {
                OrderState::Filled
            } else {
                OrderState::PartiallyFilled
            };

            consumed += fill_size;

            let (bid_order_id, ask_order_id, bid_user_id, ask_user_id) = match incoming.side {
                Side::Bid => (
                    incoming.id,
                    resting.id,
                    incoming.user_id.clone(),
                    resting.user_id.clone(),
                ),
                Side::Ask => (
                    resting.id,
                    incoming.id,
                    resting.user_id.clone(),
                    incoming.user_id.clone(),
                ),
            };

            trades.push(Trade {
                bid_order_id,
                ask_order_id,
                bid_user_id,
                ask_user_id,
                price: level_price,
                size: fill_size,
                timestamp: Utc::now(),
            });
        }

        self.total_volume -= consumed;

        let mut filled_ids = Vec::new();
        self.orders.retain(|o| {
            if o.is_filled() {
                filled_ids.push(o.id);
                false
            } else {
                true
            }
        });

        (trades, filled_ids)
    }
}

/// Snapshot of one price level, safe to hand out after locks are dropped.
#[derive(Debug, Clone, Serialize)]
pub struct LevelSnapshot {
    pub price: f64,
    pub total_volume: f64,
    pub order_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct OrderLocator {
    side: Side,
    price_ticks: PriceTicks,
}

#[derive(Debug)]
pub struct OrderBook {
    price_tick: f64,
    /// Keyed by negated ticks: ascending iteration = highest price first.
    bids: BTreeMap<PriceTicks, Limit>,
    /// Keyed by ticks: ascending iteration = lowest price first.
    asks: BTreeMap<PriceTicks, Limit>,
    orders: rustc_hash::FxHashMap<OrderId, OrderLocator>,
}

impl OrderBook {
    pub fn new(price_tick: f64) -> Self {
        Self {
            price_tick,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            orders: rustc_hash::FxHashMap::default(),
        }
    }

    #[inline]
    fn side_key(side: Side, price_ticks: PriceTicks) -> PriceTicks {
        match side {
            Side::Bid => -price_ticks,
            Side::Ask => price_ticks,
        }
    }

    /// Matches `order` against the opposite side, then rests the remainder
    /// at its own price level. Returns the trades in execution order.
    pub fn place_limit(&mut self, order: &mut Order) -> Vec<Trade> {
        let price_ticks = tick::price_to_ticks(order.price, self.price_tick);
        let trades = self.match_order(order, Some(price_ticks));

        if !order.is_filled() {
            self.rest_order(order.clone(), price_ticks);
        }

        trades
    }

    /// Matches `order` against the best available prices with no price
    /// bound. The order is never inserted into the book: it ends `filled`,
    /// `partially_filled`, or still `open` if nothing matched.
    pub fn place_market(&mut self, order: &mut Order) -> Vec<Trade> {
        self.match_order(order, None)
    }

    fn match_order(&mut self, order: &mut Order, limit_ticks: Option<PriceTicks>) -> Vec<Trade> {
        let price_tick = self.price_tick;
        let opposite = match order.side {
            Side::Bid => &mut self.asks,
            Side::Ask => &mut self.bids,
        };

        let mut trades = Vec::new();
        let mut filled_ids = Vec::new();
        let mut emptied = Vec::new();

        // Key order is best-first on both sides; keys are collected up
        // front so levels can be mutated during the walk.
        let keys: Vec<PriceTicks> = opposite.keys().copied().collect();
        for key in keys {
            if order.is_filled() {
                break;
            }
            let Some(level) = opposite.get_mut(&key) else {
                continue;
            };

            if let Some(limit) = limit_ticks {
                let crossed = match order.side {
                    Side::Bid => level.price_ticks > limit,
                    Side::Ask => level.price_ticks < limit,
                };
                if crossed {
                    break;
                }
            }

            let level_price = tick::ticks_to_price(level.price_ticks, price_tick);
            let (level_trades, level_filled) = level.fill(order, level_price);
            trades.extend(level_trades);
            filled_ids.extend(level_filled);

            if level.is_empty() {
                emptied.push(key);
            }
        }

        for key in emptied {
            opposite.remove(&key);
        }
        for id in filled_ids {
            self.orders.remove(&id);
        }

        trades
    }

    fn rest_order(&mut self, order: Order, price_ticks: PriceTicks) {
        let side = order.side;
        let order_id = order.id;
        let key = Self::side_key(side, price_ticks);

        let book = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        book.entry(key)
            .or_insert_with(|| Limit::new(price_ticks))
            .add_order(order);

        self.orders.insert(order_id, OrderLocator { side, price_ticks });
    }

    /// Removes a resting order. The level is destroyed if it empties; the
    /// returned order is `cancelled` with its fill progress intact.
    pub fn cancel(&mut self, order_id: OrderId) -> Result<Order, BookError> {
        let locator = self
            .orders
            .remove(&order_id)
            .ok_or(BookError::OrderNotFound)?;

        let key = Self::side_key(locator.side, locator.price_ticks);
        let book = match locator.side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };

        let Some(level) = book.get_mut(&key) else {
            return Err(BookError::OrderNotFound);
        };
        let Some(mut order) = level.remove_order(order_id) else {
            return Err(BookError::OrderNotFound);
        };
        if level.is_empty() {
            book.remove(&key);
        }

        order.state = OrderState::Cancelled;
        Ok(order)
    }

    /// Bid levels, best (highest) price first.
    pub fn bids(&self) -> Vec<LevelSnapshot> {
        self.bids.values().map(|l| self.snapshot_level(l)).collect()
    }

    /// Ask levels, best (lowest) price first.
    pub fn asks(&self) -> Vec<LevelSnapshot> {
        self.asks.values().map(|l| self.snapshot_level(l)).collect()
    }

    pub fn best_bid(&self) -> Option<LevelSnapshot> {
        self.bids.values().next().map(|l| self.snapshot_level(l))
    }

    pub fn best_ask(&self) -> Option<LevelSnapshot> {
        self.asks.values().next().map(|l| self.snapshot_level(l))
    }

    /// Best ask minus best bid when both sides exist, otherwise 0.
    pub fn spread(&self) -> f64 {
        match (self.asks.values().next(), self.bids.values().next()) {
            (Some(ask), Some(bid)) => {
                tick::ticks_to_price(ask.price_ticks - bid.price_ticks, self.price_tick)
            }
            _ => 0.0,
        }
    }

    pub fn bid_total_volume(&self) -> f64 {
        self.bids.values().map(|l| l.total_volume).sum()
    }

    pub fn ask_total_volume(&self) -> f64 {
        self.asks.values().map(|l| l.total_volume).sum()
    }

    /// Snapshot of a resting order. Market orders and terminal orders are
    /// never present.
    pub fn get_order(&self, order_id: OrderId) -> Option<Order> {
        let locator = self.orders.get(&order_id)?;
        let key = Self::side_key(locator.side, locator.price_ticks);
        let book = match locator.side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };
        book.get(&key)?
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
    }

    /// Quote cost of filling a market buy of `amount` against current
    /// asks, walking best-first and skipping the user's own resting
    /// liquidity (which self-trade prevention would refuse to match).
    /// `None` when the executable liquidity falls short.
    ///
    /// Mirrors the fill routine's arithmetic step for step so that a
    /// pre-lock computed from this estimate is consumed exactly.
    pub fn estimate_market_buy_cost(&self, user_id: &str, amount: f64) -> Option<f64> {
        let mut filled = 0.0;
        let mut cost = 0.0;

        'levels: for level in self.asks.values() {
            let level_price = tick::ticks_to_price(level.price_ticks, self.price_tick);
            for resting in &level.orders {
                if filled >= amount {
                    break 'levels;
                }
                if resting.user_id == user_id {
                    continue;
                }
                let take = (amount - filled).min(resting.remaining());
                cost += take * level_price;
                filled += take;
            }
        }

        if filled >= amount { Some(cost) } else { None }
    }

    /// Bid-side volume a market sell by `user_id` can actually consume,
    /// excluding the user's own resting orders.
    pub fn executable_bid_volume(&self, user_id: &str) -> f64 {
        self.bids
            .values()
            .flat_map(|level| level.orders.iter())
            .filter(|o| o.user_id != user_id)
            .map(|o| o.remaining())
            .sum()
    }

    fn snapshot_level(&self, level: &Limit) -> LevelSnapshot {
        LevelSnapshot {
            price: tick::ticks_to_price(level.price_ticks, self.price_tick),
            total_volume: level.total_volume(),
            order_count: level.order_count(),
        }
    }
}
