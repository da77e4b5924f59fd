//! End-to-end engine scenarios driven through the public surface only.

use matchbook::engine::{Engine, EngineError, Pair};
use matchbook::models::{OrderState, Side};

fn btc_brl() -> Pair {
    Pair::new("BTC", "BRL")
}

/// Users 1 and 2 each hold 10 BTC and 100 000 BRL.
fn seeded_engine() -> Engine {
    let engine = Engine::default();
    for user in ["1", "2"] {
        engine.credit(user, "BTC", 10.0).unwrap();
        engine.credit(user, "BRL", 100_000.0).unwrap();
    }
    engine
}

#[test]
fn full_limit_match_at_declared_price() {
    let engine = seeded_engine();

    engine
        .place_limit("2", &btc_brl(), Side::Ask, 50_000.0, 1.0)
        .unwrap();
    let (order, trades) = engine
        .place_limit("1", &btc_brl(), Side::Bid, 50_000.0, 1.0)
        .unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].size, 1.0);
    assert_eq!(trades[0].price, 50_000.0);
    assert_eq!(order.state, OrderState::Filled);

    let buyer_btc = engine.get_balance("1", "BTC");
    let buyer_brl = engine.get_balance("1", "BRL");
    assert_eq!(buyer_btc.available(), 11.0);
    assert_eq!(buyer_brl.available(), 50_000.0);
    assert_eq!(buyer_brl.locked(), 0.0);

    let seller_btc = engine.get_balance("2", "BTC");
    let seller_brl = engine.get_balance("2", "BRL");
    assert_eq!(seller_btc.available(), 9.0);
    assert_eq!(seller_btc.locked(), 0.0);
    assert_eq!(seller_brl.available(), 150_000.0);
}

#[test]
fn price_improvement_refunds_the_difference() {
    let engine = seeded_engine();

    engine
        .place_limit("2", &btc_brl(), Side::Ask, 49_000.0, 1.0)
        .unwrap();
    let (order, trades) = engine
        .place_limit("1", &btc_brl(), Side::Bid, 50_000.0, 1.0)
        .unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, 49_000.0);
    assert_eq!(order.state, OrderState::Filled);

    let buyer_btc = engine.get_balance("1", "BTC");
    let buyer_brl = engine.get_balance("1", "BRL");
    assert_eq!(buyer_btc.available(), 11.0);
    assert_eq!(buyer_brl.available(), 51_000.0);
    assert_eq!(buyer_brl.locked(), 0.0);

    assert_eq!(engine.get_balance("2", "BTC").available(), 9.0);
    assert_eq!(engine.get_balance("2", "BRL").available(), 149_000.0);
}

#[test]
fn partial_fill_refund_keeps_correct_residual_lock() {
    let engine = seeded_engine();

    engine
        .place_limit("2", &btc_brl(), Side::Ask, 49_000.0, 0.5)
        .unwrap();
    let (order, trades) = engine
        .place_limit("1", &btc_brl(), Side::Bid, 50_000.0, 1.0)
        .unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].size, 0.5);
    assert_eq!(trades[0].price, 49_000.0);
    assert_eq!(order.state, OrderState::PartiallyFilled);
    assert_eq!(order.remaining(), 0.5);

    // Locked 50_000 up front; spent 24_500; the resting half still needs
    // 25_000; the 500 surplus came back.
    let buyer_btc = engine.get_balance("1", "BTC");
    let buyer_brl = engine.get_balance("1", "BRL");
    assert_eq!(buyer_btc.available(), 10.5);
    assert_eq!(buyer_brl.available(), 50_500.0);
    assert_eq!(buyer_brl.locked(), 25_000.0);
}

#[test]
fn fifo_wins_at_equal_price() {
    let engine = seeded_engine();
    engine.credit("3", "BTC", 10.0).unwrap();
    engine.credit("3", "BRL", 100_000.0).unwrap();

    engine
        .place_limit("1", &btc_brl(), Side::Ask, 50_000.0, 1.0)
        .unwrap();
    engine
        .place_limit("3", &btc_brl(), Side::Ask, 50_000.0, 1.0)
        .unwrap();

    let (_, trades) = engine
        .place_limit("2", &btc_brl(), Side::Bid, 50_000.0, 1.0)
        .unwrap();

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].ask_user_id, "1");
    // The later seller's order is untouched.
    assert_eq!(engine.get_balance("3", "BTC").locked(), 1.0);
}

#[test]
fn self_trade_is_prevented() {
    let engine = seeded_engine();

    engine
        .place_limit("1", &btc_brl(), Side::Ask, 50_000.0, 1.0)
        .unwrap();
    let (order, trades) = engine
        .place_limit("1", &btc_brl(), Side::Bid, 50_000.0, 1.0)
        .unwrap();

    assert!(trades.is_empty());
    assert_eq!(order.state, OrderState::Open);

    let snapshot = engine.get_orderbook(&btc_brl()).unwrap();
    assert_eq!(snapshot.bids.len(), 1);
    assert_eq!(snapshot.asks.len(), 1);
    assert_eq!(snapshot.bid_total_volume, 1.0);
    assert_eq!(snapshot.ask_total_volume, 1.0);
}

#[test]
fn market_order_with_insufficient_liquidity_changes_nothing() {
    let engine = seeded_engine();

    engine
        .place_limit("2", &btc_brl(), Side::Ask, 50_000.0, 0.5)
        .unwrap();

    let before_brl = engine.get_balance("1", "BRL");
    let before_btc = engine.get_balance("1", "BTC");

    let err = engine
        .place_market("1", &btc_brl(), Side::Bid, 2.0)
        .unwrap_err();
    assert_eq!(err, EngineError::InsufficientLiquidity);

    let after_brl = engine.get_balance("1", "BRL");
    let after_btc = engine.get_balance("1", "BTC");
    assert_eq!(after_brl, before_brl);
    assert_eq!(after_btc, before_btc);
    assert_eq!(after_brl.locked(), 0.0);
}

#[test]
fn place_then_cancel_restores_balances_exactly() {
    let engine = seeded_engine();

    let before = engine.get_balance("1", "BRL");
    let (order, _) = engine
        .place_limit("1", &btc_brl(), Side::Bid, 50_000.0, 1.0)
        .unwrap();

    engine.cancel("1", &btc_brl(), order.id).unwrap();

    let after = engine.get_balance("1", "BRL");
    assert_eq!(after.available(), before.available());
    assert_eq!(after.locked(), before.locked());
}

#[test]
fn second_cancel_reports_not_found() {
    let engine = seeded_engine();

    let (order, _) = engine
        .place_limit("1", &btc_brl(), Side::Bid, 50_000.0, 1.0)
        .unwrap();
    engine.cancel("1", &btc_brl(), order.id).unwrap();

    assert_eq!(
        engine.cancel("1", &btc_brl(), order.id).unwrap_err(),
        EngineError::OrderNotFound
    );
}

#[test]
fn value_is_conserved_across_trading_activity() {
    let engine = seeded_engine();
    engine.credit("3", "BTC", 5.0).unwrap();
    engine.credit("3", "BRL", 250_000.0).unwrap();

    let users = ["1", "2", "3"];
    let total =
        |asset: &str| -> f64 { users.iter().map(|u| engine.get_balance(u, asset).total()).sum() };

    let btc_before = total("BTC");
    let brl_before = total("BRL");

    engine
        .place_limit("2", &btc_brl(), Side::Ask, 49_000.0, 0.5)
        .unwrap();
    engine
        .place_limit("2", &btc_brl(), Side::Ask, 50_000.0, 1.0)
        .unwrap();
    engine
        .place_limit("1", &btc_brl(), Side::Bid, 50_000.0, 1.0)
        .unwrap();
    let (resting, _) = engine
        .place_limit("3", &btc_brl(), Side::Bid, 48_000.0, 2.0)
        .unwrap();
    engine
        .place_market("3", &btc_brl(), Side::Bid, 0.5)
        .unwrap();
    engine.cancel("3", &btc_brl(), resting.id).unwrap();

    // Placements, matches, refunds and cancels moved value between users
    // and between slots, never in or out of the system.
    assert!((total("BTC") - btc_before).abs() < 1e-9);
    assert!((total("BRL") - brl_before).abs() < 1e-6);
}

#[test]
fn market_sell_against_seeded_bids_settles_fully() {
    let engine = seeded_engine();

    engine
        .place_limit("1", &btc_brl(), Side::Bid, 50_000.0, 0.6)
        .unwrap();
    engine
        .place_limit("1", &btc_brl(), Side::Bid, 49_900.0, 0.4)
        .unwrap();

    let (order, trades) = engine
        .place_market("2", &btc_brl(), Side::Ask, 1.0)
        .unwrap();

    assert_eq!(order.state, OrderState::Filled);
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].price, 50_000.0);
    assert_eq!(trades[1].price, 49_900.0);

    // 0.6*50_000 + 0.4*49_900 = 49_960 received; no base left locked.
    let seller_btc = engine.get_balance("2", "BTC");
    let seller_brl = engine.get_balance("2", "BRL");
    assert_eq!(seller_btc.available(), 9.0);
    assert_eq!(seller_btc.locked(), 0.0);
    assert_eq!(seller_brl.available(), 149_960.0);
}
