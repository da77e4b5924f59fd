//! Order placement and cancellation handlers.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::engine::Pair;
use crate::models::{OrderError, OrderType, Side};

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResult, CancelOrderRequest, OrderView, PlaceOrderRequest, PlaceOrderResponse,
    TradeView,
};

/// POST /api/v1/orders
///
/// Places a limit or market order and returns the post-matching order
/// together with any trades it produced.
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlaceOrderRequest>,
) -> ApiResult<PlaceOrderResponse> {
    if req.user_id.is_empty() {
        return Err(ApiError::Validation("user_id is required".into()));
    }
    if req.pair.is_empty() {
        return Err(ApiError::Validation("pair is required".into()));
    }
    if req.amount <= 0.0 {
        return Err(ApiError::Validation("amount must be greater than 0".into()));
    }

    let pair = Pair::parse(&req.pair).map_err(|_| {
        ApiError::Validation("pair must be in format BASE/QUOTE (e.g., BTC/BRL)".into())
    })?;
    let side: Side = req
        .side
        .parse()
        .map_err(|err: OrderError| ApiError::Validation(err.to_string()))?;
    let order_type: OrderType = req
        .order_type
        .parse()
        .map_err(|err: OrderError| ApiError::Validation(err.to_string()))?;
    if order_type == OrderType::Limit && req.price <= 0.0 {
        return Err(ApiError::Validation(
            "price must be greater than 0 for limit orders".into(),
        ));
    }

    let result = match order_type {
        OrderType::Limit => state
            .engine
            .place_limit(&req.user_id, &pair, side, req.price, req.amount),
        OrderType::Market => state
            .engine
            .place_market(&req.user_id, &pair, side, req.amount),
    };

    match result {
        Ok((order, trades)) => {
            tracing::info!(
                user_id = %req.user_id,
                pair = %req.pair,
                side = %side,
                order_type = %order_type,
                order_id = order.id,
                trades = trades.len(),
                "order placed"
            );
            Ok(Json(PlaceOrderResponse {
                order: OrderView::from_order(&order, &req.pair),
                trades: trades.iter().map(TradeView::from).collect(),
            }))
        }
        Err(err) => {
            tracing::warn!(user_id = %req.user_id, pair = %req.pair, %err, "place order failed");
            Err(err.into())
        }
    }
}

/// POST /api/v1/orders/cancel
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CancelOrderRequest>,
) -> ApiResult<OrderView> {
    if req.user_id.is_empty() {
        return Err(ApiError::Validation("user_id is required".into()));
    }
    if req.pair.is_empty() {
        return Err(ApiError::Validation("pair is required".into()));
    }
    if req.order_id == 0 {
        return Err(ApiError::Validation("order_id must be greater than 0".into()));
    }

    let pair = Pair::parse(&req.pair).map_err(|_| {
        ApiError::Validation("pair must be in format BASE/QUOTE (e.g., BTC/BRL)".into())
    })?;

    match state.engine.cancel(&req.user_id, &pair, req.order_id) {
        Ok(cancelled) => {
            tracing::info!(
                user_id = %req.user_id,
                order_id = req.order_id,
                "order cancelled"
            );
            Ok(Json(OrderView::from_order(&cancelled, &req.pair)))
        }
        Err(err) => {
            tracing::warn!(
                user_id = %req.user_id,
                order_id = req.order_id,
                %err,
                "cancel order failed"
            );
            Err(err.into())
        }
    }
}
