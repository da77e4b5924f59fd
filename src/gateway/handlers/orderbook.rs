//! Book snapshot handler.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};

use crate::engine::{OrderbookSnapshot, Pair};

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, OrderbookQuery};

/// GET /api/v1/orderbook?pair=BTC/BRL
pub async fn get_orderbook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrderbookQuery>,
) -> ApiResult<OrderbookSnapshot> {
    if query.pair.is_empty() {
        return Err(ApiError::Validation(
            "pair query parameter is required (e.g., BTC/BRL)".into(),
        ));
    }

    let pair = Pair::parse(&query.pair).map_err(|_| {
        ApiError::Validation("pair must be in format BASE/QUOTE (e.g., BTC/BRL)".into())
    })?;

    match state.engine.get_orderbook(&pair) {
        Some(snapshot) => {
            tracing::debug!(
                pair = %query.pair,
                bids = snapshot.bids.len(),
                asks = snapshot.asks.len(),
                "orderbook snapshot served"
            );
            Ok(Json(snapshot))
        }
        None => Err(ApiError::NotFound("orderbook not found".into())),
    }
}
