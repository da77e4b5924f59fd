//! Request/response DTOs and the error-to-HTTP mapping.
//!
//! Success responses are plain JSON bodies; failures are `{"error": msg}`
//! with the status code carrying the failure class. Engine errors collapse
//! onto four classes here so handlers stay thin.

use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accounts::AccountError;
use crate::core_types::OrderId;
use crate::engine::EngineError;
use crate::models::{Order, Trade};

/// Handler return type: a JSON body or a mapped failure.
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Error reply body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// The four failure classes the API distinguishes. Everything the caller
/// can fix (malformed input, tick misalignment, insufficient funds or
/// liquidity) is `Validation`; `Internal` is reserved for broken ledger
/// invariants.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Unauthorized(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn parts(self) -> (StatusCode, String) {
        match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = self.parts();
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let msg = err.to_string();
        match err {
            EngineError::OrderNotFound => ApiError::NotFound(msg),
            EngineError::Unauthorized => ApiError::Unauthorized(msg),
            EngineError::TransferFailed(_) => ApiError::Internal(msg),
            _ => ApiError::Validation(msg),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: String,
    pub pair: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    /// Ignored for market orders.
    #[serde(default)]
    pub price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelOrderRequest {
    pub user_id: String,
    pub pair: String,
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreditDebitRequest {
    pub user_id: String,
    pub asset: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceQuery {
    pub user_id: String,
    pub asset: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderbookQuery {
    pub pair: String,
}

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: String,
    pub pair: String,
    pub side: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub price: f64,
    pub amount: f64,
    pub filled_amount: f64,
    pub state: String,
    pub timestamp: DateTime<Utc>,
}

impl OrderView {
    pub fn from_order(order: &Order, pair: &str) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id.clone(),
            pair: pair.to_string(),
            side: order.side.as_str().to_string(),
            order_type: order.order_type.as_str().to_string(),
            price: order.price,
            amount: order.amount,
            filled_amount: order.filled_amount,
            state: order.state.as_str().to_string(),
            timestamp: order.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TradeView {
    pub bid_order_id: OrderId,
    pub ask_order_id: OrderId,
    pub price: f64,
    pub size: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<&Trade> for TradeView {
    fn from(trade: &Trade) -> Self {
        Self {
            bid_order_id: trade.bid_order_id,
            ask_order_id: trade.ask_order_id,
            price: trade.price,
            size: trade.size,
            timestamp: trade.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub order: OrderView,
    pub trades: Vec<TradeView>,
}

#[derive(Debug, Serialize)]
pub struct BalanceItem {
    pub asset: String,
    pub available: f64,
    pub locked: f64,
    pub total: f64,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balances: Vec<BalanceItem>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}
