//! Account provisioning handlers: operator-facing credit/debit and
//! balance snapshots.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResult, BalanceItem, BalanceQuery, BalanceResponse, CreditDebitRequest,
};

/// POST /api/v1/accounts/credit
pub async fn credit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreditDebitRequest>,
) -> ApiResult<BalanceResponse> {
    if let Err(err) = state.engine.credit(&req.user_id, &req.asset, req.amount) {
        tracing::warn!(user_id = %req.user_id, asset = %req.asset, %err, "credit failed");
        return Err(err.into());
    }

    tracing::info!(
        user_id = %req.user_id,
        asset = %req.asset,
        amount = req.amount,
        "balance credited"
    );
    Ok(Json(balance_snapshot(&state, &req.user_id, Some(&req.asset))))
}

/// POST /api/v1/accounts/debit
pub async fn debit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreditDebitRequest>,
) -> ApiResult<BalanceResponse> {
    if let Err(err) = state.engine.debit(&req.user_id, &req.asset, req.amount) {
        tracing::warn!(user_id = %req.user_id, asset = %req.asset, %err, "debit failed");
        return Err(err.into());
    }

    tracing::info!(
        user_id = %req.user_id,
        asset = %req.asset,
        amount = req.amount,
        "balance debited"
    );
    Ok(Json(balance_snapshot(&state, &req.user_id, Some(&req.asset))))
}

/// GET /api/v1/accounts/balance?user_id=1[&asset=BTC]
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BalanceQuery>,
) -> ApiResult<BalanceResponse> {
    if query.user_id.is_empty() {
        return Err(ApiError::Validation("user_id is required".into()));
    }

    Ok(Json(balance_snapshot(
        &state,
        &query.user_id,
        query.asset.as_deref(),
    )))
}

fn balance_snapshot(state: &AppState, user_id: &str, asset: Option<&str>) -> BalanceResponse {
    let balances = match asset {
        Some(asset) => {
            let bal = state.engine.get_balance(user_id, asset);
            vec![BalanceItem {
                asset: asset.to_string(),
                available: bal.available(),
                locked: bal.locked(),
                total: bal.total(),
            }]
        }
        None => {
            let mut items: Vec<BalanceItem> = state
                .engine
                .get_all_balances(user_id)
                .into_iter()
                .map(|(asset, bal)| BalanceItem {
                    asset,
                    available: bal.available(),
                    locked: bal.locked(),
                    total: bal.total(),
                })
                .collect();
            items.sort_by(|a, b| a.asset.cmp(&b.asset));
            items
        }
    };

    BalanceResponse {
        user_id: user_id.to_string(),
        balances,
    }
}
