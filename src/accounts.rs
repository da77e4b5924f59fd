//! Account manager: per-(user, asset) balance ledger.
//!
//! Every primitive validates its inputs before any state change. The
//! manager itself carries no lock; the engine serializes access (see
//! `engine`), so callers outside the engine must go through it.

use rustc_hash::FxHashMap;
use std::collections::HashMap;
use thiserror::Error;

use crate::balance::Balance;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("insufficient locked balance")]
    InsufficientLocked,
    #[error("amount must be greater than 0")]
    InvalidAmount,
    #[error("asset cannot be empty")]
    InvalidAsset,
    #[error("user id cannot be empty")]
    InvalidUserId,
}

/// Lazily materialized (user, asset) -> Balance map.
#[derive(Debug, Default)]
pub struct AccountManager {
    accounts: FxHashMap<String, FxHashMap<String, Balance>>,
}

impl AccountManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the user's available balance. The sole source of
    /// value in the ledger.
    pub fn credit(&mut self, user_id: &str, asset: &str, amount: f64) -> Result<(), AccountError> {
        validate_inputs(user_id, asset, amount)?;
        self.balance_mut(user_id, asset).credit(amount);
        Ok(())
    }

    /// Removes `amount` from the user's available balance.
    pub fn debit(&mut self, user_id: &str, asset: &str, amount: f64) -> Result<(), AccountError> {
        validate_inputs(user_id, asset, amount)?;
        self.balance_mut(user_id, asset).debit(amount)
    }

    /// Moves `amount` from available to locked.
    pub fn lock(&mut self, user_id: &str, asset: &str, amount: f64) -> Result<(), AccountError> {
        validate_inputs(user_id, asset, amount)?;
        self.balance_mut(user_id, asset).lock(amount)
    }

    /// Moves `amount` from locked back to available.
    pub fn unlock(&mut self, user_id: &str, asset: &str, amount: f64) -> Result<(), AccountError> {
        validate_inputs(user_id, asset, amount)?;
        self.balance_mut(user_id, asset).unlock(amount)
    }

    /// Removes `amount` from the locked slot. Used for trade settlement.
    pub fn debit_locked(
        &mut self,
        user_id: &str,
        asset: &str,
        amount: f64,
    ) -> Result<(), AccountError> {
        validate_inputs(user_id, asset, amount)?;
        self.balance_mut(user_id, asset).debit_locked(amount)
    }

    /// Returns a snapshot. A never-touched (user, asset) pair reads as zero.
    pub fn get_balance(&self, user_id: &str, asset: &str) -> Balance {
        self.accounts
            .get(user_id)
            .and_then(|assets| assets.get(asset))
            .copied()
            .unwrap_or_default()
    }

    /// Returns a snapshot of every asset the user has touched.
    pub fn get_all_balances(&self, user_id: &str) -> HashMap<String, Balance> {
        self.accounts
            .get(user_id)
            .map(|assets| {
                assets
                    .iter()
                    .map(|(asset, bal)| (asset.clone(), *bal))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn balance_mut(&mut self, user_id: &str, asset: &str) -> &mut Balance {
        self.accounts
            .entry(user_id.to_string())
            .or_default()
            .entry(asset.to_string())
            .or_default()
    }
}

fn validate_inputs(user_id: &str, asset: &str, amount: f64) -> Result<(), AccountError> {
    if user_id.is_empty() {
        return Err(AccountError::InvalidUserId);
    }
    if asset.is_empty() {
        return Err(AccountError::InvalidAsset);
    }
    if amount <= 0.0 {
        return Err(AccountError::InvalidAmount);
    }
    Ok(())
}
