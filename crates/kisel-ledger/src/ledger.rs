//! The score ledger: per-user point balances.
//!
//! The [`ScoreLedger`] serializes as a plain JSON object of user id to
//! integer, which is exactly the persisted scores document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kisel_types::UserId;

use crate::LedgerError;

/// Outcome of a debit after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debit {
    /// Points actually removed (may be less than requested).
    pub removed: u64,
    /// Balance after the debit.
    pub balance: u64,
}

impl Debit {
    /// Whether part of the requested amount could not be taken.
    pub const fn was_clamped(&self, requested: u64) -> bool {
        self.removed < requested
    }
}

/// Per-user reward point balances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreLedger {
    balances: BTreeMap<UserId, u64>,
}

impl ScoreLedger {
    /// Create an empty ledger.
    pub const fn new() -> Self {
        Self {
            balances: BTreeMap::new(),
        }
    }

    /// Number of users with a recorded balance.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Whether no user has a recorded balance.
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Current balance for `user`, zero if never seen.
    pub fn score(&self, user: UserId) -> u64 {
        self.balances.get(&user).copied().unwrap_or(0)
    }

    /// The recorded balance, distinguishing "never seen" from zero.
    pub fn entry(&self, user: UserId) -> Option<u64> {
        self.balances.get(&user).copied()
    }

    /// Add `amount` points to `user` and return the new balance.
    ///
    /// Balances saturate at `u64::MAX` rather than wrapping.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAmount`] if `amount` is zero.
    pub fn credit(&mut self, user: UserId, amount: u64) -> Result<u64, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let balance = self.balances.entry(user).or_insert(0);
        *balance = balance.saturating_add(amount);
        Ok(*balance)
    }

    /// Remove up to `amount` points from `user`.
    ///
    /// If `amount` exceeds the balance the balance becomes zero and the
    /// excess is forfeited.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroAmount`] if `amount` is zero.
    pub fn debit(&mut self, user: UserId, amount: u64) -> Result<Debit, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let balance = self.balances.entry(user).or_insert(0);
        let removed = amount.min(*balance);
        *balance = balance.saturating_sub(amount);
        if removed < amount {
            tracing::debug!(
                user = %user,
                requested = amount,
                removed,
                "debit clamped at zero"
            );
        }
        Ok(Debit {
            removed,
            balance: *balance,
        })
    }

    /// Check that `user` holds at least `required` points.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] if they do not.
    pub fn ensure_balance(&self, user: UserId, required: u64) -> Result<(), LedgerError> {
        let available = self.score(user);
        if available < required {
            return Err(LedgerError::InsufficientBalance {
                user,
                required,
                available,
            });
        }
        Ok(())
    }

    /// Put back a balance captured with [`ScoreLedger::entry`].
    ///
    /// Used to undo an in-memory mutation whose persistence failed.
    pub fn restore(&mut self, user: UserId, previous: Option<u64>) {
        match previous {
            Some(balance) => {
                self.balances.insert(user, balance);
            }
            None => {
                self.balances.remove(&user);
            }
        }
    }

    /// Users ordered by balance, highest first, ties broken by id.
    pub fn leaderboard(&self, limit: usize) -> Vec<(UserId, u64)> {
        let mut ranked: Vec<(UserId, u64)> = self
            .balances
            .iter()
            .filter(|(_, balance)| **balance > 0)
            .map(|(user, balance)| (*user, *balance))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }
}
