//! Registry of one-time purchases.
//!
//! Each `(user, item)` entry moves `absent -> Pending -> Purchased`, or
//! straight to `Purchased`. A `Pending` entry can be abandoned back to
//! absent when the external grant fails. `Purchased` is terminal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kisel_types::{PurchaseState, PurchaseType, UserId};

use crate::LedgerError;

/// Which catalog items each user has redeemed or is redeeming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseRegistry {
    entries: BTreeMap<UserId, BTreeMap<PurchaseType, PurchaseState>>,
}

impl PurchaseRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Current state of `item` for `user`, if any.
    pub fn state(&self, user: UserId, item: PurchaseType) -> Option<PurchaseState> {
        self.entries
            .get(&user)
            .and_then(|items| items.get(&item))
            .copied()
    }

    /// Whether `user` has completed the purchase of `item`.
    pub fn has_purchased(&self, user: UserId, item: PurchaseType) -> bool {
        self.state(user, item) == Some(PurchaseState::Purchased)
    }

    /// Check that `item` can still be bought by `user`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyPurchased`] for a completed purchase and
    /// [`LedgerError::PurchasePending`] for an uncommitted one.
    pub fn ensure_available(&self, user: UserId, item: PurchaseType) -> Result<(), LedgerError> {
        match self.state(user, item) {
            None => Ok(()),
            Some(PurchaseState::Purchased) => Err(LedgerError::AlreadyPurchased { user, item }),
            Some(PurchaseState::Pending) => Err(LedgerError::PurchasePending { user, item }),
        }
    }

    /// Write a pending intent ahead of the external grant.
    ///
    /// # Errors
    ///
    /// Same as [`PurchaseRegistry::ensure_available`].
    pub fn begin(&mut self, user: UserId, item: PurchaseType) -> Result<(), LedgerError> {
        self.ensure_available(user, item)?;
        self.set(user, item, Some(PurchaseState::Pending));
        Ok(())
    }

    /// Drop a pending intent. Returns whether one was removed.
    ///
    /// Completed purchases are never removed.
    pub fn abandon(&mut self, user: UserId, item: PurchaseType) -> bool {
        if self.state(user, item) != Some(PurchaseState::Pending) {
            return false;
        }
        self.set(user, item, None);
        true
    }

    /// Mark `item` as purchased by `user`.
    ///
    /// Succeeds from absent or pending.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyPurchased`] if it was already recorded;
    /// the caller must not grant the item again.
    pub fn record_purchase(&mut self, user: UserId, item: PurchaseType) -> Result<(), LedgerError> {
        if self.has_purchased(user, item) {
            return Err(LedgerError::AlreadyPurchased { user, item });
        }
        self.set(user, item, Some(PurchaseState::Purchased));
        Ok(())
    }

    /// Every pending intent, in user then item order.
    pub fn pending(&self) -> Vec<(UserId, PurchaseType)> {
        self.entries
            .iter()
            .flat_map(|(user, items)| {
                items
                    .iter()
                    .filter(|(_, state)| **state == PurchaseState::Pending)
                    .map(move |(item, _)| (*user, *item))
            })
            .collect()
    }

    /// Overwrite an entry with a state captured from
    /// [`PurchaseRegistry::state`], for rollback after a failed write.
    pub fn restore(&mut self, user: UserId, item: PurchaseType, previous: Option<PurchaseState>) {
        self.set(user, item, previous);
    }

    fn set(&mut self, user: UserId, item: PurchaseType, state: Option<PurchaseState>) {
        match state {
            Some(state) => {
                self.entries.entry(user).or_default().insert(item, state);
            }
            None => {
                if let Some(items) = self.entries.get_mut(&user) {
                    items.remove(&item);
                    if items.is_empty() {
                        self.entries.remove(&user);
                    }
                }
            }
        }
    }
}
