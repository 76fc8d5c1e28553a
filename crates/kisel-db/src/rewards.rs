//! Durable reward ledger and purchase registry.
//!
//! [`RewardStore`] owns two documents: the scores document (user id to
//! integer) and the purchases document (user id to item to state). Both are
//! guarded by one per-user lock table so a purchase can hold a user's slot
//! across its external call while voice payouts for other users keep
//! flowing.
//!
//! Single-step operations ([`credit`](RewardStore::credit),
//! [`debit`](RewardStore::debit)) take the lock themselves. Multi-step
//! workflows take a [`UserLock`] with [`lock_user`](RewardStore::lock_user)
//! and pass it to the guarded methods, which never lock again.

use std::path::PathBuf;

use kisel_ledger::{Debit, LedgerError, PurchaseRegistry, ScoreLedger};
use kisel_types::{PurchaseState, PurchaseType, UserId};

use crate::document::JsonDocument;
use crate::error::DbError;
use crate::locks::{KeyGuard, KeyedLocks};

/// Errors from ledger and purchase registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    /// A ledger or registry invariant rejected the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A document could not be saved; the change was rolled back.
    #[error(transparent)]
    Persistence(#[from] DbError),
}

/// Proof that the caller holds a user's reward slot.
#[derive(Debug)]
pub struct UserLock {
    guard: KeyGuard<UserId>,
}

impl UserLock {
    /// The user this lock covers.
    pub const fn user(&self) -> UserId {
        self.guard.key()
    }
}

/// Durable scores and purchases for every user.
#[derive(Debug)]
pub struct RewardStore {
    scores: JsonDocument<ScoreLedger>,
    purchases: JsonDocument<PurchaseRegistry>,
    locks: KeyedLocks<UserId>,
}

impl RewardStore {
    /// Load both documents (each empty if absent).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if either file exists but cannot be read or parsed.
    pub async fn open(
        scores_path: impl Into<PathBuf>,
        purchases_path: impl Into<PathBuf>,
    ) -> Result<Self, DbError> {
        let scores = JsonDocument::open(scores_path).await?;
        let purchases = JsonDocument::open(purchases_path).await?;
        let store = Self {
            scores,
            purchases,
            locks: KeyedLocks::new(),
        };

        let users = store.scores.read(ScoreLedger::len).await;
        let pending = store.pending_purchases().await;
        tracing::info!(users, pending = pending.len(), "reward store loaded");
        Ok(store)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current balance for `user`, zero if never seen.
    pub async fn score(&self, user: UserId) -> u64 {
        self.scores.read(|l| l.score(user)).await
    }

    /// Top `limit` users by balance.
    pub async fn leaderboard(&self, limit: usize) -> Vec<(UserId, u64)> {
        self.scores.read(|l| l.leaderboard(limit)).await
    }

    /// Whether `user` has completed the purchase of `item`.
    pub async fn has_purchased(&self, user: UserId, item: PurchaseType) -> bool {
        self.purchases.read(|r| r.has_purchased(user, item)).await
    }

    /// Purchases whose external grant was attempted but never committed.
    pub async fn pending_purchases(&self) -> Vec<(UserId, PurchaseType)> {
        self.purchases.read(PurchaseRegistry::pending).await
    }

    // =========================================================================
    // Single-step mutations
    // =========================================================================

    /// Add `amount` points to `user` and return the new balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ZeroAmount`] (wrapped) for a zero amount and
    /// [`RewardError::Persistence`] when the save fails.
    pub async fn credit(&self, user: UserId, amount: u64) -> Result<u64, RewardError> {
        let lock = self.lock_user(user).await;
        let balance = self.credit_locked(&lock, amount).await?;
        tracing::debug!(user = %user, amount, balance, "points credited");
        Ok(balance)
    }

    /// Remove up to `amount` points from `user`, clamping at zero.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ZeroAmount`] (wrapped) for a zero amount and
    /// [`RewardError::Persistence`] when the save fails.
    pub async fn debit(&self, user: UserId, amount: u64) -> Result<Debit, RewardError> {
        let lock = self.lock_user(user).await;
        let debit = self.debit_locked(&lock, amount).await?;
        tracing::debug!(
            user = %user,
            requested = amount,
            removed = debit.removed,
            balance = debit.balance,
            "points debited"
        );
        Ok(debit)
    }

    // =========================================================================
    // Guarded multi-step operations
    // =========================================================================

    /// Take exclusive access to `user`'s balance and purchases.
    pub async fn lock_user(&self, user: UserId) -> UserLock {
        UserLock {
            guard: self.locks.lock(user).await,
        }
    }

    /// Balance of the locked user.
    pub async fn score_locked(&self, lock: &UserLock) -> u64 {
        self.score(lock.user()).await
    }

    /// Check that the locked user could buy `item` at `price` right now.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AlreadyPurchased`], [`LedgerError::PurchasePending`] or
    /// [`LedgerError::InsufficientBalance`] (wrapped).
    pub async fn ensure_purchasable(
        &self,
        lock: &UserLock,
        item: PurchaseType,
        price: u64,
    ) -> Result<(), RewardError> {
        let user = lock.user();
        self.purchases.read(|r| r.ensure_available(user, item)).await?;
        self.scores.read(|l| l.ensure_balance(user, price)).await?;
        Ok(())
    }

    /// Check balance and availability, then persist a pending intent.
    ///
    /// # Errors
    ///
    /// Everything [`ensure_purchasable`](Self::ensure_purchasable) returns,
    /// and [`RewardError::Persistence`] when the save fails.
    pub async fn begin_purchase(
        &self,
        lock: &UserLock,
        item: PurchaseType,
        price: u64,
    ) -> Result<(), RewardError> {
        let user = lock.user();
        self.ensure_purchasable(lock, item, price).await?;

        let previous = self.purchases.read(|r| r.state(user, item)).await;
        self.purchases.update(|r| r.begin(user, item)).await?;
        if let Err(e) = self.purchases.flush().await {
            self.purchases.revert(|r| r.restore(user, item, previous)).await;
            return Err(e.into());
        }
        tracing::info!(user = %user, item = %item, price, "purchase intent recorded");
        Ok(())
    }

    /// Drop a pending intent after the external action failed.
    ///
    /// # Errors
    ///
    /// [`RewardError::Persistence`] when the save fails. The intent then
    /// stays pending and surfaces at the next start.
    pub async fn abandon_purchase(
        &self,
        lock: &UserLock,
        item: PurchaseType,
    ) -> Result<(), RewardError> {
        let user = lock.user();
        if !self.purchases.update(|r| r.abandon(user, item)).await {
            return Ok(());
        }
        if let Err(e) = self.purchases.flush().await {
            self.purchases
                .revert(|r| r.restore(user, item, Some(PurchaseState::Pending)))
                .await;
            return Err(e.into());
        }
        tracing::info!(user = %user, item = %item, "purchase intent abandoned");
        Ok(())
    }

    /// Debit `price` and mark `item` purchased, persisting both documents.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AlreadyPurchased`] (wrapped) if it was somehow already
    /// recorded, and [`RewardError::Persistence`] when either save fails.
    /// On failure both documents are rolled back to the pending state.
    pub async fn commit_purchase(
        &self,
        lock: &UserLock,
        item: PurchaseType,
        price: u64,
    ) -> Result<Debit, RewardError> {
        let user = lock.user();
        let previous_score = self.scores.read(|l| l.entry(user)).await;
        let previous_state = self.purchases.read(|r| r.state(user, item)).await;

        self.purchases.update(|r| r.record_purchase(user, item)).await?;
        let debit = match self.scores.update(|l| l.debit(user, price)).await {
            Ok(debit) => debit,
            Err(e) => {
                self.purchases
                    .update(|r| r.restore(user, item, previous_state))
                    .await;
                return Err(e.into());
            }
        };

        let written = match self.scores.flush().await {
            Ok(()) => self.purchases.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            tracing::error!(
                user = %user,
                item = %item,
                error = %e,
                "purchase write failed, rolling back"
            );
            self.scores.revert(|l| l.restore(user, previous_score)).await;
            self.purchases
                .revert(|r| r.restore(user, item, previous_state))
                .await;
            return Err(e.into());
        }

        tracing::info!(
            user = %user,
            item = %item,
            price,
            balance = debit.balance,
            "purchase committed"
        );
        Ok(debit)
    }

    async fn credit_locked(&self, lock: &UserLock, amount: u64) -> Result<u64, RewardError> {
        let user = lock.user();
        let previous = self.scores.read(|l| l.entry(user)).await;
        let balance = self.scores.update(|l| l.credit(user, amount)).await?;
        self.commit_scores(user, previous).await?;
        Ok(balance)
    }

    async fn debit_locked(&self, lock: &UserLock, amount: u64) -> Result<Debit, RewardError> {
        let user = lock.user();
        let previous = self.scores.read(|l| l.entry(user)).await;
        let debit = self.scores.update(|l| l.debit(user, amount)).await?;
        self.commit_scores(user, previous).await?;
        Ok(debit)
    }

    async fn commit_scores(&self, user: UserId, previous: Option<u64>) -> Result<(), DbError> {
        if let Err(e) = self.scores.flush().await {
            tracing::error!(user = %user, error = %e, "scores write failed, rolling back");
            self.scores.revert(|l| l.restore(user, previous)).await;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const USER: UserId = UserId::new(9);

    async fn open_temp() -> (tempfile::TempDir, RewardStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RewardStore::open(
            dir.path().join("scores.json"),
            dir.path().join("purchases.json"),
        )
        .await
        .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn credit_and_clamped_debit() {
        let (_dir, store) = open_temp().await;
        assert_eq!(store.credit(USER, 30).await.unwrap(), 30);
        let debit = store.debit(USER, 50).await.unwrap();
        assert_eq!(debit.removed, 30);
        assert_eq!(store.score(USER).await, 0);
    }

    #[tokio::test]
    async fn zero_credit_is_rejected() {
        let (_dir, store) = open_temp().await;
        let result = store.credit(USER, 0).await;
        assert!(matches!(
            result,
            Err(RewardError::Ledger(LedgerError::ZeroAmount))
        ));
    }

    #[tokio::test]
    async fn purchase_lifecycle() {
        let (_dir, store) = open_temp().await;
        store.credit(USER, 3_000).await.unwrap();

        let lock = store.lock_user(USER).await;
        store
            .begin_purchase(&lock, PurchaseType::CustomRole, 2_500)
            .await
            .unwrap();
        assert_eq!(
            store.pending_purchases().await,
            vec![(USER, PurchaseType::CustomRole)]
        );

        let debit = store
            .commit_purchase(&lock, PurchaseType::CustomRole, 2_500)
            .await
            .unwrap();
        assert_eq!(debit.balance, 500);
        assert!(store.has_purchased(USER, PurchaseType::CustomRole).await);
        assert!(store.pending_purchases().await.is_empty());
    }

    #[tokio::test]
    async fn begin_requires_funds() {
        let (_dir, store) = open_temp().await;
        store.credit(USER, 10).await.unwrap();
        let lock = store.lock_user(USER).await;
        let result = store
            .begin_purchase(&lock, PurchaseType::Promotion, 10_000)
            .await;
        assert!(matches!(
            result,
            Err(RewardError::Ledger(LedgerError::InsufficientBalance { .. }))
        ));
        assert!(store.pending_purchases().await.is_empty());
    }

    #[tokio::test]
    async fn abandon_clears_intent() {
        let (_dir, store) = open_temp().await;
        store.credit(USER, 2_500).await.unwrap();
        let lock = store.lock_user(USER).await;
        store
            .begin_purchase(&lock, PurchaseType::CustomRole, 2_500)
            .await
            .unwrap();
        store
            .abandon_purchase(&lock, PurchaseType::CustomRole)
            .await
            .unwrap();
        assert!(store.pending_purchases().await.is_empty());
        assert_eq!(store.score(USER).await, 2_500);
    }
}
