//! Reward ledger and one-time purchase registry for Kisel.
//!
//! Users earn points for time spent in voice channels and spend them on
//! catalog items that can each be redeemed once per account. This crate
//! holds the in-memory, synchronous halves of that bookkeeping. Persistence
//! and per-user locking live in `kisel-db`.
//!
//! # Invariants
//!
//! - A score is never negative. Debits larger than the balance clamp the
//!   balance to zero and forfeit the excess; they are not errors.
//! - Credits and debits must be strictly positive.
//! - Each `(user, item)` pair reaches [`PurchaseState::Purchased`] at most
//!   once, and never leaves it.
//!
//! # Usage
//!
//! ```
//! use kisel_ledger::{PurchaseRegistry, ScoreLedger};
//! use kisel_types::{PurchaseType, UserId};
//!
//! let mut ledger = ScoreLedger::new();
//! let user = UserId::new(7);
//!
//! ledger.credit(user, 30).ok();
//! let debit = ledger.debit(user, 45).ok();
//! assert_eq!(debit.map(|d| d.removed), Some(30));
//! assert_eq!(ledger.score(user), 0);
//!
//! let mut purchases = PurchaseRegistry::new();
//! assert!(purchases.record_purchase(user, PurchaseType::CustomRole).is_ok());
//! assert!(purchases.record_purchase(user, PurchaseType::CustomRole).is_err());
//! ```
//!
//! [`PurchaseState::Purchased`]: kisel_types::PurchaseState::Purchased

pub mod ledger;
pub mod purchases;

pub use ledger::{Debit, ScoreLedger};
pub use purchases::PurchaseRegistry;

use kisel_types::{PurchaseType, UserId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when mutating the ledger or purchase registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Credit and debit amounts must be strictly positive.
    #[error("ledger amount must be non-zero")]
    ZeroAmount,

    /// The user cannot afford the requested item.
    #[error("insufficient balance for {user}: need {required}, have {available}")]
    InsufficientBalance {
        /// The user whose balance was checked.
        user: UserId,
        /// Points the operation needs.
        required: u64,
        /// Points the user holds.
        available: u64,
    },

    /// The item was already granted to this user.
    #[error("{user} already purchased {item}")]
    AlreadyPurchased {
        /// The purchasing user.
        user: UserId,
        /// The catalog item.
        item: PurchaseType,
    },

    /// A previous attempt for this item never committed and awaits
    /// reconciliation.
    #[error("{user} has an unreconciled {item} purchase pending")]
    PurchasePending {
        /// The purchasing user.
        user: UserId,
        /// The catalog item.
        item: PurchaseType,
    },
}
