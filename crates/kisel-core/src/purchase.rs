//! One-time purchases: tier promotion and custom roles.
//!
//! Each purchase runs entirely under the buyer's reward lock:
//!
//! 1. check availability and balance,
//! 2. persist a `pending` intent,
//! 3. perform the external role action,
//! 4. debit and mark the item purchased.
//!
//! If step 3 fails the intent is dropped and nothing else changes. If step 4
//! fails after the role was granted, the intent stays on disk, the failure is
//! logged at error level, and the caller gets
//! [`PurchaseError::LedgerWriteAfterGrant`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use validator::Validate;

use kisel_db::{RewardError, RewardStore, UserLock};
use kisel_ledger::LedgerError;
use kisel_types::{PurchaseType, RoleColor, RoleId, UserId};

use crate::config::{CatalogConfig, MAX_ROLE_NAME_LEN};
use crate::ports::{ExternalError, RoleAuthority};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the purchase workflow.
#[derive(Debug, thiserror::Error)]
pub enum PurchaseError {
    /// The buyer cannot afford the item.
    #[error("insufficient balance for {user}: need {required}, have {available}")]
    InsufficientBalance {
        /// The buyer.
        user: UserId,
        /// The item price.
        required: u64,
        /// The buyer's balance.
        available: u64,
    },

    /// The item was already bought.
    #[error("{user} already purchased {item}")]
    AlreadyPurchased {
        /// The buyer.
        user: UserId,
        /// The item.
        item: PurchaseType,
    },

    /// An earlier attempt never committed and needs manual reconciliation.
    #[error("{user} has an unreconciled {item} purchase pending")]
    PurchasePending {
        /// The buyer.
        user: UserId,
        /// The item.
        item: PurchaseType,
    },

    /// The buyer does not hold the role the promotion starts from.
    #[error("{user} does not hold prerequisite role {role}")]
    PrerequisiteMissing {
        /// The buyer.
        user: UserId,
        /// The required role.
        role: RoleId,
    },

    /// The item is not configured on this deployment.
    #[error("{0} is not available")]
    CatalogUnavailable(PurchaseType),

    /// The requested role name is empty or too long.
    #[error("invalid role name: {0}")]
    InvalidName(String),

    /// The platform refused the role action. Nothing was charged.
    #[error("{item} role action failed: {source}")]
    ExternalActionFailed {
        /// The item.
        item: PurchaseType,
        /// The platform error.
        source: ExternalError,
    },

    /// The role was granted but the charge could not be saved.
    #[error("{item} granted to {user} but the ledger write failed: {source}")]
    LedgerWriteAfterGrant {
        /// The buyer.
        user: UserId,
        /// The item.
        item: PurchaseType,
        /// The storage error.
        source: RewardError,
    },

    /// Storage failed before any external action.
    #[error(transparent)]
    Reward(RewardError),
}

impl From<RewardError> for PurchaseError {
    fn from(e: RewardError) -> Self {
        match e {
            RewardError::Ledger(LedgerError::InsufficientBalance {
                user,
                required,
                available,
            }) => Self::InsufficientBalance {
                user,
                required,
                available,
            },
            RewardError::Ledger(LedgerError::AlreadyPurchased { user, item }) => {
                Self::AlreadyPurchased { user, item }
            }
            RewardError::Ledger(LedgerError::PurchasePending { user, item }) => {
                Self::PurchasePending { user, item }
            }
            other => Self::Reward(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and receipts
// ---------------------------------------------------------------------------

/// A custom role as typed by the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
pub struct CustomRoleRequest {
    /// Display name of the new role.
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Optional `#RRGGBB` colour.
    #[serde(default)]
    pub color: Option<String>,
}

/// A validated custom role ready to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomRoleOrder {
    name: String,
    color: RoleColor,
    random_color: bool,
}

impl CustomRoleOrder {
    /// The trimmed role name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The colour the role will be created with.
    pub const fn color(&self) -> RoleColor {
        self.color
    }

    /// Whether the colour was picked at random.
    pub const fn random_color(&self) -> bool {
        self.random_color
    }
}

impl CustomRoleRequest {
    /// Validate the name and settle the colour.
    ///
    /// The name is trimmed and must be 1..=`max_name_len` characters. A
    /// missing or malformed colour is replaced by a uniformly random one.
    ///
    /// # Errors
    ///
    /// [`PurchaseError::InvalidName`] for an empty or overlong name.
    pub fn into_order(
        self,
        max_name_len: usize,
        rng: &mut impl rand::Rng,
    ) -> Result<CustomRoleOrder, PurchaseError> {
        let trimmed = Self {
            name: self.name.trim().to_owned(),
            color: self.color,
        };
        if let Err(e) = trimmed.validate() {
            return Err(PurchaseError::InvalidName(e.to_string()));
        }
        let limit = max_name_len.min(MAX_ROLE_NAME_LEN);
        let chars = trimmed.name.chars().count();
        if chars > limit {
            return Err(PurchaseError::InvalidName(format!(
                "name is {chars} characters, limit is {limit}"
            )));
        }

        let parsed = trimmed.color.as_deref().and_then(RoleColor::parse_hex);
        let (color, random_color) = match parsed {
            Some(color) => (color, false),
            None => (
                RoleColor::from_low_bits(rng.random_range(0..=RoleColor::MAX)),
                true,
            ),
        };
        Ok(CustomRoleOrder {
            name: trimmed.name,
            color,
            random_color,
        })
    }
}

/// Proof of a completed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    /// The buyer.
    pub user: UserId,
    /// The item bought.
    pub item: PurchaseType,
    /// Points charged.
    pub price: u64,
    /// Balance after the charge.
    pub balance: u64,
    /// The role the buyer now holds.
    pub role: RoleId,
    /// Colour of a custom role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<RoleColor>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Runs purchases against the reward store and the platform.
#[derive(Debug)]
pub struct PurchaseWorkflow<A> {
    store: Arc<RewardStore>,
    authority: A,
    catalog: CatalogConfig,
}

impl<A: RoleAuthority> PurchaseWorkflow<A> {
    /// Create the workflow.
    pub const fn new(store: Arc<RewardStore>, authority: A, catalog: CatalogConfig) -> Self {
        Self {
            store,
            authority,
            catalog,
        }
    }

    /// The configured catalog.
    pub const fn catalog(&self) -> &CatalogConfig {
        &self.catalog
    }

    /// Buy the tier promotion for `user`.
    ///
    /// # Errors
    ///
    /// [`PurchaseError::CatalogUnavailable`] when no roles are configured,
    /// the ledger errors listed on [`PurchaseError`], and
    /// [`PurchaseError::PrerequisiteMissing`] when `user` lacks the starting
    /// role.
    pub async fn buy_promotion(&self, user: UserId) -> Result<Receipt, PurchaseError> {
        let item = PurchaseType::Promotion;
        let (from, to) = self
            .catalog
            .promotion
            .roles()
            .ok_or(PurchaseError::CatalogUnavailable(item))?;
        let price = self.catalog.promotion.price;

        let lock = self.store.lock_user(user).await;
        self.store.ensure_purchasable(&lock, item, price).await?;
        let holds = self
            .authority
            .holds_role(user, from)
            .await
            .map_err(|source| PurchaseError::ExternalActionFailed { item, source })?;
        if !holds {
            return Err(PurchaseError::PrerequisiteMissing { user, role: from });
        }

        self.store.begin_purchase(&lock, item, price).await?;
        if let Err(source) = self.authority.exchange_role(user, from, to).await {
            self.abandon(&lock, item, &source).await;
            return Err(PurchaseError::ExternalActionFailed { item, source });
        }

        let balance = self.commit(&lock, item, price).await?;
        Ok(Receipt {
            user,
            item,
            price,
            balance,
            role: to,
            color: None,
        })
    }

    /// Buy a custom role for `user`.
    ///
    /// # Errors
    ///
    /// The ledger errors listed on [`PurchaseError`], or
    /// [`PurchaseError::ExternalActionFailed`] if the role could not be
    /// created or granted.
    pub async fn buy_custom_role(
        &self,
        user: UserId,
        order: &CustomRoleOrder,
    ) -> Result<Receipt, PurchaseError> {
        let item = PurchaseType::CustomRole;
        let price = self.catalog.custom_role.price;

        let lock = self.store.lock_user(user).await;
        self.store.begin_purchase(&lock, item, price).await?;

        let role = match self
            .authority
            .create_named_resource(order.name(), order.color())
            .await
        {
            Ok(role) => role,
            Err(source) => {
                self.abandon(&lock, item, &source).await;
                return Err(PurchaseError::ExternalActionFailed { item, source });
            }
        };
        if let Err(source) = self.authority.grant(user, role).await {
            tracing::warn!(user = %user, role = %role, "created role left without an owner");
            self.abandon(&lock, item, &source).await;
            return Err(PurchaseError::ExternalActionFailed { item, source });
        }

        let balance = self.commit(&lock, item, price).await?;
        Ok(Receipt {
            user,
            item,
            price,
            balance,
            role,
            color: Some(order.color()),
        })
    }

    async fn abandon(&self, lock: &UserLock, item: PurchaseType, cause: &ExternalError) {
        let user = lock.user();
        tracing::warn!(
            user = %user,
            item = %item,
            error = %cause,
            "role action failed, nothing charged"
        );
        if let Err(e) = self.store.abandon_purchase(lock, item).await {
            tracing::error!(
                user = %user,
                item = %item,
                error = %e,
                "could not clear purchase intent; it stays pending"
            );
        }
    }

    async fn commit(
        &self,
        lock: &UserLock,
        item: PurchaseType,
        price: u64,
    ) -> Result<u64, PurchaseError> {
        let user = lock.user();
        match self.store.commit_purchase(lock, item, price).await {
            Ok(debit) => Ok(debit.balance),
            Err(source) => {
                tracing::error!(
                    user = %user,
                    item = %item,
                    price,
                    error = %source,
                    "role granted but ledger write failed; reconcile manually"
                );
                Err(PurchaseError::LedgerWriteAfterGrant { user, item, source })
            }
        }
    }
}
