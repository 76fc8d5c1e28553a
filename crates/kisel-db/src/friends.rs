//! The friend store: a durable, directed adjacency list.
//!
//! Each owner maps to an insertion-ordered list of friend ids with no
//! duplicates. `owner -> friend` says nothing about `friend -> owner`.
//!
//! Every mutation runs under the owner's [`KeyedLocks`] slot, is applied in
//! memory, and is flushed as a whole document before returning. If the
//! flush fails the change is rolled back in memory and on disk, and the
//! caller gets [`FriendError::Persistence`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use kisel_types::UserId;

use crate::document::JsonDocument;
use crate::error::DbError;
use crate::locks::KeyedLocks;

/// The persisted shape: owner id to friend ids.
pub type FriendGraph = BTreeMap<UserId, Vec<UserId>>;

/// Errors from friend list mutations.
#[derive(Debug, thiserror::Error)]
pub enum FriendError {
    /// The target is already on the owner's list.
    #[error("{friend} is already a friend of {owner}")]
    AlreadyFriends {
        /// The list owner.
        owner: UserId,
        /// The would-be friend.
        friend: UserId,
    },

    /// The target is not on the owner's list.
    #[error("{friend} is not a friend of {owner}")]
    NotFriends {
        /// The list owner.
        owner: UserId,
        /// The missing friend.
        friend: UserId,
    },

    /// An owner tried to add themselves.
    #[error("{0} cannot add themselves as a friend")]
    SelfFriend(UserId),

    /// The document could not be saved; the change was rolled back.
    #[error(transparent)]
    Persistence(#[from] DbError),
}

/// Durable friend lists for every owner.
#[derive(Debug)]
pub struct FriendStore {
    doc: JsonDocument<FriendGraph>,
    locks: KeyedLocks<UserId>,
}

impl FriendStore {
    /// Load the friend document from `path` (empty if absent).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, DbError> {
        let doc = JsonDocument::open(path).await?;
        let store = Self {
            doc,
            locks: KeyedLocks::new(),
        };
        let (owners, edges) = store
            .doc
            .read(|g| (g.len(), g.values().map(Vec::len).sum::<usize>()))
            .await;
        tracing::info!(owners, edges, "friend store loaded");
        Ok(store)
    }

    /// Append `friend` to `owner`'s list.
    ///
    /// # Errors
    ///
    /// [`FriendError::SelfFriend`] when `owner == friend`,
    /// [`FriendError::AlreadyFriends`] when already present, and
    /// [`FriendError::Persistence`] when the save fails.
    pub async fn add(&self, owner: UserId, friend: UserId) -> Result<(), FriendError> {
        if owner == friend {
            return Err(FriendError::SelfFriend(owner));
        }

        let _guard = self.locks.lock(owner).await;
        let previous = self.snapshot(owner).await;
        if previous.as_ref().is_some_and(|list| list.contains(&friend)) {
            return Err(FriendError::AlreadyFriends { owner, friend });
        }

        self.doc
            .update(|g| g.entry(owner).or_default().push(friend))
            .await;
        self.commit(owner, previous).await?;

        tracing::info!(owner = %owner, friend = %friend, "friend added");
        Ok(())
    }

    /// Remove `friend` from `owner`'s list.
    ///
    /// # Errors
    ///
    /// [`FriendError::NotFriends`] when absent (nothing changes) and
    /// [`FriendError::Persistence`] when the save fails.
    pub async fn remove(&self, owner: UserId, friend: UserId) -> Result<(), FriendError> {
        if self.remove_entry(owner, friend).await? {
            tracing::info!(owner = %owner, friend = %friend, "friend removed");
            Ok(())
        } else {
            Err(FriendError::NotFriends { owner, friend })
        }
    }

    /// Remove a friend whose identity no longer resolves.
    ///
    /// Behaves like [`remove`](Self::remove) but an absent entry is not an
    /// error. Returns whether an entry was removed.
    ///
    /// # Errors
    ///
    /// [`FriendError::Persistence`] when the save fails.
    pub async fn prune_unresolvable(
        &self,
        owner: UserId,
        friend: UserId,
    ) -> Result<bool, FriendError> {
        let removed = self.remove_entry(owner, friend).await?;
        if removed {
            tracing::warn!(owner = %owner, friend = %friend, "pruned unresolvable friend");
        }
        Ok(removed)
    }

    /// `owner`'s friends in insertion order (empty if none).
    pub async fn list(&self, owner: UserId) -> Vec<UserId> {
        self.snapshot(owner).await.unwrap_or_default()
    }

    /// Number of friends on `owner`'s list.
    pub async fn len(&self, owner: UserId) -> usize {
        self.doc.read(|g| g.get(&owner).map_or(0, Vec::len)).await
    }

    /// Whether `friend` is on `owner`'s list.
    pub async fn contains(&self, owner: UserId, friend: UserId) -> bool {
        self.doc
            .read(|g| g.get(&owner).is_some_and(|list| list.contains(&friend)))
            .await
    }

    /// Owners with at least one friend.
    pub async fn owners(&self) -> Vec<UserId> {
        self.doc
            .read(|g| {
                g.iter()
                    .filter(|(_, list)| !list.is_empty())
                    .map(|(owner, _)| *owner)
                    .collect()
            })
            .await
    }

    async fn remove_entry(&self, owner: UserId, friend: UserId) -> Result<bool, FriendError> {
        let _guard = self.locks.lock(owner).await;
        let previous = self.snapshot(owner).await;
        if !previous.as_ref().is_some_and(|list| list.contains(&friend)) {
            return Ok(false);
        }

        self.doc
            .update(|g| {
                if let Some(list) = g.get_mut(&owner) {
                    list.retain(|id| *id != friend);
                    if list.is_empty() {
                        g.remove(&owner);
                    }
                }
            })
            .await;
        self.commit(owner, previous).await?;
        Ok(true)
    }

    async fn snapshot(&self, owner: UserId) -> Option<Vec<UserId>> {
        self.doc.read(|g| g.get(&owner).cloned()).await
    }

    /// Flush, restoring `owner`'s previous list if the write fails.
    async fn commit(&self, owner: UserId, previous: Option<Vec<UserId>>) -> Result<(), DbError> {
        if let Err(e) = self.doc.flush().await {
            tracing::error!(owner = %owner, error = %e, "friend store write failed, rolling back");
            self.doc
                .revert(|g| match previous {
                    Some(list) => {
                        g.insert(owner, list);
                    }
                    None => {
                        g.remove(&owner);
                    }
                })
                .await;
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const OWNER: UserId = UserId::new(100);
    const F1: UserId = UserId::new(1);
    const F2: UserId = UserId::new(2);
    const F3: UserId = UserId::new(3);

    async fn open_temp() -> (tempfile::TempDir, FriendStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FriendStore::open(dir.path().join("friends.json"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn add_preserves_insertion_order() {
        let (_dir, store) = open_temp().await;
        for friend in [F3, F1, F2] {
            store.add(OWNER, friend).await.unwrap();
        }
        assert_eq!(store.list(OWNER).await, vec![F3, F1, F2]);
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected() {
        let (_dir, store) = open_temp().await;
        store.add(OWNER, F1).await.unwrap();
        let second = store.add(OWNER, F1).await;
        assert!(matches!(second, Err(FriendError::AlreadyFriends { .. })));
        assert_eq!(store.len(OWNER).await, 1);
    }

    #[tokio::test]
    async fn self_add_is_rejected() {
        let (_dir, store) = open_temp().await;
        let result = store.add(OWNER, OWNER).await;
        assert!(matches!(result, Err(FriendError::SelfFriend(id)) if id == OWNER));
        assert!(store.list(OWNER).await.is_empty());
    }

    #[tokio::test]
    async fn relationship_is_directed() {
        let (_dir, store) = open_temp().await;
        store.add(OWNER, F1).await.unwrap();
        assert!(store.contains(OWNER, F1).await);
        assert!(!store.contains(F1, OWNER).await);
    }

    #[tokio::test]
    async fn remove_absent_is_not_found_and_unchanged() {
        let (_dir, store) = open_temp().await;
        store.add(OWNER, F1).await.unwrap();
        let result = store.remove(OWNER, F2).await;
        assert!(matches!(result, Err(FriendError::NotFriends { .. })));
        assert_eq!(store.list(OWNER).await, vec![F1]);
    }

    #[tokio::test]
    async fn prune_is_silent_when_absent() {
        let (_dir, store) = open_temp().await;
        store.add(OWNER, F1).await.unwrap();
        assert!(store.prune_unresolvable(OWNER, F1).await.unwrap());
        assert!(!store.prune_unresolvable(OWNER, F1).await.unwrap());
        assert!(store.owners().await.is_empty());
    }

    #[tokio::test]
    async fn failed_write_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        let store = FriendStore::open(blocker.join("friends.json")).await.unwrap();
        std::fs::write(&blocker, b"not a directory").unwrap();

        let result = store.add(OWNER, F1).await;
        assert!(matches!(result, Err(FriendError::Persistence(_))));
        assert!(store.list(OWNER).await.is_empty());
    }
}
