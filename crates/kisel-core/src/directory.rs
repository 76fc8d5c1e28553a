//! Friend lists resolved to profiles.
//!
//! Friends whose account is gone for good are pruned from the owner's list
//! as a side effect of listing. Transient lookup failures keep the entry and
//! show it as an unknown user.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use kisel_db::{FriendError, FriendStore};
use kisel_types::{Profile, UserId};

use crate::notify::NotifyError;
use crate::ports::IdentityResolver;

/// One line of a resolved friend list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FriendEntry {
    /// The friend's id.
    pub id: UserId,
    /// `None` when the lookup failed transiently.
    pub profile: Option<Profile>,
}

impl FriendEntry {
    /// Text to show for this friend.
    pub fn label(&self) -> &str {
        self.profile.as_ref().map_or("unknown user", Profile::label)
    }
}

/// Friend management backed by an identity resolver.
#[derive(Debug)]
pub struct FriendDirectory<R> {
    friends: Arc<FriendStore>,
    resolver: R,
    max_in_flight: usize,
}

impl<R: IdentityResolver> FriendDirectory<R> {
    /// Create the directory. `max_in_flight` is clamped to at least one.
    pub fn new(friends: Arc<FriendStore>, resolver: R, max_in_flight: usize) -> Self {
        Self {
            friends,
            resolver,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &Arc<FriendStore> {
        &self.friends
    }

    /// Add `friend` to `owner`'s list.
    ///
    /// # Errors
    ///
    /// See [`FriendStore::add`].
    pub async fn add(&self, owner: UserId, friend: UserId) -> Result<(), FriendError> {
        self.friends.add(owner, friend).await
    }

    /// Remove `friend` from `owner`'s list.
    ///
    /// # Errors
    ///
    /// See [`FriendStore::remove`].
    pub async fn remove(&self, owner: UserId, friend: UserId) -> Result<(), FriendError> {
        self.friends.remove(owner, friend).await
    }

    /// Resolve every friend of `owner`, in list order.
    ///
    /// # Errors
    ///
    /// [`NotifyError::EmptyFriendList`] when `owner` has no friends, and
    /// [`NotifyError::Friends`] if pruning a deleted account fails to save.
    pub async fn resolve_friends(&self, owner: UserId) -> Result<Vec<FriendEntry>, NotifyError> {
        let ids = self.friends.list(owner).await;
        if ids.is_empty() {
            return Err(NotifyError::EmptyFriendList(owner));
        }

        let lookups: Vec<_> = stream::iter(ids)
            .map(|id| async move { (id, self.resolver.resolve(id).await) })
            .buffered(self.max_in_flight)
            .collect()
            .await;

        let mut entries = Vec::with_capacity(lookups.len());
        for (id, lookup) in lookups {
            match lookup {
                Ok(profile) => entries.push(FriendEntry {
                    id,
                    profile: Some(profile),
                }),
                Err(e) if e.is_not_found() => {
                    self.friends.prune_unresolvable(owner, id).await?;
                }
                Err(e) => {
                    tracing::warn!(
                        owner = %owner,
                        friend = %id,
                        error = %e,
                        "friend lookup failed"
                    );
                    entries.push(FriendEntry { id, profile: None });
                }
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use crate::ports::ExternalError;

    use super::*;

    const OWNER: UserId = UserId::new(1);

    struct FakeResolver {
        answers: HashMap<UserId, Result<Profile, ExternalError>>,
    }

    impl IdentityResolver for FakeResolver {
        async fn resolve(&self, id: UserId) -> Result<Profile, ExternalError> {
            self.answers
                .get(&id)
                .cloned()
                .unwrap_or_else(|| Err(ExternalError::NotFound(id.to_string())))
        }
    }

    fn profile(id: u64, name: &str) -> Profile {
        Profile {
            id: UserId::new(id),
            name: name.to_owned(),
            display_name: None,
        }
    }

    #[tokio::test]
    async fn deleted_accounts_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FriendStore::open(dir.path().join("f.json")).await.unwrap());
        for id in [2, 3, 4] {
            store.add(OWNER, UserId::new(id)).await.unwrap();
        }

        let mut answers = HashMap::new();
        answers.insert(UserId::new(2), Ok(profile(2, "anna")));
        answers.insert(
            UserId::new(4),
            Err(ExternalError::Failed(String::from("timeout"))),
        );
        let directory = FriendDirectory::new(Arc::clone(&store), FakeResolver { answers }, 2);

        let entries = directory.resolve_friends(OWNER).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.first().map(FriendEntry::label), Some("anna"));
        assert_eq!(entries.get(1).map(FriendEntry::label), Some("unknown user"));
        assert_eq!(store.list(OWNER).await, vec![UserId::new(2), UserId::new(4)]);
    }

    #[tokio::test]
    async fn empty_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FriendStore::open(dir.path().join("f.json")).await.unwrap());
        let directory = FriendDirectory::new(
            store,
            FakeResolver {
                answers: HashMap::new(),
            },
            2,
        );
        assert!(matches!(
            directory.resolve_friends(OWNER).await,
            Err(NotifyError::EmptyFriendList(_))
        ));
    }
}
