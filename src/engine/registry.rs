use crate::core::error::{LedgerError, LedgerResult};
use crate::core::group::{Group, GroupId};
use crate::core::user::{User, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Id-keyed store of users and groups.
///
/// Registration is append-only. Each user and each group sits behind its
/// own mutex, so work on different groups (or on disjoint user pairs) runs
/// in parallel while work on one group is serialised.
#[derive(Debug, Default)]
pub struct Registry {
    users: RwLock<HashMap<UserId, Arc<Mutex<User>>>>,
    groups: RwLock<HashMap<GroupId, Arc<Mutex<Group>>>>,
}

/// Lock `mutex`, recovering the data if a previous holder panicked.
///
/// Every mutation validates before it writes, so a poisoned lock still
/// guards consistent state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_user(&self, user: User) -> LedgerResult<()> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(user.id()) {
            return Err(LedgerError::DuplicateUser(user.id().clone()));
        }
        users.insert(user.id().clone(), Arc::new(Mutex::new(user)));
        Ok(())
    }

    pub fn user(&self, id: &UserId) -> LedgerResult<Arc<Mutex<User>>> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownUser(id.clone()))
    }

    /// Fail on the first id that is not registered.
    pub fn ensure_users<'a>(&self, ids: impl IntoIterator<Item = &'a UserId>) -> LedgerResult<()> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        match ids.into_iter().find(|id| !users.contains_key(*id)) {
            Some(missing) => Err(LedgerError::UnknownUser(missing.clone())),
            None => Ok(()),
        }
    }

    /// Handles for `ids`, deduplicated and sorted by id.
    ///
    /// Locking the returned handles in order never deadlocks against another
    /// caller doing the same.
    pub fn users_in_lock_order<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a UserId>,
    ) -> LedgerResult<Vec<(UserId, Arc<Mutex<User>>)>> {
        let mut ids: Vec<&UserId> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        ids.into_iter()
            .map(|id| Ok((id.clone(), self.user(id)?)))
            .collect()
    }

    pub fn register_group(&self, group: Group) -> LedgerResult<()> {
        self.ensure_users(group.members())?;
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        if groups.contains_key(group.id()) {
            return Err(LedgerError::DuplicateGroup(group.id().clone()));
        }
        groups.insert(group.id().clone(), Arc::new(Mutex::new(group)));
        Ok(())
    }

    pub fn group(&self, id: &GroupId) -> LedgerResult<Arc<Mutex<Group>>> {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownGroup(id.clone()))
    }

    /// Copies of every user, sorted by id.
    ///
    /// All user locks are held together while copying, so no individual
    /// balance is captured on one side of a pair only.
    pub fn users(&self) -> Vec<User> {
        let mut handles: Vec<(UserId, Arc<Mutex<User>>)> = self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, user)| (id.clone(), Arc::clone(user)))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));
        let guards: Vec<MutexGuard<'_, User>> = handles.iter().map(|(_, u)| lock(u)).collect();
        guards.iter().map(|user| (**user).clone()).collect()
    }

    /// Copies of every group, sorted by id.
    pub fn groups(&self) -> Vec<Group> {
        let handles: Vec<Arc<Mutex<Group>>> = self
            .groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let mut groups: Vec<Group> = handles.iter().map(|g| lock(g).clone()).collect();
        groups.sort_by(|a, b| a.id().cmp(b.id()));
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        registry
            .register_user(User::new(UserId::new("A"), "Alice"))
            .unwrap();

        let alice = registry.user(&UserId::new("A")).unwrap();
        assert_eq!(lock(&alice).name(), "Alice");
        assert!(matches!(
            registry.user(&UserId::new("B")),
            Err(LedgerError::UnknownUser(_))
        ));
    }

    #[test]
    fn test_duplicate_user_rejected() {
        let registry = Registry::new();
        registry
            .register_user(User::new(UserId::new("A"), "Alice"))
            .unwrap();
        let err = registry
            .register_user(User::new(UserId::new("A"), "Another Alice"))
            .unwrap_err();
        assert_eq!(err, LedgerError::DuplicateUser(UserId::new("A")));
        assert_eq!(lock(&registry.user(&UserId::new("A")).unwrap()).name(), "Alice");
    }

    #[test]
    fn test_group_members_must_be_registered() {
        let registry = Registry::new();
        registry
            .register_user(User::new(UserId::new("A"), "Alice"))
            .unwrap();
        let group = Group::with_members(
            GroupId::new("G"),
            "Trip",
            [UserId::new("A"), UserId::new("B")],
        );
        assert_eq!(
            registry.register_group(group),
            Err(LedgerError::UnknownUser(UserId::new("B")))
        );
        assert!(registry.group(&GroupId::new("G")).is_err());
    }

    #[test]
    fn test_lock_order_sorted_and_deduplicated() {
        let registry = Registry::new();
        for id in ["C", "A", "B"] {
            registry.register_user(User::new(UserId::new(id), id)).unwrap();
        }
        let ids = [UserId::new("C"), UserId::new("A"), UserId::new("C")];
        let ordered = registry.users_in_lock_order(ids.iter()).unwrap();
        let names: Vec<&str> = ordered.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }
}
