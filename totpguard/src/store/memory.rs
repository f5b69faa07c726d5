use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;

use super::{
    Account, AccountStore, AttemptStore, IdentityDirectory, SecretStore, StoredSecret,
    ValidationAttempt,
};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct AccountRow {
    secret: StoredSecret,
    enabled: bool,
}

/// In-process implementation of every storage collaborator.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: DashMap<String, AccountRow>,
    attempts: RwLock<Vec<ValidationAttempt>>,
    capabilities: DashMap<String, FxHashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capabilities(&self, identity: &str) -> Vec<String> {
        let mut caps: Vec<String> = self
            .capabilities
            .get(identity)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        caps.sort();
        caps
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.read().len()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn secret(&self, identity: &str) -> Result<Option<StoredSecret>, StoreError> {
        Ok(self.accounts.get(identity).map(|row| row.secret.clone()))
    }

    async fn create_account(&self, identity: &str, secret: StoredSecret) -> Result<(), StoreError> {
        match self.accounts.entry(identity.to_owned()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(identity.to_owned())),
            Entry::Vacant(slot) => {
                slot.insert(AccountRow {
                    secret,
                    enabled: true,
                });
                Ok(())
            }
        }
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn is_enabled(&self, identity: &str) -> Result<Option<bool>, StoreError> {
        Ok(self.accounts.get(identity).map(|row| row.enabled))
    }

    async fn set_enabled(&self, identity: &str, enabled: bool) -> Result<bool, StoreError> {
        Ok(match self.accounts.get_mut(identity) {
            Some(mut row) => {
                row.enabled = enabled;
                true
            }
            None => false,
        })
    }

    async fn account(&self, identity: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(identity).map(|row| Account {
            identity: row.key().clone(),
            enabled: row.enabled,
            encrypted: row.secret.encrypted,
        }))
    }

    async fn accounts(&self, limit: Option<usize>) -> Result<Vec<Account>, StoreError> {
        let mut all: Vec<Account> = self
            .accounts
            .iter()
            .map(|row| Account {
                identity: row.key().clone(),
                enabled: row.enabled,
                encrypted: row.secret.encrypted,
            })
            .collect();
        all.sort_by(|a, b| a.identity.cmp(&b.identity));
        if let Some(limit) = limit {
            all.truncate(limit);
        }
        Ok(all)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn count_failed(&self, identity: &str, step: i64) -> Result<u32, StoreError> {
        let attempts = self.attempts.read();
        let count = attempts
            .iter()
            .filter(|a| a.identity == identity && a.step == step && !a.succeeded)
            .count();
        Ok(count as u32)
    }

    async fn append(&self, attempt: ValidationAttempt) -> Result<(), StoreError> {
        self.attempts.write().push(attempt);
        Ok(())
    }

    async fn recent(&self, limit: Option<usize>) -> Result<Vec<ValidationAttempt>, StoreError> {
        let attempts = self.attempts.read();
        let newest_first = attempts.iter().rev().cloned();
        Ok(match limit {
            Some(limit) => newest_first.take(limit).collect(),
            None => newest_first.collect(),
        })
    }
}

#[async_trait]
impl IdentityDirectory for MemoryStore {
    async fn grant_capability(&self, identity: &str, capability: &str) -> Result<(), StoreError> {
        self.capabilities
            .entry(identity.to_owned())
            .or_default()
            .insert(capability.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn secret(value: &str) -> StoredSecret {
        StoredSecret {
            value: value.into(),
            encrypted: false,
        }
    }

    fn attempt(identity: &str, step: i64, succeeded: bool) -> ValidationAttempt {
        ValidationAttempt {
            id: Uuid::new_v4(),
            accessed_at: step * 30_000,
            step,
            identity: identity.into(),
            account_enabled: true,
            succeeded,
        }
    }

    #[tokio::test]
    async fn create_is_exclusive() {
        let store = MemoryStore::new();
        store.create_account("alice", secret("AAAA")).await.unwrap();

        let err = store.create_account("alice", secret("BBBB")).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict("alice".into()));
        assert_eq!(store.secret("alice").await.unwrap().unwrap().value, "AAAA");
        assert_eq!(store.is_enabled("alice").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn set_enabled_reports_missing_accounts() {
        let store = MemoryStore::new();
        assert!(!store.set_enabled("ghost", false).await.unwrap());

        store.create_account("bob", secret("AAAA")).await.unwrap();
        assert!(store.set_enabled("bob", false).await.unwrap());
        assert_eq!(store.is_enabled("bob").await.unwrap(), Some(false));
        assert_eq!(store.is_enabled("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn accounts_are_sorted_and_limited() {
        let store = MemoryStore::new();
        for name in ["carol", "alice", "bob"] {
            store.create_account(name, secret("AAAA")).await.unwrap();
        }
        let names: Vec<_> = store
            .accounts(Some(2))
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.identity)
            .collect();
        assert_eq!(names, ["alice", "bob"]);
    }

    #[tokio::test]
    async fn counts_only_failures_for_the_exact_key() {
        let store = MemoryStore::new();
        store.append(attempt("alice", 10, false)).await.unwrap();
        store.append(attempt("alice", 10, false)).await.unwrap();
        store.append(attempt("alice", 10, true)).await.unwrap();
        store.append(attempt("alice", 11, false)).await.unwrap();
        store.append(attempt("bob", 10, false)).await.unwrap();

        assert_eq!(store.count_failed("alice", 10).await.unwrap(), 2);
        assert_eq!(store.count_failed("alice", 11).await.unwrap(), 1);
        assert_eq!(store.count_failed("carol", 10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn recent_is_newest_first() {
        let store = MemoryStore::new();
        for step in 1..=3 {
            store.append(attempt("alice", step, false)).await.unwrap();
        }
        let steps: Vec<_> = store
            .recent(Some(2))
            .await
            .unwrap()
            .iter()
            .map(|a| a.step)
            .collect();
        assert_eq!(steps, [3, 2]);
        assert_eq!(store.recent(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn capabilities_accumulate() {
        let store = MemoryStore::new();
        store.grant_capability("alice", "B").await.unwrap();
        store.grant_capability("alice", "A").await.unwrap();
        store.grant_capability("alice", "A").await.unwrap();
        assert_eq!(store.capabilities("alice"), ["A", "B"]);
    }
}
