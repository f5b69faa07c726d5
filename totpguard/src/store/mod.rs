//! Storage collaborators used by the authenticator.
//!
//! The host application owns persistence. These traits describe what the core needs from it;
//! [`MemoryStore`] is a complete in-process implementation for tests and demos.

mod memory;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CipherError, StoreError};

pub use memory::MemoryStore;

/// A secret as persisted, possibly ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSecret {
    pub value: String,
    pub encrypted: bool,
}

/// Account metadata. The secret is never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub identity: String,
    pub enabled: bool,
    pub encrypted: bool,
}

/// One audit record per validation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationAttempt {
    pub id: Uuid,
    /// Unix milliseconds.
    pub accessed_at: i64,
    pub step: i64,
    pub identity: String,
    pub account_enabled: bool,
    pub succeeded: bool,
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secret(&self, identity: &str) -> Result<Option<StoredSecret>, StoreError>;

    /// Creates an enabled account. Fails with [`StoreError::Conflict`] if one exists.
    async fn create_account(&self, identity: &str, secret: StoredSecret) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// `None` when no account exists for `identity`.
    async fn is_enabled(&self, identity: &str) -> Result<Option<bool>, StoreError>;

    /// Returns whether an account was updated.
    async fn set_enabled(&self, identity: &str, enabled: bool) -> Result<bool, StoreError>;

    async fn account(&self, identity: &str) -> Result<Option<Account>, StoreError>;

    /// Accounts ordered by identity.
    async fn accounts(&self, limit: Option<usize>) -> Result<Vec<Account>, StoreError>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Number of failed attempts recorded for exactly this identity and step.
    async fn count_failed(&self, identity: &str, step: i64) -> Result<u32, StoreError>;

    async fn append(&self, attempt: ValidationAttempt) -> Result<(), StoreError>;

    /// Newest first.
    async fn recent(&self, limit: Option<usize>) -> Result<Vec<ValidationAttempt>, StoreError>;
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn grant_capability(&self, identity: &str, capability: &str) -> Result<(), StoreError>;
}

/// Encryption at rest for secrets, provided by the host.
pub trait SecretCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, CipherError>;

    fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError>;
}
