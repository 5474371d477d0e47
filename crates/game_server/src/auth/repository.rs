//! Account storage seam.

use super::account::{Account, AccountId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Failure of the storage backend itself, as opposed to a missing account.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("account storage unavailable: {0}")]
    Unavailable(String),
}

/// Source of account records.
///
/// Implementations may block on I/O; callers reach them only through the
/// account worker pool, which bounds how many lookups run at once.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Looks up an account by its unique username.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError>;
}

/// Repository held entirely in memory, keyed by username.
#[derive(Debug, Default)]
pub struct InMemoryAccountRepository {
    accounts: DashMap<String, Account>,
    next_id: AtomicU64,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account with the next free id, replacing one with the same username.
    pub fn insert(&self, username: impl Into<String>, password: impl Into<String>) -> AccountId {
        let id = AccountId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let account = Account::new(id, username, password);
        self.accounts.insert(account.username.clone(), account);
        id
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.get(username).map(|entry| entry.value().clone()))
    }
}
