use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per user id. Paths that read a user's ledger and then
/// write money hold the user's guard for the whole check-then-write.
///
/// The guard is process-local; a single service instance owns the ledger.
#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_default()
            .clone();

        lock.lock_owned().await
    }
}
