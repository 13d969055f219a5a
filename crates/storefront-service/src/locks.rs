//! # Per-User Locks
//!
//! Every unit of work that reads a user's balance, cart or grants and then
//! writes them holds that user's lock for its whole duration.
//!
//! ```text
//! checkout(alice) ──► lock(alice) ── read cart ─ begin ─ debit ─ merge ─ commit ── unlock
//! buy(alice)      ──► lock(alice) ············ waits ············ ──► runs after
//! checkout(bob)   ──► lock(bob)   ── runs concurrently with alice
//! ```
//!
//! The lock serializes one user's requests inside this process. The
//! conditional debit and the UNIQUE keys still hold across processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Map of user uuid to async mutex.
#[derive(Debug, Default, Clone)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        UserLocks::default()
    }

    /// Waits for and takes the user's lock.
    pub async fn acquire(&self, user_uuid: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // Drop entries nobody holds or waits on
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(user_uuid.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Takes two users' locks, always the smaller uuid first, so two
    /// opposite transfers cannot deadlock.
    pub async fn acquire_pair(
        &self,
        first: &str,
        second: &str,
    ) -> (OwnedMutexGuard<()>, OwnedMutexGuard<()>) {
        let (low, high) = if first <= second {
            (first, second)
        } else {
            (second, first)
        };
        let low = self.acquire(low).await;
        let high = self.acquire(high).await;
        (low, high)
    }

    /// Number of users with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let locks = UserLocks::new();
        let guard = locks.acquire("alice").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("alice").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let locks = UserLocks::new();
        let _alice = locks.acquire("alice").await;

        tokio::time::timeout(Duration::from_millis(100), locks.acquire("bob"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_opposite_pairs_do_not_deadlock() {
        let locks = UserLocks::new();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let locks = locks.clone();
                tokio::spawn(async move {
                    let (a, b) = if i % 2 == 0 { ("alice", "bob") } else { ("bob", "alice") };
                    let _guards = locks.acquire_pair(a, b).await;
                    tokio::time::sleep(Duration::from_millis(2)).await;
                })
            })
            .collect();

        tokio::time::timeout(Duration::from_secs(5), async {
            for task in tasks {
                task.await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = UserLocks::new();
        drop(locks.acquire("alice").await);
        drop(locks.acquire("bob").await);

        // acquiring prunes every entry without a holder
        let _carol = locks.acquire("carol").await;
        assert_eq!(locks.len(), 1);
    }
}
