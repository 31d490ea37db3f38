//! Per-sha256 serialization for chain-of-custody appends and analysis
//! writes (§5: "concurrent writers to the same sha256 must serialize").
//!
//! A `DashMap`-backed lock table keyed by sha256: `dashmap` gives lock-free
//! concurrent access to the table itself, and the `tokio::sync::Mutex` each
//! entry holds stays held across the `.await` points in a write.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct CustodyLockTable {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CustodyLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the per-sha256 lock, creating its entry on first use.
    pub async fn lock(&self, sha256: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(sha256.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serializes_concurrent_writers_to_the_same_sha256() {
        let table = Arc::new(CustodyLockTable::new());
        let counter = Arc::new(tokio::sync::Mutex::new(0u32));
        let sha = "e".repeat(64);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let table = table.clone();
            let counter = counter.clone();
            let sha = sha.clone();
            handles.push(tokio::spawn(async move {
                let _guard = table.lock(&sha).await;
                let mut c = counter.lock().await;
                let before = *c;
                tokio::task::yield_now().await;
                *c = before + 1;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*counter.lock().await, 10);
    }

    #[tokio::test]
    async fn different_sha256_keys_do_not_share_a_lock() {
        let table = CustodyLockTable::new();
        let guard_a = table.lock(&"a".repeat(64)).await;
        let guard_b = table.lock(&"b".repeat(64)).await;
        drop(guard_a);
        drop(guard_b);
    }
}
