//! Per-cpu serialisation of commits.
//!
//! Account uniqueness is checked against the roles already on a cpu, so two
//! edits targeting the same cpu must not interleave between validation and
//! the role write. Each coordinator owns its own registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::inventory::CpuId;

/// Registry of async locks keyed by cpu.
#[derive(Debug, Default)]
pub struct CpuLocks {
    locks: Mutex<HashMap<CpuId, Arc<AsyncMutex<()>>>>,
}

impl CpuLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `cpu_id`.
    pub async fn acquire(&self, cpu_id: CpuId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(cpu_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Take the locks for every assigned cpu in ascending id order.
    pub async fn acquire_all(
        &self,
        cpu_ids: impl IntoIterator<Item = CpuId>,
    ) -> Vec<OwnedMutexGuard<()>> {
        let mut ids: Vec<CpuId> = cpu_ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.acquire(id).await);
        }
        guards
    }
}

#[cfg(test)]
mod tests {
    //! Lock registry behaviour.

    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_cpu_is_exclusive() {
        let locks = Arc::new(CpuLocks::new());
        let guard = locks.acquire(CpuId::new(3)).await;

        let contender = Arc::clone(&locks);
        let waiting = tokio::spawn(async move {
            let _guard = contender.acquire(CpuId::new(3)).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("lock released")
            .expect("task joined");
    }

    #[tokio::test]
    async fn different_cpus_do_not_block() {
        let locks = CpuLocks::new();
        let _first = locks.acquire(CpuId::new(1)).await;
        let second = tokio::time::timeout(Duration::from_secs(1), locks.acquire(CpuId::new(2)))
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn acquire_all_deduplicates() {
        let locks = CpuLocks::new();
        let guards = locks
            .acquire_all([CpuId::new(2), CpuId::new(1), CpuId::new(2)])
            .await;
        assert_eq!(guards.len(), 2);
    }
}
