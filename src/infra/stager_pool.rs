//! In-memory legacy stager pool fed by stager advertisements.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::dispatch::{StagerPool, StagerRequirements};
use crate::util::clock::now_ms;

/// How long an advertisement stays usable without being refreshed.
pub const DEFAULT_ADVERTISEMENT_EXPIRY: Duration = Duration::from_secs(10);

/// Capacity a stager periodically announces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagerAdvertisement {
    /// Stager identity.
    pub id: String,
    /// Stacks the stager can build on.
    pub stacks: Vec<String>,
    /// Free memory in MB.
    pub available_memory_mb: u32,
    /// Free disk in MB.
    pub available_disk_mb: u32,
}

struct Entry {
    advertisement: StagerAdvertisement,
    /// Memory left after reservations since the last advertisement.
    available_memory_mb: AtomicU32,
    received_at_ms: u128,
}

/// Picks the least-loaded stager that fits a build.
pub struct InMemoryStagerPool {
    stagers: Mutex<HashMap<String, Arc<Entry>>>,
    expiry: Duration,
}

impl Default for InMemoryStagerPool {
    fn default() -> Self {
        Self::new(DEFAULT_ADVERTISEMENT_EXPIRY)
    }
}

impl InMemoryStagerPool {
    /// Create an empty pool whose advertisements expire after `expiry`.
    #[must_use]
    pub fn new(expiry: Duration) -> Self {
        Self {
            stagers: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    /// Record a fresh advertisement, replacing any earlier one and its
    /// reservations.
    pub fn process_advertise(&self, advertisement: StagerAdvertisement) {
        tracing::debug!(
            "stager {} advertised {} MB",
            advertisement.id,
            advertisement.available_memory_mb
        );
        let entry = Arc::new(Entry {
            available_memory_mb: AtomicU32::new(advertisement.available_memory_mb),
            advertisement,
            received_at_ms: now_ms(),
        });
        self.stagers
            .lock()
            .insert(entry.advertisement.id.clone(), entry);
    }

    /// Memory currently believed free on `stager_id`.
    #[must_use]
    pub fn available_memory_mb(&self, stager_id: &str) -> Option<u32> {
        self.stagers
            .lock()
            .get(stager_id)
            .map(|e| e.available_memory_mb.load(Ordering::Acquire))
    }

    fn is_fresh(&self, entry: &Entry, now: u128) -> bool {
        now.saturating_sub(entry.received_at_ms) <= self.expiry.as_millis()
    }

    fn best_fit(
        &self,
        stagers: &HashMap<String, Arc<Entry>>,
        requirements: &StagerRequirements,
    ) -> Option<Arc<Entry>> {
        let now = now_ms();
        stagers
            .values()
            .filter(|e| self.is_fresh(e, now))
            .filter(|e| e.advertisement.stacks.iter().any(|s| *s == requirements.stack))
            .filter(|e| e.advertisement.available_disk_mb >= requirements.disk_mb)
            .map(|e| (e, e.available_memory_mb.load(Ordering::Acquire)))
            .filter(|(_, memory)| *memory >= requirements.memory_mb)
            .max_by(|(a, a_mem), (b, b_mem)| {
                a_mem
                    .cmp(b_mem)
                    .then_with(|| b.advertisement.id.cmp(&a.advertisement.id))
            })
            .map(|(e, _)| Arc::clone(e))
    }
}

impl Entry {
    /// Take `memory_mb` if it is still free.
    fn try_reserve(&self, memory_mb: u32) -> bool {
        let mut current = self.available_memory_mb.load(Ordering::Acquire);
        loop {
            if current < memory_mb {
                return false;
            }
            match self.available_memory_mb.compare_exchange_weak(
                current,
                current - memory_mb,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, memory_mb: u32) {
        let ceiling = self.advertisement.available_memory_mb;
        let mut current = self.available_memory_mb.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(memory_mb).min(ceiling);
            match self.available_memory_mb.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl StagerPool for InMemoryStagerPool {
    fn find_stager(&self, requirements: &StagerRequirements) -> Option<String> {
        let stagers = self.stagers.lock();
        self.best_fit(&stagers, requirements)
            .map(|e| e.advertisement.id.clone())
    }

    fn reserve_stager(&self, requirements: &StagerRequirements) -> Option<String> {
        // Selection and reservation share the lock so two builds cannot both
        // claim the last free memory on a stager.
        let stagers = self.stagers.lock();
        let entry = self.best_fit(&stagers, requirements)?;
        if !entry.try_reserve(requirements.memory_mb) {
            return None;
        }
        tracing::debug!(
            "reserved {} MB on stager {}",
            requirements.memory_mb,
            entry.advertisement.id
        );
        Some(entry.advertisement.id.clone())
    }

    fn release_app_memory(&self, stager_id: &str, memory_mb: u32) {
        let Some(entry) = self.stagers.lock().get(stager_id).cloned() else {
            tracing::warn!("release on unknown stager {}", stager_id);
            return;
        };
        entry.release(memory_mb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ad(id: &str, memory: u32) -> StagerAdvertisement {
        StagerAdvertisement {
            id: id.to_string(),
            stacks: vec!["cflinuxfs2".to_string()],
            available_memory_mb: memory,
            available_disk_mb: 8192,
        }
    }

    fn req(memory: u32) -> StagerRequirements {
        StagerRequirements {
            stack: "cflinuxfs2".to_string(),
            memory_mb: memory,
            disk_mb: 1024,
        }
    }

    #[test]
    fn test_prefers_most_free_memory() {
        let pool = InMemoryStagerPool::default();
        pool.process_advertise(ad("small", 2048));
        pool.process_advertise(ad("big", 8192));
        assert_eq!(pool.find_stager(&req(1024)).as_deref(), Some("big"));
    }

    #[test]
    fn test_reservation_shifts_placement() {
        let pool = InMemoryStagerPool::default();
        pool.process_advertise(ad("a", 4096));
        pool.process_advertise(ad("b", 3072));
        assert_eq!(pool.reserve_stager(&req(2048)).as_deref(), Some("a"));
        assert_eq!(pool.available_memory_mb("a"), Some(2048));
        assert_eq!(pool.find_stager(&req(1024)).as_deref(), Some("b"));

        pool.process_advertise(ad("a", 4096));
        assert_eq!(pool.find_stager(&req(1024)).as_deref(), Some("a"));
    }

    #[test]
    fn test_release_returns_memory_up_to_advertised() {
        let pool = InMemoryStagerPool::default();
        pool.process_advertise(ad("a", 4096));
        pool.reserve_stager(&req(1024));
        pool.release_app_memory("a", 1024);
        assert_eq!(pool.available_memory_mb("a"), Some(4096));
        pool.release_app_memory("a", 1024);
        assert_eq!(pool.available_memory_mb("a"), Some(4096));
    }

    #[test]
    fn test_concurrent_reservations_never_overbook() {
        let pool = InMemoryStagerPool::default();
        pool.process_advertise(ad("a", 4096));

        let granted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| pool.reserve_stager(&req(1024)).is_some()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(granted, 4);
        assert_eq!(pool.available_memory_mb("a"), Some(0));
    }

    #[test]
    fn test_unsupported_stack_or_capacity() {
        let pool = InMemoryStagerPool::default();
        pool.process_advertise(ad("a", 1024));
        assert!(pool.find_stager(&req(2048)).is_none());

        let mut other = req(512);
        other.stack = "windows2012R2".to_string();
        assert!(pool.find_stager(&other).is_none());
    }

    #[test]
    fn test_expired_advertisements_ignored() {
        let pool = InMemoryStagerPool::new(Duration::ZERO);
        pool.process_advertise(ad("a", 4096));
        std::thread::sleep(Duration::from_millis(5));
        assert!(pool.find_stager(&req(1024)).is_none());
    }
}
