//! In-memory executor registry.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;
use xconnect_core::{
    ActiveExecutor, ExecutorRecord, ExecutorRegistry, RegistryError, config::DEFAULT_AGENT_TIMEOUT,
};

/// In-memory registry implementation.
///
/// Entries are never evicted; an entry older than the liveness window is
/// hidden from lookups until a fresh heartbeat overwrites it. Memory grows
/// with the number of distinct executor ids ever seen.
pub struct MemoryRegistry {
    records: RwLock<HashMap<String, ExecutorRecord>>,
    timeout: Duration,
}

impl MemoryRegistry {
    /// Create a registry with the given liveness window.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of entries ever recorded, stale or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_TIMEOUT)
    }
}

#[async_trait]
impl ExecutorRegistry for MemoryRegistry {
    async fn upsert(&self, id: &str, address: &str) {
        let record = ExecutorRecord {
            id: id.to_string(),
            address: address.to_string(),
            last_seen: Instant::now(),
        };

        tracing::info!(agent_id = %id, address, "Received heartbeat");
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), record);
    }

    async fn resolve(&self, id: &str) -> Result<String, RegistryError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let age = record.age();
        if age > self.timeout {
            return Err(RegistryError::Stale {
                id: id.to_string(),
                age,
            });
        }
        Ok(record.address.clone())
    }

    async fn list_active(&self) -> Vec<ActiveExecutor> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);

        let mut active: Vec<ActiveExecutor> = records
            .values()
            .filter_map(|r| {
                let age = r.age();
                (age <= self.timeout).then(|| ActiveExecutor {
                    id: r.id.clone(),
                    address: r.address.clone(),
                    age,
                })
            })
            .collect();

        active.sort_by(|a, b| a.id.cmp(&b.id));
        active
    }
}
