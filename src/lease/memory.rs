use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{CasOutcome, CreateOutcome, LeaseEntry, LeaseStore};
use crate::error::LeaseStoreError;

#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Instant,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Lease store kept in process memory.
///
/// Expiry runs on the tokio clock, so tests can drive it with a paused
/// runtime. Every operation holds the map lock for its whole duration, which
/// is what makes create-if-absent and compare-and-swap atomic.
#[derive(Debug, Default)]
pub struct MemoryLeaseStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots held, expired or not.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn create_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<CreateOutcome, LeaseStoreError> {
        let now = Instant::now();
        let mut slots = self.slots.lock().await;

        // Keys nobody reads again would otherwise stay forever.
        slots.retain(|_, slot| slot.is_live(now));

        if slots.contains_key(key) {
            return Ok(CreateOutcome::AlreadyExists);
        }

        slots.insert(
            key.to_string(),
            Slot {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(CreateOutcome::Created)
    }

    async fn get(&self, key: &str) -> Result<Option<LeaseEntry>, LeaseStoreError> {
        let now = Instant::now();
        let mut slots = self.slots.lock().await;

        match slots.get(key) {
            Some(slot) if slot.is_live(now) => Ok(Some(LeaseEntry {
                value: slot.value.clone(),
                remaining_ttl: slot.expires_at - now,
            })),
            Some(_) => {
                slots.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<CasOutcome, LeaseStoreError> {
        let now = Instant::now();
        let mut slots = self.slots.lock().await;

        match slots.get_mut(key) {
            Some(slot) if slot.is_live(now) && slot.value == expected => {
                slot.value = value.to_string();
                slot.expires_at = now + ttl;
                Ok(CasOutcome::Swapped)
            }
            _ => Ok(CasOutcome::Conflict),
        }
    }
}
