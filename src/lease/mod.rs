//! Lease store contract and its implementations.
//!
//! The election only relies on three atomic operations. Whoever hosts the
//! key decides every race: the first `create_if_absent` to land wins, and a
//! `compare_and_swap` only succeeds while the stored value is still the
//! expected one.

pub mod http;
pub mod memory;
pub mod server;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LeaseStoreError;

pub use http::HttpLeaseStore;
pub use memory::MemoryLeaseStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Swapped,
    /// The key is absent or holds a value other than the expected one.
    Conflict,
}

/// Current contents of a lease key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseEntry {
    pub value: String,
    #[serde(rename = "remaining_ttl_ms", with = "duration_ms")]
    pub remaining_ttl: Duration,
}

#[async_trait]
pub trait LeaseStore: Send + Sync {
    async fn create_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<CreateOutcome, LeaseStoreError>;

    /// Returns `None` when the key is absent or has expired.
    async fn get(&self, key: &str) -> Result<Option<LeaseEntry>, LeaseStoreError>;

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<CasOutcome, LeaseStoreError>;
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
