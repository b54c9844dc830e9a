use serde::Serialize;
use tokio::sync::RwLock;

/// What this participant currently believes about leadership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LeaderSnapshot {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "podAddress", skip_serializing_if = "Option::is_none")]
    pub pod_address: Option<String>,
}

impl LeaderSnapshot {
    /// Snapshot before any election result: no leader, no address.
    pub fn empty(namespace: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            namespace: namespace.into(),
            pod_address: None,
        }
    }

    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        pod_address: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            // An empty address is the same as no address.
            pod_address: pod_address.filter(|a| !a.is_empty()),
        }
    }
}

/// Single-record store of the current leader.
///
/// Writes replace the whole snapshot under the write lock, so readers see
/// either the previous record or the new one, never a mix of both.
#[derive(Debug)]
pub struct LeaderRegistry {
    current: RwLock<LeaderSnapshot>,
}

impl LeaderRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(LeaderSnapshot::empty(namespace)),
        }
    }

    pub async fn set_leader(&self, snapshot: LeaderSnapshot) {
        *self.current.write().await = snapshot;
    }

    pub async fn get_leader(&self) -> LeaderSnapshot {
        self.current.read().await.clone()
    }
}
