use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::election::LeaderChange;
use crate::error::ResolveError;
use crate::registry::{LeaderRegistry, LeaderSnapshot};
use crate::resolver::AddressResolver;

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Turns leadership changes into registry updates.
///
/// Runs in its own task so that a slow address lookup never delays the next
/// election cycle. Changes are applied one at a time, in the order the
/// election loop emitted them.
pub struct LeaderPublisher {
    registry: Arc<LeaderRegistry>,
    namespace: String,
    resolver: Option<Arc<dyn AddressResolver>>,
    resolve_timeout: Duration,
}

impl LeaderPublisher {
    pub fn new(registry: Arc<LeaderRegistry>, namespace: impl Into<String>) -> Self {
        Self {
            registry,
            namespace: namespace.into(),
            resolver: None,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Apply one change: resolve the holder's address if enabled, then
    /// overwrite the registry. Resolution failures leave the address empty.
    pub async fn apply(&self, change: &LeaderChange) {
        tracing::info!(holder = %change.holder, "{} is the leader", change.holder);

        let pod_address = match &self.resolver {
            Some(resolver) => match self.resolve(resolver.as_ref(), &change.holder).await {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::error!(
                        holder = %change.holder,
                        error = %e,
                        "Failed to resolve leader address"
                    );
                    None
                }
            },
            None => None,
        };

        self.registry
            .set_leader(LeaderSnapshot::new(
                change.holder.clone(),
                self.namespace.clone(),
                pod_address,
            ))
            .await;
    }

    async fn resolve(
        &self,
        resolver: &dyn AddressResolver,
        holder: &str,
    ) -> Result<String, ResolveError> {
        tokio::time::timeout(self.resolve_timeout, resolver.resolve(holder))
            .await
            .map_err(|_| ResolveError::Timeout(holder.to_string()))?
    }

    /// Consume changes until the channel closes or `shutdown` fires.
    pub async fn run(self, mut events: mpsc::Receiver<LeaderChange>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                change = events.recv() => match change {
                    Some(change) => self.apply(&change).await,
                    None => break,
                },
            }
        }
        tracing::debug!("Leader publisher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;
    use async_trait::async_trait;

    struct SlowResolver;

    #[async_trait]
    impl AddressResolver for SlowResolver {
        async fn resolve(&self, _participant_id: &str) -> Result<String, ResolveError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("10.0.0.9".to_string())
        }
    }

    fn change(holder: &str) -> LeaderChange {
        LeaderChange {
            holder: holder.to_string(),
        }
    }

    #[tokio::test]
    async fn apply_without_resolver_sets_name_only() {
        let registry = Arc::new(LeaderRegistry::new("default"));
        let publisher = LeaderPublisher::new(registry.clone(), "default");

        publisher.apply(&change("a")).await;

        assert_eq!(
            registry.get_leader().await,
            LeaderSnapshot::new("a", "default", None)
        );
    }

    #[tokio::test]
    async fn apply_with_resolver_sets_address() {
        let registry = Arc::new(LeaderRegistry::new("default"));
        let publisher = LeaderPublisher::new(registry.clone(), "default")
            .with_resolver(Arc::new(StaticResolver::default().with_address("a", "10.0.0.1")));

        publisher.apply(&change("a")).await;

        let snapshot = registry.get_leader().await;
        assert_eq!(snapshot.name, "a");
        assert_eq!(snapshot.pod_address.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn new_leader_without_address_clears_previous_address() {
        let registry = Arc::new(LeaderRegistry::new("default"));
        let publisher = LeaderPublisher::new(registry.clone(), "default")
            .with_resolver(Arc::new(StaticResolver::default().with_address("a", "10.0.0.1")));

        publisher.apply(&change("a")).await;
        publisher.apply(&change("b")).await;

        let snapshot = registry.get_leader().await;
        assert_eq!(snapshot.name, "b");
        assert_eq!(snapshot.pod_address, None);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_resolution_times_out() {
        let registry = Arc::new(LeaderRegistry::new("default"));
        let publisher = LeaderPublisher::new(registry.clone(), "default")
            .with_resolver(Arc::new(SlowResolver))
            .with_resolve_timeout(Duration::from_millis(100));

        publisher.apply(&change("a")).await;

        let snapshot = registry.get_leader().await;
        assert_eq!(snapshot.name, "a");
        assert_eq!(snapshot.pod_address, None);
    }

    #[tokio::test]
    async fn run_applies_in_order_and_exits_when_channel_closes() {
        let registry = Arc::new(LeaderRegistry::new("default"));
        let publisher = LeaderPublisher::new(registry.clone(), "default");
        let (tx, rx) = mpsc::channel(4);

        tx.send(change("a")).await.unwrap();
        tx.send(change("b")).await.unwrap();
        drop(tx);

        publisher.run(rx, CancellationToken::new()).await;

        assert_eq!(registry.get_leader().await.name, "b");
    }
}
