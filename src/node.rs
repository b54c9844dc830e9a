use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ElectionConfig;
use crate::election::start_election;
use crate::error::{ConfigError, Result};
use crate::lease::{HttpLeaseStore, LeaseStore, MemoryLeaseStore};
use crate::publisher::LeaderPublisher;
use crate::registry::LeaderRegistry;
use crate::resolver;
use crate::status::{run_status_server, StatusState};

/// One election participant with everything wired around it.
pub struct Node {
    pub config: ElectionConfig,
    pub registry: Arc<LeaderRegistry>,
    store: Arc<dyn LeaseStore>,
}

impl Node {
    /// Validate the configuration and prepare the components. Nothing is
    /// spawned until [`Node::run`].
    pub fn new(config: ElectionConfig, store: Arc<dyn LeaseStore>) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let registry = Arc::new(LeaderRegistry::new(config.identity.namespace.clone()));
        Ok(Self {
            config,
            registry,
            store,
        })
    }

    /// Build the node with the lease store named by `config.lease_server`.
    pub fn from_config(config: ElectionConfig) -> std::result::Result<Self, ConfigError> {
        let store: Arc<dyn LeaseStore> = match &config.lease_server {
            Some(url) => Arc::new(HttpLeaseStore::new(url.clone(), config.auth_token.clone())),
            None => {
                tracing::warn!(
                    "No --lease-server given, using an in-process lease store. \
                     Leadership is only meaningful within this process."
                );
                Arc::new(MemoryLeaseStore::new())
            }
        };
        Self::new(config, store)
    }

    /// Run the node until `shutdown` is cancelled.
    ///
    /// 1. Spawns the election loop
    /// 2. Spawns the publisher that applies leadership changes to the registry
    /// 3. Serves the status endpoint if an address is configured, otherwise
    ///    just waits for shutdown
    ///
    /// # Errors
    ///
    /// Returns an error if the status server cannot bind its address. The
    /// election loop itself never fails.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let identity = self.config.identity.clone();
        let (election, events) = start_election(
            identity.clone(),
            self.config.timing.clone(),
            self.store.clone(),
            &shutdown,
        )?;

        let mut publisher = LeaderPublisher::new(self.registry.clone(), identity.namespace.clone());
        if let Some(resolver) = resolver::from_config(&self.config.resolver) {
            publisher = publisher.with_resolver(resolver);
        }
        let publisher_shutdown = shutdown.clone();
        let publisher_task = tokio::spawn(async move {
            publisher.run(events, publisher_shutdown).await;
        });

        let served = match self.config.status_addr {
            Some(addr) => {
                let state = StatusState {
                    registry: self.registry.clone(),
                };
                run_status_server(addr, state, shutdown.clone()).await
            }
            None => {
                shutdown.cancelled().await;
                Ok(())
            }
        };

        if let Err(e) = &served {
            tracing::error!(error = %e, "Status server failed");
            shutdown.cancel();
        }

        election.stop().await;
        if let Err(e) = publisher_task.await {
            tracing::error!(error = %e, "Publisher task ended abnormally");
        }

        served.map_err(Into::into)
    }
}
