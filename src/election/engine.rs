use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{ElectionIdentity, TimingConfig};
use crate::election::state::{ElectionRole, LeaderChange};
use crate::election::timer::next_poll_delay;
use crate::error::{ConfigError, LeaseStoreError};
use crate::lease::{CasOutcome, CreateOutcome, LeaseStore};

const EVENT_BUFFER: usize = 16;

/// Election state machine for one participant.
///
/// Each cycle tries to create the lease, otherwise reads it, renews it when
/// this participant is the holder, and emits a [`LeaderChange`] when the
/// observed holder differs from the last one emitted. A cycle that cannot
/// determine the holder emits nothing.
pub struct Elector {
    identity: ElectionIdentity,
    timing: TimingConfig,
    store: Arc<dyn LeaseStore>,
    key: String,
    events_tx: mpsc::Sender<LeaderChange>,
    role_tx: watch::Sender<ElectionRole>,
    last_notified: Option<String>,
}

impl Elector {
    pub fn new(
        identity: ElectionIdentity,
        timing: TimingConfig,
        store: Arc<dyn LeaseStore>,
    ) -> Result<(Self, mpsc::Receiver<LeaderChange>), ConfigError> {
        identity.validate()?;
        timing.validate()?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (role_tx, _) = watch::channel(ElectionRole::Contending);

        let elector = Self {
            key: identity.lease_key(),
            identity,
            timing,
            store,
            events_tx,
            role_tx,
            last_notified: None,
        };

        Ok((elector, events_rx))
    }

    pub fn role(&self) -> ElectionRole {
        *self.role_tx.borrow()
    }

    pub fn subscribe_role(&self) -> watch::Receiver<ElectionRole> {
        self.role_tx.subscribe()
    }

    /// Run cycles until `shutdown` is cancelled. The lease is not released on
    /// exit; it expires on its own.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            election = %self.identity.election_name,
            participant = %self.identity.participant_id,
            namespace = %self.identity.namespace,
            ttl_ms = self.timing.ttl.as_millis() as u64,
            interval_ms = self.timing.poll_interval.as_millis() as u64,
            "Starting election loop"
        );

        while !shutdown.is_cancelled() {
            // Cycles are paced from their start so backend latency does not
            // stretch the gap between renewals.
            let next_cycle = Instant::now() + next_poll_delay(&self.timing);
            self.poll_once().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep_until(next_cycle) => {}
            }
        }

        tracing::info!(
            election = %self.identity.election_name,
            participant = %self.identity.participant_id,
            "Election loop stopped"
        );
    }

    /// Run one cycle and return the holder observed in it, if any.
    ///
    /// Never waits on the event consumer. When the channel is full the
    /// change is not recorded as notified, so a later cycle that still
    /// observes the same holder delivers it.
    pub async fn poll_once(&mut self) -> Option<String> {
        let observed = self.observe_holder().await;

        match &observed {
            Some(holder) if self.last_notified.as_deref() != Some(holder.as_str()) => {
                let change = LeaderChange {
                    holder: holder.clone(),
                };
                match self.events_tx.try_send(change) {
                    Ok(()) => self.last_notified = Some(holder.clone()),
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            holder = %holder,
                            "Leadership change consumer is behind, retrying next cycle"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(holder = %holder, "No consumer for leadership changes");
                        self.last_notified = Some(holder.clone());
                    }
                }
            }
            _ => {}
        }

        observed
    }

    async fn observe_holder(&self) -> Option<String> {
        let own_id = self.identity.participant_id.as_str();
        let ttl = self.timing.ttl;

        let created = self
            .bounded("create", self.store.create_if_absent(&self.key, own_id, ttl))
            .await;
        match created {
            Some(CreateOutcome::Created) => {
                self.set_role(ElectionRole::Leading);
                return Some(own_id.to_string());
            }
            Some(CreateOutcome::AlreadyExists) => {}
            None => {
                self.set_role(ElectionRole::Contending);
                return None;
            }
        }

        let entry = match self.bounded("get", self.store.get(&self.key)).await {
            Some(Some(entry)) => entry,
            Some(None) => {
                tracing::debug!(key = %self.key, "Lease expired between create and read");
                self.set_role(ElectionRole::Contending);
                return None;
            }
            None => {
                self.set_role(ElectionRole::Contending);
                return None;
            }
        };

        if entry.value != own_id {
            self.set_role(ElectionRole::Following);
            return Some(entry.value);
        }

        let renewed = self
            .bounded(
                "renew",
                self.store
                    .compare_and_swap(&self.key, &entry.value, own_id, ttl),
            )
            .await;
        match renewed {
            Some(CasOutcome::Swapped) => {
                self.set_role(ElectionRole::Leading);
                Some(own_id.to_string())
            }
            Some(CasOutcome::Conflict) => {
                tracing::debug!(
                    key = %self.key,
                    remaining_ttl_ms = entry.remaining_ttl.as_millis() as u64,
                    "Lost the lease while renewing"
                );
                self.set_role(ElectionRole::Contending);
                None
            }
            None => {
                self.set_role(ElectionRole::Contending);
                None
            }
        }
    }

    /// Await a lease store call under the operation timeout. Failures are
    /// logged and turned into `None`.
    async fn bounded<T, F>(&self, op: &'static str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T, LeaseStoreError>>,
    {
        match tokio::time::timeout(self.timing.op_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(
                    election = %self.identity.election_name,
                    op,
                    error = %e,
                    "Lease store call failed"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    election = %self.identity.election_name,
                    op,
                    timeout_ms = self.timing.op_timeout.as_millis() as u64,
                    "Lease store call timed out"
                );
                None
            }
        }
    }

    fn set_role(&self, role: ElectionRole) {
        let previous = self.role_tx.send_replace(role);
        if previous != role {
            tracing::info!(
                election = %self.identity.election_name,
                participant = %self.identity.participant_id,
                from = %previous,
                to = %role,
                "Election role changed"
            );
        }
    }
}

/// Owner of a running election loop.
pub struct ElectionHandle {
    task: JoinHandle<()>,
    shutdown: CancellationToken,
    role_rx: watch::Receiver<ElectionRole>,
}

impl ElectionHandle {
    pub fn role(&self) -> ElectionRole {
        *self.role_rx.borrow()
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Election task ended abnormally");
        }
    }
}

/// Validate the identity and timings, then spawn the election loop.
///
/// Configuration errors are returned before anything is spawned. The loop
/// stops when `shutdown` (or the handle) is cancelled.
pub fn start_election(
    identity: ElectionIdentity,
    timing: TimingConfig,
    store: Arc<dyn LeaseStore>,
    shutdown: &CancellationToken,
) -> Result<(ElectionHandle, mpsc::Receiver<LeaderChange>), ConfigError> {
    let (elector, events_rx) = Elector::new(identity, timing, store)?;
    let role_rx = elector.subscribe_role();
    let token = shutdown.child_token();

    let loop_token = token.clone();
    let task = tokio::spawn(async move {
        elector.run(loop_token).await;
    });

    let handle = ElectionHandle {
        task,
        shutdown: token,
        role_rx,
    };
    Ok((handle, events_rx))
}
