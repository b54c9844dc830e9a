//! Participant ID to network address lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ResolverConfig;
use crate::error::ResolveError;

#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, participant_id: &str) -> Result<String, ResolveError>;
}

/// Fixed participant -> address table, e.g. from `--peer-address a=10.0.0.1`.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    addresses: HashMap<String, String>,
}

impl StaticResolver {
    pub fn new(addresses: HashMap<String, String>) -> Self {
        Self { addresses }
    }

    pub fn with_address(mut self, participant_id: impl Into<String>, addr: impl Into<String>) -> Self {
        self.addresses.insert(participant_id.into(), addr.into());
        self
    }
}

#[async_trait]
impl AddressResolver for StaticResolver {
    async fn resolve(&self, participant_id: &str) -> Result<String, ResolveError> {
        self.addresses
            .get(participant_id)
            .cloned()
            .ok_or_else(|| ResolveError::Unknown(participant_id.to_string()))
    }
}

/// Looks up `<participant><domain>` with the system resolver and returns the
/// first IP address. With a headless service, `domain` is typically
/// `.<service>.<namespace>.svc.cluster.local`.
#[derive(Debug, Clone, Default)]
pub struct DnsResolver {
    domain: String,
}

impl DnsResolver {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    fn host_for(&self, participant_id: &str) -> String {
        format!("{}{}", participant_id, self.domain)
    }
}

#[async_trait]
impl AddressResolver for DnsResolver {
    async fn resolve(&self, participant_id: &str) -> Result<String, ResolveError> {
        let host = self.host_for(participant_id);
        let mut addrs = tokio::net::lookup_host((host.as_str(), 0))
            .await
            .map_err(|source| ResolveError::Lookup {
                host: host.clone(),
                source,
            })?;
        addrs
            .next()
            .map(|addr| addr.ip().to_string())
            .ok_or_else(|| ResolveError::NoAddresses(host.clone()))
    }
}

/// Build the resolver selected by configuration. `None` when resolution is
/// disabled.
pub fn from_config(config: &ResolverConfig) -> Option<Arc<dyn AddressResolver>> {
    match config {
        ResolverConfig::Disabled => None,
        ResolverConfig::Static(addresses) => Some(Arc::new(StaticResolver::new(addresses.clone()))),
        ResolverConfig::Dns { domain } => Some(Arc::new(DnsResolver::new(domain.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_resolver_hits_and_misses() {
        let resolver = StaticResolver::default().with_address("a", "10.0.0.1");
        assert_eq!(resolver.resolve("a").await.unwrap(), "10.0.0.1");
        assert!(matches!(
            resolver.resolve("b").await,
            Err(ResolveError::Unknown(id)) if id == "b"
        ));
    }

    #[tokio::test]
    async fn dns_resolver_resolves_ip_literals() {
        let resolver = DnsResolver::new("");
        assert_eq!(resolver.resolve("127.0.0.1").await.unwrap(), "127.0.0.1");
    }

    #[tokio::test]
    async fn dns_resolver_reports_unresolvable_host() {
        let resolver = DnsResolver::new(".invalid");
        let err = resolver.resolve("no-such-participant").await.unwrap_err();
        assert!(
            matches!(
                &err,
                ResolveError::Lookup { host, .. } | ResolveError::NoAddresses(host)
                    if host == "no-such-participant.invalid"
            ),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn dns_resolver_appends_domain() {
        let resolver = DnsResolver::new(".elector.default.svc.cluster.local");
        assert_eq!(
            resolver.host_for("a"),
            "a.elector.default.svc.cluster.local"
        );
    }

    #[test]
    fn from_config_respects_disabled() {
        assert!(from_config(&ResolverConfig::Disabled).is_none());
        assert!(from_config(&ResolverConfig::Dns {
            domain: String::new()
        })
        .is_some());
    }
}
