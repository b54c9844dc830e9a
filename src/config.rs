use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// Who this process is in which election. Never mutated after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionIdentity {
    pub election_name: String,
    pub participant_id: String,
    pub namespace: String,
}

impl ElectionIdentity {
    pub fn new(
        election_name: impl Into<String>,
        participant_id: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            election_name: election_name.into(),
            participant_id: participant_id.into(),
            namespace: namespace.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.participant_id.is_empty() {
            return Err(ConfigError::EmptyParticipantId);
        }
        if self.election_name.is_empty() {
            return Err(ConfigError::EmptyElectionName);
        }
        Ok(())
    }

    /// Key of the lease record shared by every participant of this election.
    pub fn lease_key(&self) -> String {
        format!("{}/{}", self.namespace, self.election_name)
    }
}

/// Lease store calls a single poll cycle can make: create, read, renew.
pub const CALLS_PER_CYCLE: u32 = 3;

/// Lease and polling timings.
///
/// Cycles start `poll_interval` (plus jitter) after the previous cycle
/// started, and each backend call is bounded by `op_timeout`. A renewal
/// therefore lands at most `poll_interval + CALLS_PER_CYCLE * op_timeout`
/// after the previous one, which must stay below the TTL or a healthy
/// leader's lease lapses between renewals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    pub ttl: Duration,
    pub poll_interval: Duration,
    pub op_timeout: Duration,
    /// Upper bound of the random delay added to each cycle.
    pub max_jitter: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::from_ttl(DEFAULT_TTL)
    }
}

impl TimingConfig {
    pub fn from_ttl(ttl: Duration) -> Self {
        let poll_interval = ttl / 2;
        Self {
            ttl,
            poll_interval,
            op_timeout: poll_interval / 5,
            max_jitter: ttl / 20,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.op_timeout = poll_interval / 5;
        self
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Longest a cycle can spend waiting on the backend.
    pub fn worst_case_cycle(&self) -> Duration {
        self.op_timeout * CALLS_PER_CYCLE
    }

    /// Latest start of the next cycle, counted from the start of the
    /// current one, that still renews before the lease written now expires.
    pub fn renewal_deadline(&self) -> Duration {
        self.ttl.saturating_sub(self.worst_case_cycle())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        let min = self.ttl / 5;
        let max = self.ttl;
        if self.poll_interval.is_zero() || self.poll_interval < min || self.poll_interval > max {
            return Err(ConfigError::PollIntervalOutOfRange {
                interval_ms: self.poll_interval.as_millis(),
                min_ms: min.as_millis(),
                max_ms: max.as_millis(),
            });
        }
        if self.op_timeout.is_zero() || self.worst_case_cycle() > self.poll_interval {
            return Err(ConfigError::OpTimeoutOutOfRange {
                timeout_ms: self.op_timeout.as_millis(),
                interval_ms: self.poll_interval.as_millis(),
            });
        }
        if self.poll_interval >= self.renewal_deadline() {
            return Err(ConfigError::RenewalTooLate {
                interval_ms: self.poll_interval.as_millis(),
                cycle_ms: self.worst_case_cycle().as_millis(),
                ttl_ms: self.ttl.as_millis(),
            });
        }
        Ok(())
    }
}

/// How the leader's participant ID is turned into an address, if at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResolverConfig {
    #[default]
    Disabled,
    /// Fixed participant -> address table.
    Static(HashMap<String, String>),
    /// Resolve `<participant><domain>` through the system resolver.
    Dns { domain: String },
}

impl ResolverConfig {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ResolverConfig::Disabled)
    }
}

#[derive(Debug, Clone)]
pub struct ElectionConfig {
    pub identity: ElectionIdentity,
    pub timing: TimingConfig,
    pub resolver: ResolverConfig,
    /// Where to serve the status endpoint. `None` runs the election only.
    pub status_addr: Option<SocketAddr>,
    /// Base URL of the lease server. `None` uses an in-process store.
    pub lease_server: Option<String>,
    pub auth_token: Option<String>,
}

impl ElectionConfig {
    pub fn new(identity: ElectionIdentity) -> Self {
        Self {
            identity,
            timing: TimingConfig::default(),
            resolver: ResolverConfig::Disabled,
            status_addr: None,
            lease_server: None,
            auth_token: None,
        }
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_status_addr(mut self, addr: SocketAddr) -> Self {
        self.status_addr = Some(addr);
        self
    }

    pub fn with_lease_server(mut self, url: impl Into<String>) -> Self {
        self.lease_server = Some(url.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.identity.validate()?;
        self.timing.validate()
    }
}

/// Parse durations such as `500ms`, `10s`, `2m` or `1h`.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let s = input.trim();
    let invalid = || ConfigError::InvalidDuration(input.to_string());

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits.parse().map_err(|_| invalid())?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(invalid()),
    }
}

/// Parse a `participant=address` pair.
pub fn parse_peer_address(input: &str) -> Result<(String, String), ConfigError> {
    match input.split_once('=') {
        Some((id, addr)) if !id.trim().is_empty() && !addr.trim().is_empty() => {
            Ok((id.trim().to_string(), addr.trim().to_string()))
        }
        _ => Err(ConfigError::InvalidPeerAddress(input.to_string())),
    }
}

/// Parse a listen address. A bare `:port` binds every interface.
pub fn parse_listen_addr(input: &str) -> Result<SocketAddr, ConfigError> {
    let s = input.trim();
    let full = if s.starts_with(':') {
        format!("0.0.0.0{}", s)
    } else {
        s.to_string()
    };
    full.parse()
        .map_err(|_| ConfigError::InvalidListenAddr(input.to_string()))
}
