use thiserror::Error;

/// Startup configuration problems. These are the only errors allowed to stop
/// the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--election cannot be empty")]
    EmptyElectionName,

    #[error("--id cannot be empty")]
    EmptyParticipantId,

    #[error("TTL must be greater than zero")]
    ZeroTtl,

    #[error("poll interval {interval_ms}ms is outside [{min_ms}ms, {max_ms}ms] for the configured TTL")]
    PollIntervalOutOfRange {
        interval_ms: u128,
        min_ms: u128,
        max_ms: u128,
    },

    #[error("operation timeout {timeout_ms}ms must be non-zero and fit three times into the {interval_ms}ms poll interval")]
    OpTimeoutOutOfRange { timeout_ms: u128, interval_ms: u128 },

    #[error("poll interval {interval_ms}ms plus a worst-case cycle of {cycle_ms}ms does not fit in the {ttl_ms}ms TTL")]
    RenewalTooLate {
        interval_ms: u128,
        cycle_ms: u128,
        ttl_ms: u128,
    },

    #[error("invalid duration {0:?}, expected e.g. 500ms, 10s, 2m or 1h")]
    InvalidDuration(String),

    #[error("invalid peer address {0:?}, expected id=address")]
    InvalidPeerAddress(String),

    #[error("invalid listen address {0:?}, expected host:port or :port")]
    InvalidListenAddr(String),
}

/// Failures talking to the lease backend. Contention outcomes (key already
/// present, CAS conflict) are not errors and never show up here.
#[derive(Error, Debug)]
pub enum LeaseStoreError {
    #[error("lease backend unreachable: {0}")]
    Transport(String),

    #[error("lease backend rejected credentials")]
    Unauthorized,

    #[error("lease backend returned unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("lease backend returned a malformed response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for LeaseStoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            LeaseStoreError::Protocol(e.to_string())
        } else {
            LeaseStoreError::Transport(e.to_string())
        }
    }
}

/// Failures mapping a participant ID to an address.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no address known for participant {0}")]
    Unknown(String),

    #[error("lookup of {host} failed: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("lookup of {0} returned no addresses")]
    NoAddresses(String),

    #[error("lookup of {0} timed out")]
    Timeout(String),
}

#[derive(Error, Debug)]
pub enum ElectorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ElectorError>;
