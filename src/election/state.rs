/// Where this participant stands in the election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionRole {
    /// No holder confirmed this cycle; create-if-absent is attempted every
    /// cycle.
    Contending,
    /// This participant holds the lease and renewed it this cycle.
    Leading,
    /// Another participant holds the lease.
    Following,
}

impl std::fmt::Display for ElectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElectionRole::Contending => write!(f, "contending"),
            ElectionRole::Leading => write!(f, "leading"),
            ElectionRole::Following => write!(f, "following"),
        }
    }
}

/// Emitted once each time the observed lease holder changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderChange {
    pub holder: String,
}
