pub mod engine;
pub mod state;
pub mod timer;

pub use engine::{start_election, ElectionHandle, Elector};
pub use state::{ElectionRole, LeaderChange};
