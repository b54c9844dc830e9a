pub mod config;
pub mod election;
pub mod error;
pub mod lease;
pub mod node;
pub mod publisher;
pub mod registry;
pub mod resolver;
pub mod shutdown;
pub mod status;
