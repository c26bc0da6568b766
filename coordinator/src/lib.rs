//! LRA Coordinator
//!
//! Tracks Long Running Actions, enlists participants, and drives them to
//! completion or compensation: the registry is the single source of
//! truth, the coordinator core enforces the state machines, deadline
//! triggers and the recovery engine converge every LRA to a terminal
//! status, and the HTTP layer exposes the coordinator wire contract.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod locks;
pub mod metrics;
pub mod recovery;
pub mod registry;
pub mod timeout;

pub use config::{CoordinatorConfig, RecoveryConfig};
pub use coordinator::Coordinator;
pub use metrics::Metrics;
pub use recovery::{RecoveryEngine, SweepStats};
pub use registry::LraRegistry;
pub use timeout::TimeoutScheduler;
