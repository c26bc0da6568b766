//! LRA Participant Client
//!
//! Stateless outbound invoker used by the coordinator core and recovery
//! engine to drive participant callbacks over HTTP.

pub mod client;
pub mod config;

pub use client::{NotificationOutcome, ParticipantClient, StatusProbe};
pub use config::ClientConfig;
