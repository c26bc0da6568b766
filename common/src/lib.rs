//! LRA Coordinator Common Types
//!
//! This crate contains shared types used across the LRA coordinator,
//! including identifiers, the LRA and participant data model with their
//! state machines, and error definitions.

pub mod error;
pub mod identifiers;
pub mod lra;
pub mod participant;
pub mod time;

pub use error::*;
pub use identifiers::*;
pub use lra::*;
pub use participant::*;
pub use time::*;
