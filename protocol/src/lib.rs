//! LRA Coordinator Control Protocol
//!
//! Header names and request forms exchanged between the coordinator,
//! business resources, and participants. The business payloads themselves
//! are opaque; only the control surface is defined here.

pub mod headers;
pub mod join;

pub use headers::*;
pub use join::{endpoints_from_link_header, JoinParseError, JoinRequest};
