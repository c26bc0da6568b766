//! Identifier types for LRA coordinator entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a Long Running Action.
/// Uses UUID v7 for time-ordered identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LraId(Uuid);

impl LraId {
    /// Create a new LRA ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from a string.
    ///
    /// Accepts both a bare UUID and a full coordinator URI; in the latter
    /// case the trailing path segment is taken as the identifier.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        let candidate = s.rsplit('/').next().unwrap_or(s);
        Ok(Self(Uuid::parse_str(candidate)?))
    }

    /// Render as a URI under the given coordinator base
    /// (e.g. `http://host:port/lra-coordinator`).
    pub fn to_uri(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.0)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LraId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token handed back to the enlisting caller at join time, used
/// to update or leave the enlistment later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecoveryToken(Uuid);

impl RecoveryToken {
    /// Create a new recovery token.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string (bare UUID or trailing URI segment).
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        let candidate = s.rsplit('/').next().unwrap_or(s);
        Ok(Self(Uuid::parse_str(candidate)?))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecoveryToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecoveryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied label for an LRA. Opaque to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Create a new client ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
