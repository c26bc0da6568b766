//! Control header names propagated between the coordinator, business
//! resources, and participants.

/// Carries the current LRA context id.
pub const LRA_CONTEXT_HEADER: &str = "Long-Running-Action";

/// Carries the per-enlistment recovery token back to the enlisting caller.
pub const LRA_RECOVERY_HEADER: &str = "Long-Running-Action-Recovery";

/// Carries the enclosing LRA id to a nested participant.
pub const LRA_PARENT_HEADER: &str = "Long-Running-Action-Parent";

/// Carries the just-finished LRA id to an after-LRA listener, paired with
/// a plain-text final status in the request body.
pub const LRA_ENDED_HEADER: &str = "Long-Running-Action-Ended";

/// Query parameter naming the caller-supplied client id on start.
pub const CLIENT_ID_PARAM: &str = "ClientID";

/// Query parameter carrying the time limit, in milliseconds, on start and
/// renew. Zero means no deadline.
pub const TIME_LIMIT_PARAM: &str = "TimeLimit";

/// Query parameter carrying the enclosing LRA id on start.
pub const PARENT_LRA_PARAM: &str = "ParentLRA";
