//! Small identifier aliases shared across crates.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generic identifier type for in-process entities.
pub type Id = Uuid;

/// Opaque user identifier, as handed in by the caller.
pub type UserId = String;

/// Opaque session identifier, as handed in by the caller.
pub type SessionId = String;

/// Opaque thread identifier grouping sessions.
pub type ThreadId = String;

pub fn new_id() -> Id {
    Uuid::new_v4()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
