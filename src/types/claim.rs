//! The lease record embedded in a task while a worker holds it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub claimed_by: String,
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub version: u64,
}

impl Claim {
    pub fn new(claimed_by: impl Into<String>, now: DateTime<Utc>, lease_duration: chrono::Duration, version: u64) -> Self {
        Self {
            claimed_by: claimed_by.into(),
            claimed_at: now,
            expires_at: now + lease_duration,
            version,
        }
    }

    /// A claim is stale (eligible for recovery) once `now` has passed
    /// `expires_at`. Equality counts as expired (spec invariant 2: "`≤
    /// now`").
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
