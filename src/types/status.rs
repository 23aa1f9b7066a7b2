//! Task status state machine.
//!
//! ```text
//!        create
//!           |
//!           v
//!       Pending --+
//!           |     | (treated identically for scheduling)
//!           v     v
//!         Queued <------ recover (claim expired)
//!           |  ^
//!   claim   |  | lease expires & recovery sweep
//!           v  |
//!       Generating --- complete --> Ready      (terminal-success)
//!           |
//!           +--- fail ------------> Error      (terminal-failure)
//!           |
//!           +--- budget-exceeded -> TokenLimit  (pausable; lifted
//!                                                externally back to Queued)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Pending,
    Queued,
    Generating,
    Ready,
    Error,
    TokenLimit,
}

impl TaskStatus {
    /// `Ready` and `Error` absorb all further processing. `TokenLimit` is
    /// deliberately *not* terminal: it is a re-entry point an external
    /// budget-reset process can lift back to `Queued` (spec invariant 3).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }

    /// A task is claimable by status alone iff it is `Pending` or
    /// `Queued`. Stale-`Generating` reclaim is a distinct path (recovery
    /// sweep flips it to `Queued` first); this method does not consult
    /// claim expiry.
    pub fn is_claimable_by_status(&self) -> bool {
        matches!(self, Self::Pending | Self::Queued)
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        use TaskStatus::*;
        match (*self, next) {
            (Pending, Generating) => true,
            (Queued, Generating) => true,
            (Generating, Ready) => true,
            (Generating, Error) => true,
            (Generating, TokenLimit) => true,
            (Generating, Queued) => true, // recovery sweep
            (TokenLimit, Queued) => true, // external budget reset
            _ => false,
        }
    }

    pub fn validate_transition(&self, task_id: &str, next: Self) -> Result<(), QueueError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(QueueError::InvalidTransition {
                task_id: task_id.to_string(),
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Queued => "Queued",
            Self::Generating => "Generating",
            Self::Ready => "Ready",
            Self::Error => "Error",
            Self::TokenLimit => "TokenLimit",
        };
        f.write_str(s)
    }
}
