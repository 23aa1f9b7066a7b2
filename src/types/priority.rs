//! Task priority. Smaller numeric value means higher priority; ordering
//! (`Ord`) falls directly out of declaration order plus `#[repr]`-free
//! discriminant values, so `GetNextTask`'s "minimum priority" contract is
//! just `Ord::min` over the claimable set.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Urgent = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgent_sorts_before_low() {
        assert!(Priority::Urgent < Priority::Low);
        assert!(Priority::High < Priority::Medium);
    }

    #[test]
    fn min_picks_highest_priority() {
        let candidates = [Priority::Medium, Priority::Urgent, Priority::Low];
        assert_eq!(candidates.iter().min().copied(), Some(Priority::Urgent));
    }

    #[test]
    fn serde_round_trip_is_camel_case() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "\"high\"");
        let back: Priority = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Priority::High);
    }
}
