//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Status of a request to join another family.
///
/// `Pending` is the only non-terminal state: a request is approved or
/// rejected exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "join_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum JoinStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl JoinStatus {
    /// Whether no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for JoinStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for JoinStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("invalid join status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_status_roundtrips_through_str() {
        for status in [JoinStatus::Pending, JoinStatus::Approved, JoinStatus::Rejected] {
            assert_eq!(status.to_string().parse::<JoinStatus>(), Ok(status));
        }
        assert!("unknown".parse::<JoinStatus>().is_err());
    }

    #[test]
    fn test_only_pending_is_open() {
        assert!(!JoinStatus::Pending.is_terminal());
        assert!(JoinStatus::Approved.is_terminal());
        assert!(JoinStatus::Rejected.is_terminal());
    }
}
