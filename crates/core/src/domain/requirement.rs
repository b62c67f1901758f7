use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::party::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementStatus {
    Sourcing,
    Verified,
    Quoted,
    Accepted,
    Closed,
    Cancelled,
}

impl RequirementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sourcing => "SOURCING",
            Self::Verified => "VERIFIED",
            Self::Quoted => "QUOTED",
            Self::Accepted => "ACCEPTED",
            Self::Closed => "CLOSED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SOURCING" => Some(Self::Sourcing),
            "VERIFIED" => Some(Self::Verified),
            "QUOTED" => Some(Self::Quoted),
            "ACCEPTED" => Some(Self::Accepted),
            "CLOSED" => Some(Self::Closed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// A quotation on this requirement can still be accepted. Once a sibling
    /// was accepted (or the requirement was closed out) the window is shut.
    pub fn accepts_quotations(&self) -> bool {
        matches!(self, Self::Sourcing | Self::Verified | Self::Quoted)
    }
}

/// A buyer's sourcing request. Quotations reference it; the assigned
/// account manager mediates verification before admin review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub buyer_id: UserId,
    pub account_manager_id: Option<UserId>,
    pub title: String,
    pub category: String,
    pub quantity: u32,
    pub unit: String,
    pub budget: Option<Decimal>,
    pub currency: String,
    pub status: RequirementStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::RequirementStatus;

    #[test]
    fn open_statuses_accept_quotations() {
        assert!(RequirementStatus::Sourcing.accepts_quotations());
        assert!(RequirementStatus::Verified.accepts_quotations());
        assert!(RequirementStatus::Quoted.accepts_quotations());
    }

    #[test]
    fn settled_statuses_reject_quotations() {
        assert!(!RequirementStatus::Accepted.accepts_quotations());
        assert!(!RequirementStatus::Closed.accepts_quotations());
        assert!(!RequirementStatus::Cancelled.accepts_quotations());
    }

    #[test]
    fn status_round_trips_through_wire_form() {
        for status in [
            RequirementStatus::Sourcing,
            RequirementStatus::Verified,
            RequirementStatus::Quoted,
            RequirementStatus::Accepted,
            RequirementStatus::Closed,
            RequirementStatus::Cancelled,
        ] {
            assert_eq!(RequirementStatus::parse(status.as_str()), Some(status));
        }
    }
}
