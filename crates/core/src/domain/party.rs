use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Business roles recognized by the platform. Authorization decisions are
/// made per-action against the acting user's role plus record ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Buyer,
    Supplier,
    Admin,
    AccountManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "BUYER",
            Self::Supplier => "SUPPLIER",
            Self::Admin => "ADMIN",
            Self::AccountManager => "ACCOUNT_MANAGER",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "BUYER" => Some(Self::Buyer),
            "SUPPLIER" => Some(Self::Supplier),
            "ADMIN" => Some(Self::Admin),
            "ACCOUNT_MANAGER" => Some(Self::AccountManager),
            _ => None,
        }
    }
}

/// Know-Your-Business verification state. Quotation acceptance is gated on
/// the requirement owner holding `Completed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KybStatus {
    Pending,
    InReview,
    Completed,
    Rejected,
}

impl KybStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InReview => "IN_REVIEW",
            Self::Completed => "COMPLETED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(Self::Pending),
            "IN_REVIEW" => Some(Self::InReview),
            "COMPLETED" => Some(Self::Completed),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub kyb_status: KybStatus,
    pub created_at: DateTime<Utc>,
}
