use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::party::{KybStatus, UserId};
use crate::domain::requirement::RequirementStatus;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationStatus {
    Submitted,
    UnderReview,
    Shortlisted,
    ApprovedByAdmin,
    Accepted,
    Rejected,
    Declined,
    Expired,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Shortlisted => "SHORTLISTED",
            Self::ApprovedByAdmin => "APPROVED_BY_ADMIN",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Declined => "DECLINED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SUBMITTED" => Some(Self::Submitted),
            "UNDER_REVIEW" => Some(Self::UnderReview),
            "SHORTLISTED" => Some(Self::Shortlisted),
            "APPROVED_BY_ADMIN" => Some(Self::ApprovedByAdmin),
            "ACCEPTED" => Some(Self::Accepted),
            "REJECTED" => Some(Self::Rejected),
            "DECLINED" => Some(Self::Declined),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Still in play: accepting a sibling bulk-declines quotations in any of
    /// these statuses.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Submitted | Self::UnderReview | Self::Shortlisted | Self::ApprovedByAdmin
        )
    }

    /// The active set as stored wire values, for SQL `IN (...)` clauses.
    pub const ACTIVE_WIRE: [&'static str; 4] =
        ["SUBMITTED", "UNDER_REVIEW", "SHORTLISTED", "APPROVED_BY_ADMIN"];
}

/// A supplier's price-and-terms offer against a requirement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub requirement_id: crate::domain::requirement::RequirementId,
    pub supplier_id: UserId,
    pub status: QuotationStatus,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
    pub platform_fee: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub lead_time_days: u32,
    pub notes: Option<String>,
    pub valid_until: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until < now
    }

    /// Preconditions for ACCEPT, checked in order: not already accepted, not
    /// past `valid_until`, parent requirement still open, requirement owner
    /// KYB-verified. The caller has already established who is acting.
    pub fn ensure_acceptable(
        &self,
        requirement_status: RequirementStatus,
        buyer_kyb: KybStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status == QuotationStatus::Accepted {
            return Err(DomainError::QuotationAlreadyAccepted { quotation: self.id.clone() });
        }
        if self.is_expired(now) {
            return Err(DomainError::QuotationExpired {
                quotation: self.id.clone(),
                valid_until: self.valid_until,
            });
        }
        if !requirement_status.accepts_quotations() {
            return Err(DomainError::RequirementNotOpen {
                requirement: self.requirement_id.clone(),
                status: requirement_status,
            });
        }
        if !buyer_kyb.is_completed() {
            return Err(DomainError::KybIncomplete { status: buyer_kyb });
        }
        Ok(())
    }

    /// REJECT preconditions: a quotation that was accepted or already
    /// rejected stays put.
    pub fn ensure_rejectable(&self) -> Result<(), DomainError> {
        match self.status {
            QuotationStatus::Accepted => {
                Err(DomainError::QuotationAlreadyAccepted { quotation: self.id.clone() })
            }
            QuotationStatus::Rejected => {
                Err(DomainError::QuotationAlreadyRejected { quotation: self.id.clone() })
            }
            _ => Ok(()),
        }
    }

    /// Shared precondition for SHORTLIST, WITHDRAW, and UPDATE: an accepted
    /// quotation is immutable.
    pub fn ensure_mutable(&self) -> Result<(), DomainError> {
        if self.status == QuotationStatus::Accepted {
            return Err(DomainError::QuotationAlreadyAccepted { quotation: self.id.clone() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use crate::domain::party::{KybStatus, UserId};
    use crate::domain::requirement::{RequirementId, RequirementStatus};
    use crate::errors::DomainError;

    use super::{Quotation, QuotationId, QuotationStatus};

    fn quotation(status: QuotationStatus) -> Quotation {
        let now = Utc::now();
        Quotation {
            id: QuotationId("QUO-1".to_string()),
            requirement_id: RequirementId("REQ-1".to_string()),
            supplier_id: UserId("supplier-1".to_string()),
            status,
            unit_price: Decimal::new(12_50, 2),
            quantity: 100,
            subtotal: Decimal::new(1250_00, 2),
            platform_fee: Decimal::new(25_00, 2),
            total: Decimal::new(1275_00, 2),
            currency: "USD".to_string(),
            lead_time_days: 14,
            notes: None,
            valid_until: now + Duration::days(7),
            accepted_at: None,
            accepted_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn submitted_quotation_passes_accept_preconditions() {
        let quotation = quotation(QuotationStatus::Submitted);
        quotation
            .ensure_acceptable(RequirementStatus::Sourcing, KybStatus::Completed, Utc::now())
            .expect("open quotation should be acceptable");
    }

    #[test]
    fn accepted_quotation_cannot_be_accepted_again() {
        let quotation = quotation(QuotationStatus::Accepted);
        let error = quotation
            .ensure_acceptable(RequirementStatus::Sourcing, KybStatus::Completed, Utc::now())
            .expect_err("double accept must fail");
        assert!(matches!(error, DomainError::QuotationAlreadyAccepted { .. }));
    }

    #[test]
    fn expired_quotation_cannot_be_accepted() {
        let mut quotation = quotation(QuotationStatus::Submitted);
        quotation.valid_until = Utc::now() - Duration::hours(1);
        let error = quotation
            .ensure_acceptable(RequirementStatus::Sourcing, KybStatus::Completed, Utc::now())
            .expect_err("expired quotation must fail");
        assert!(matches!(error, DomainError::QuotationExpired { .. }));
    }

    #[test]
    fn closed_requirement_blocks_acceptance() {
        let quotation = quotation(QuotationStatus::Submitted);
        let error = quotation
            .ensure_acceptable(RequirementStatus::Accepted, KybStatus::Completed, Utc::now())
            .expect_err("requirement already settled");
        assert!(matches!(error, DomainError::RequirementNotOpen { .. }));
    }

    #[test]
    fn incomplete_kyb_blocks_acceptance() {
        let quotation = quotation(QuotationStatus::Submitted);
        let error = quotation
            .ensure_acceptable(RequirementStatus::Sourcing, KybStatus::InReview, Utc::now())
            .expect_err("unverified buyer must fail");
        assert!(matches!(error, DomainError::KybIncomplete { .. }));
    }

    #[test]
    fn rejection_is_blocked_for_terminal_decisions() {
        assert!(matches!(
            quotation(QuotationStatus::Accepted).ensure_rejectable(),
            Err(DomainError::QuotationAlreadyAccepted { .. })
        ));
        assert!(matches!(
            quotation(QuotationStatus::Rejected).ensure_rejectable(),
            Err(DomainError::QuotationAlreadyRejected { .. })
        ));
        quotation(QuotationStatus::Shortlisted).ensure_rejectable().expect("still open");
    }

    #[test]
    fn active_statuses_match_bulk_decline_set() {
        assert!(QuotationStatus::Submitted.is_active());
        assert!(QuotationStatus::UnderReview.is_active());
        assert!(QuotationStatus::Shortlisted.is_active());
        assert!(QuotationStatus::ApprovedByAdmin.is_active());
        assert!(!QuotationStatus::Accepted.is_active());
        assert!(!QuotationStatus::Declined.is_active());
        assert!(!QuotationStatus::Expired.is_active());
        assert_eq!(QuotationStatus::ACTIVE_WIRE.len(), 4);
    }
}
