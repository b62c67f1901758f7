use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::party::UserId;
use crate::domain::transaction::TransactionId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    Held,
    Released,
    Refunded,
    Disputed,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "HELD",
            Self::Released => "RELEASED",
            Self::Refunded => "REFUNDED",
            Self::Disputed => "DISPUTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "HELD" => Some(Self::Held),
            "RELEASED" => Some(Self::Released),
            "REFUNDED" => Some(Self::Refunded),
            "DISPUTED" => Some(Self::Disputed),
            _ => None,
        }
    }
}

/// The three independently-satisfiable gates controlling escrow release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    DeliveryConfirmed,
    QualityApproved,
    DocumentsVerified,
}

impl ConditionType {
    pub const ALL: [ConditionType; 3] =
        [Self::DeliveryConfirmed, Self::QualityApproved, Self::DocumentsVerified];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeliveryConfirmed => "DELIVERY_CONFIRMED",
            Self::QualityApproved => "QUALITY_APPROVED",
            Self::DocumentsVerified => "DOCUMENTS_VERIFIED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "DELIVERY_CONFIRMED" => Some(Self::DeliveryConfirmed),
            "QUALITY_APPROVED" => Some(Self::QualityApproved),
            "DOCUMENTS_VERIFIED" => Some(Self::DocumentsVerified),
            _ => None,
        }
    }
}

/// Held funds for one transaction. The condition booleans are the source of
/// truth for auto-release; `release_condition` rows mirror them for audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscrowAccount {
    pub id: EscrowId,
    pub transaction_id: TransactionId,
    pub amount: Decimal,
    pub currency: String,
    pub status: EscrowStatus,
    pub delivery_confirmed: bool,
    pub quality_approved: bool,
    pub documents_verified: bool,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub dispute_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscrowAccount {
    pub fn condition(&self, condition: ConditionType) -> bool {
        match condition {
            ConditionType::DeliveryConfirmed => self.delivery_confirmed,
            ConditionType::QualityApproved => self.quality_approved,
            ConditionType::DocumentsVerified => self.documents_verified,
        }
    }

    /// The release invariant: funds move iff all three conditions hold while
    /// the escrow is still `HELD`.
    pub fn release_ready(&self) -> bool {
        self.status == EscrowStatus::Held
            && self.delivery_confirmed
            && self.quality_approved
            && self.documents_verified
    }

    /// Re-satisfying an already-satisfied condition is a conflict, not an
    /// idempotent no-op: it would duplicate milestone rows downstream.
    pub fn ensure_condition_unsatisfied(&self, condition: ConditionType) -> Result<(), DomainError> {
        if self.condition(condition) {
            return Err(DomainError::ConditionAlreadySatisfied { condition });
        }
        Ok(())
    }

    pub fn ensure_releasable(&self) -> Result<(), DomainError> {
        if self.status == EscrowStatus::Released {
            return Err(DomainError::EscrowAlreadyReleased { escrow: self.id.clone() });
        }
        Ok(())
    }

    pub fn ensure_refundable(&self) -> Result<(), DomainError> {
        match self.status {
            EscrowStatus::Released => {
                Err(DomainError::EscrowAlreadyReleased { escrow: self.id.clone() })
            }
            EscrowStatus::Refunded => {
                Err(DomainError::EscrowAlreadyRefunded { escrow: self.id.clone() })
            }
            _ => Ok(()),
        }
    }
}

/// Normalized mirror of one escrow condition boolean, carrying satisfier
/// identity for the audit trail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReleaseCondition {
    pub id: String,
    pub escrow_id: EscrowId,
    pub condition_type: ConditionType,
    pub satisfied: bool,
    pub satisfied_by: Option<UserId>,
    pub satisfied_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::transaction::TransactionId;
    use crate::errors::DomainError;

    use super::{ConditionType, EscrowAccount, EscrowId, EscrowStatus};

    fn escrow(status: EscrowStatus) -> EscrowAccount {
        let now = Utc::now();
        EscrowAccount {
            id: EscrowId("ESC-1".to_string()),
            transaction_id: TransactionId("TXN-1".to_string()),
            amount: Decimal::new(1275_00, 2),
            currency: "USD".to_string(),
            status,
            delivery_confirmed: false,
            quality_approved: false,
            documents_verified: false,
            released_at: None,
            refunded_at: None,
            dispute_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn release_requires_all_three_conditions() {
        let mut escrow = escrow(EscrowStatus::Held);
        assert!(!escrow.release_ready());

        escrow.delivery_confirmed = true;
        escrow.quality_approved = true;
        assert!(!escrow.release_ready(), "two of three must never release");

        escrow.documents_verified = true;
        assert!(escrow.release_ready());
    }

    #[test]
    fn every_two_of_three_combination_holds_funds() {
        for skipped in ConditionType::ALL {
            let mut escrow = escrow(EscrowStatus::Held);
            for condition in ConditionType::ALL {
                if condition != skipped {
                    match condition {
                        ConditionType::DeliveryConfirmed => escrow.delivery_confirmed = true,
                        ConditionType::QualityApproved => escrow.quality_approved = true,
                        ConditionType::DocumentsVerified => escrow.documents_verified = true,
                    }
                }
            }
            assert!(!escrow.release_ready(), "missing {skipped:?} must hold funds");
        }
    }

    #[test]
    fn release_requires_held_status() {
        let mut escrow = escrow(EscrowStatus::Disputed);
        escrow.delivery_confirmed = true;
        escrow.quality_approved = true;
        escrow.documents_verified = true;
        assert!(!escrow.release_ready());
    }

    #[test]
    fn resatisfying_a_condition_is_a_conflict() {
        let mut escrow = escrow(EscrowStatus::Held);
        escrow.quality_approved = true;
        let error = escrow
            .ensure_condition_unsatisfied(ConditionType::QualityApproved)
            .expect_err("already satisfied");
        assert!(matches!(
            error,
            DomainError::ConditionAlreadySatisfied { condition: ConditionType::QualityApproved }
        ));
        escrow.ensure_condition_unsatisfied(ConditionType::DeliveryConfirmed).expect("still open");
    }

    #[test]
    fn released_escrow_cannot_release_or_refund_again() {
        let escrow = escrow(EscrowStatus::Released);
        assert!(matches!(
            escrow.ensure_releasable(),
            Err(DomainError::EscrowAlreadyReleased { .. })
        ));
        assert!(matches!(
            escrow.ensure_refundable(),
            Err(DomainError::EscrowAlreadyReleased { .. })
        ));
    }

    #[test]
    fn refunded_escrow_cannot_refund_again_but_disputed_can() {
        assert!(matches!(
            escrow(EscrowStatus::Refunded).ensure_refundable(),
            Err(DomainError::EscrowAlreadyRefunded { .. })
        ));
        escrow(EscrowStatus::Disputed).ensure_refundable().expect("disputes can refund");
        escrow(EscrowStatus::Held).ensure_refundable().expect("held can refund");
    }
}
