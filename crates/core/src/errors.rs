use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::escrow::{ConditionType, EscrowId};
use crate::domain::party::KybStatus;
use crate::domain::quotation::QuotationId;
use crate::domain::requirement::{RequirementId, RequirementStatus};
use crate::domain::transaction::{TransactionId, TransactionStatus};

/// Precondition and invariant violations raised by domain guards. Every
/// "already in state X" case is an explicit variant so callers can map each
/// to a distinct response instead of leaning on database constraint errors.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("quotation {} is already accepted", quotation.0)]
    QuotationAlreadyAccepted { quotation: QuotationId },
    #[error("quotation {} is already rejected", quotation.0)]
    QuotationAlreadyRejected { quotation: QuotationId },
    #[error("quotation {} expired at {valid_until}", quotation.0)]
    QuotationExpired { quotation: QuotationId, valid_until: DateTime<Utc> },
    #[error("requirement {} is not open for acceptance (status {})", requirement.0, status.as_str())]
    RequirementNotOpen { requirement: RequirementId, status: RequirementStatus },
    #[error("buyer KYB verification incomplete (status {})", status.as_str())]
    KybIncomplete { status: KybStatus },
    #[error("invalid transaction transition from {} to {}", from.as_str(), to.as_str())]
    InvalidTransactionTransition { from: TransactionStatus, to: TransactionStatus },
    #[error("condition {} is already satisfied", condition.as_str())]
    ConditionAlreadySatisfied { condition: ConditionType },
    #[error("escrow {} is already released", escrow.0)]
    EscrowAlreadyReleased { escrow: EscrowId },
    #[error("escrow {} is already refunded", escrow.0)]
    EscrowAlreadyRefunded { escrow: EscrowId },
    #[error("transaction {} has no escrow account", transaction.0)]
    EscrowMissing { transaction: TransactionId },
    #[error("delivery cannot be confirmed while transaction is {}", status.as_str())]
    DeliveryNotConfirmable { status: TransactionStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    /// Conflicts describe a state the record already reached; the rest are
    /// rejected inputs. The HTTP layer maps this to 409 vs 400.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::QuotationAlreadyAccepted { .. }
                | Self::QuotationAlreadyRejected { .. }
                | Self::ConditionAlreadySatisfied { .. }
                | Self::EscrowAlreadyReleased { .. }
                | Self::EscrowAlreadyRefunded { .. }
        )
    }
}
