//! Per-action authorization matrix for the quotation and transaction
//! endpoints. Three identities matter: the requirement owner (buyer), the
//! quotation submitter (supplier), and admins. Everyone else is rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::party::{Role, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationAction {
    Accept,
    Reject,
    Shortlist,
    Withdraw,
    Update,
}

impl QuotationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Reject => "REJECT",
            Self::Shortlist => "SHORTLIST",
            Self::Withdraw => "WITHDRAW",
            Self::Update => "UPDATE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACCEPT" => Some(Self::Accept),
            "REJECT" => Some(Self::Reject),
            "SHORTLIST" => Some(Self::Shortlist),
            "WITHDRAW" => Some(Self::Withdraw),
            "UPDATE" => Some(Self::Update),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionAction {
    ConfirmDelivery,
    ApproveQuality,
    VerifyDocuments,
    ReleaseFunds,
    Refund,
    Dispute,
    UpdateStatus,
}

impl TransactionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmDelivery => "CONFIRM_DELIVERY",
            Self::ApproveQuality => "APPROVE_QUALITY",
            Self::VerifyDocuments => "VERIFY_DOCUMENTS",
            Self::ReleaseFunds => "RELEASE_FUNDS",
            Self::Refund => "REFUND",
            Self::Dispute => "DISPUTE",
            Self::UpdateStatus => "UPDATE_STATUS",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CONFIRM_DELIVERY" => Some(Self::ConfirmDelivery),
            "APPROVE_QUALITY" => Some(Self::ApproveQuality),
            "VERIFY_DOCUMENTS" => Some(Self::VerifyDocuments),
            "RELEASE_FUNDS" => Some(Self::ReleaseFunds),
            "REFUND" => Some(Self::Refund),
            "DISPUTE" => Some(Self::Dispute),
            "UPDATE_STATUS" => Some(Self::UpdateStatus),
            _ => None,
        }
    }
}

/// The acting identity, resolved from the session by the HTTP layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: UserId(id.into()), role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{actor_role} {} may not perform {action}", actor_id.0)]
pub struct AuthzError {
    pub action: &'static str,
    pub actor_id: UserId,
    pub actor_role: &'static str,
}

fn forbidden(action: &'static str, actor: &Actor) -> AuthzError {
    AuthzError { action, actor_id: actor.id.clone(), actor_role: actor.role.as_str() }
}

/// Quotation actions: ACCEPT/REJECT/SHORTLIST belong to the requirement's
/// buyer, WITHDRAW/UPDATE to the submitting supplier. Admins may do any.
pub fn authorize_quotation(
    action: QuotationAction,
    actor: &Actor,
    requirement_buyer: &UserId,
    submitter: &UserId,
) -> Result<(), AuthzError> {
    if actor.is_admin() {
        return Ok(());
    }
    let allowed = match action {
        QuotationAction::Accept | QuotationAction::Reject | QuotationAction::Shortlist => {
            actor.role == Role::Buyer && actor.id == *requirement_buyer
        }
        QuotationAction::Withdraw | QuotationAction::Update => {
            actor.role == Role::Supplier && actor.id == *submitter
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(forbidden(action.as_str(), actor))
    }
}

/// Transaction actions: buyers act only on their own transactions; document
/// verification, force-release, and refund are admin-only; the generic
/// status update is open to either party of the transaction (the transition
/// table still applies to non-admins).
pub fn authorize_transaction(
    action: TransactionAction,
    actor: &Actor,
    buyer: &UserId,
    supplier: &UserId,
) -> Result<(), AuthzError> {
    if actor.is_admin() {
        return Ok(());
    }
    let allowed = match action {
        TransactionAction::ConfirmDelivery
        | TransactionAction::ApproveQuality
        | TransactionAction::Dispute => actor.role == Role::Buyer && actor.id == *buyer,
        TransactionAction::VerifyDocuments
        | TransactionAction::ReleaseFunds
        | TransactionAction::Refund => false,
        TransactionAction::UpdateStatus => {
            (actor.role == Role::Buyer && actor.id == *buyer)
                || (actor.role == Role::Supplier && actor.id == *supplier)
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(forbidden(action.as_str(), actor))
    }
}
