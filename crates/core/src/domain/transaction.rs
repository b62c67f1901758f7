use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::party::UserId;
use crate::domain::quotation::QuotationId;
use crate::domain::requirement::RequirementId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    PaymentPending,
    PaymentReceived,
    Processing,
    Shipped,
    InTransit,
    Delivered,
    Completed,
    Refunded,
    Disputed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentPending => "PAYMENT_PENDING",
            Self::PaymentReceived => "PAYMENT_RECEIVED",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::Completed => "COMPLETED",
            Self::Refunded => "REFUNDED",
            Self::Disputed => "DISPUTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PAYMENT_PENDING" => Some(Self::PaymentPending),
            "PAYMENT_RECEIVED" => Some(Self::PaymentReceived),
            "PROCESSING" => Some(Self::Processing),
            "SHIPPED" => Some(Self::Shipped),
            "IN_TRANSIT" => Some(Self::InTransit),
            "DELIVERED" => Some(Self::Delivered),
            "COMPLETED" => Some(Self::Completed),
            "REFUNDED" => Some(Self::Refunded),
            "DISPUTED" => Some(Self::Disputed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// The fixed adjacency table for generic status updates. Admins bypass
    /// this; every other actor is held to it.
    pub fn allowed_transitions(&self) -> &'static [TransactionStatus] {
        use TransactionStatus::*;
        match self {
            PaymentPending => &[PaymentReceived, Cancelled],
            PaymentReceived => &[Processing, Refunded],
            Processing => &[Shipped, Cancelled],
            Shipped => &[InTransit],
            InTransit => &[Delivered],
            Delivered => &[Completed, Disputed],
            Disputed => &[Refunded, Completed],
            Completed | Refunded | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Delivery confirmation is only meaningful once goods have left the
    /// supplier.
    pub fn delivery_confirmable(&self) -> bool {
        matches!(self, Self::Shipped | Self::InTransit | Self::Delivered)
    }
}

/// The settlement record created once a quotation is accepted. Funds sit in
/// the paired escrow account until release conditions are met.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub quotation_id: QuotationId,
    pub requirement_id: RequirementId,
    pub buyer_id: UserId,
    pub supplier_id: UserId,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn validate_transition(&self, next: TransactionStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            return Ok(());
        }
        Err(DomainError::InvalidTransactionTransition { from: self.status, to: next })
    }
}
