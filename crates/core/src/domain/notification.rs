use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::party::UserId;

/// Notification categories emitted on key transitions. Delivery is
/// fire-and-forget: rows are inserted best-effort and never block the
/// primary state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    QuotationAccepted,
    QuotationRejected,
    TransactionUpdated,
    EscrowReleased,
    EscrowRefunded,
    TransactionDisputed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotationAccepted => "QUOTATION_ACCEPTED",
            Self::QuotationRejected => "QUOTATION_REJECTED",
            Self::TransactionUpdated => "TRANSACTION_UPDATED",
            Self::EscrowReleased => "ESCROW_RELEASED",
            Self::EscrowRefunded => "ESCROW_REFUNDED",
            Self::TransactionDisputed => "TRANSACTION_DISPUTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "QUOTATION_ACCEPTED" => Some(Self::QuotationAccepted),
            "QUOTATION_REJECTED" => Some(Self::QuotationRejected),
            "TRANSACTION_UPDATED" => Some(Self::TransactionUpdated),
            "ESCROW_RELEASED" => Some(Self::EscrowReleased),
            "ESCROW_REFUNDED" => Some(Self::EscrowRefunded),
            "TRANSACTION_DISPUTED" => Some(Self::TransactionDisputed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub reference_id: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        reference_id: Option<String>,
    ) -> Self {
        Self {
            id: format!("NTF-{}", Uuid::new_v4().simple()),
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            reference_id,
            read_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::party::UserId;

    use super::{Notification, NotificationKind};

    #[test]
    fn kind_round_trips_through_wire_form() {
        for kind in [
            NotificationKind::QuotationAccepted,
            NotificationKind::QuotationRejected,
            NotificationKind::TransactionUpdated,
            NotificationKind::EscrowReleased,
            NotificationKind::EscrowRefunded,
            NotificationKind::TransactionDisputed,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn new_notifications_start_unread() {
        let notification = Notification::new(
            UserId("buyer-1".to_string()),
            NotificationKind::QuotationAccepted,
            "Quotation accepted",
            "Your quotation was accepted",
            Some("QUO-1".to_string()),
        );
        assert!(notification.read_at.is_none());
        assert!(notification.id.starts_with("NTF-"));
    }
}
