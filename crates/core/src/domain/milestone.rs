use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::transaction::{TransactionId, TransactionStatus};

/// Append-only audit record of a transaction state change. Milestones are
/// written in the same database transaction as the change they describe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionMilestone {
    pub id: String,
    pub transaction_id: TransactionId,
    pub actor: String,
    pub description: String,
    pub status_from: Option<TransactionStatus>,
    pub status_to: Option<TransactionStatus>,
    pub occurred_at: DateTime<Utc>,
}

impl TransactionMilestone {
    pub fn new(
        transaction_id: TransactionId,
        actor: impl Into<String>,
        description: impl Into<String>,
        status_from: Option<TransactionStatus>,
        status_to: Option<TransactionStatus>,
    ) -> Self {
        Self {
            id: format!("MIL-{}", Uuid::new_v4().simple()),
            transaction_id,
            actor: actor.into(),
            description: description.into(),
            status_from,
            status_to,
            occurred_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::transaction::{TransactionId, TransactionStatus};

    use super::TransactionMilestone;

    #[test]
    fn new_milestones_get_prefixed_ids() {
        let milestone = TransactionMilestone::new(
            TransactionId("TXN-1".to_string()),
            "buyer-1",
            "Delivery confirmed by buyer",
            Some(TransactionStatus::InTransit),
            Some(TransactionStatus::Delivered),
        );
        assert!(milestone.id.starts_with("MIL-"));
        assert_eq!(milestone.status_to, Some(TransactionStatus::Delivered));
    }
}
