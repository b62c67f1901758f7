use std::collections::HashMap;

use tokio::sync::RwLock;

use tradehub_core::domain::notification::Notification;
use tradehub_core::domain::party::UserId;
use tradehub_core::domain::quotation::{Quotation, QuotationId};
use tradehub_core::domain::transaction::{Transaction, TransactionId};

use super::{
    NotificationRepository, QuotationRepository, RepositoryError, TransactionRepository,
};

#[derive(Default)]
pub struct InMemoryQuotationRepository {
    quotations: RwLock<HashMap<String, Quotation>>,
}

#[async_trait::async_trait]
impl QuotationRepository for InMemoryQuotationRepository {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        let quotations = self.quotations.read().await;
        Ok(quotations.get(&id.0).cloned())
    }

    async fn save(&self, quotation: Quotation) -> Result<(), RepositoryError> {
        let mut quotations = self.quotations.write().await;
        quotations.insert(quotation.id.0.clone(), quotation);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    transactions: RwLock<HashMap<String, Transaction>>,
}

#[async_trait::async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn find_by_id(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(&id.0).cloned())
    }

    async fn save(&self, transaction: Transaction) -> Result<(), RepositoryError> {
        let mut transactions = self.transactions.write().await;
        transactions.insert(transaction.id.0.clone(), transaction);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: RwLock<Vec<Notification>>,
}

#[async_trait::async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn create(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut notifications = self.notifications.write().await;
        notifications.push(notification);
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .iter()
            .filter(|n| n.user_id == *user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use tradehub_core::domain::notification::{Notification, NotificationKind};
    use tradehub_core::domain::party::UserId;
    use tradehub_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
    use tradehub_core::domain::requirement::RequirementId;
    use tradehub_core::domain::transaction::{Transaction, TransactionId, TransactionStatus};

    use crate::repositories::{
        InMemoryNotificationRepository, InMemoryQuotationRepository,
        InMemoryTransactionRepository, NotificationRepository, QuotationRepository,
        TransactionRepository,
    };

    #[tokio::test]
    async fn in_memory_quotation_repo_round_trip() {
        let repo = InMemoryQuotationRepository::default();
        let now = Utc::now();
        let quotation = Quotation {
            id: QuotationId("QUO-1".to_string()),
            requirement_id: RequirementId("REQ-1".to_string()),
            supplier_id: UserId("supplier-1".to_string()),
            status: QuotationStatus::Submitted,
            unit_price: Decimal::new(10_00, 2),
            quantity: 5,
            subtotal: Decimal::new(50_00, 2),
            platform_fee: Decimal::new(1_00, 2),
            total: Decimal::new(51_00, 2),
            currency: "USD".to_string(),
            lead_time_days: 7,
            notes: None,
            valid_until: now + Duration::days(7),
            accepted_at: None,
            accepted_by: None,
            created_at: now,
            updated_at: now,
        };

        repo.save(quotation.clone()).await.expect("save quotation");
        let found = repo.find_by_id(&quotation.id).await.expect("find quotation");

        assert_eq!(found, Some(quotation));
    }

    #[tokio::test]
    async fn in_memory_transaction_repo_round_trip() {
        let repo = InMemoryTransactionRepository::default();
        let now = Utc::now();
        let transaction = Transaction {
            id: TransactionId("TXN-1".to_string()),
            quotation_id: QuotationId("QUO-1".to_string()),
            requirement_id: RequirementId("REQ-1".to_string()),
            buyer_id: UserId("buyer-1".to_string()),
            supplier_id: UserId("supplier-1".to_string()),
            amount: Decimal::new(51_00, 2),
            currency: "USD".to_string(),
            status: TransactionStatus::PaymentPending,
            expected_delivery: None,
            actual_delivery: None,
            tracking_number: None,
            created_at: now,
            updated_at: now,
        };

        repo.save(transaction.clone()).await.expect("save transaction");
        let found = repo.find_by_id(&transaction.id).await.expect("find transaction");

        assert_eq!(found, Some(transaction));
    }

    #[tokio::test]
    async fn in_memory_notification_repo_filters_by_user() {
        let repo = InMemoryNotificationRepository::default();
        let supplier = UserId("supplier-1".to_string());

        repo.create(Notification::new(
            supplier.clone(),
            NotificationKind::QuotationAccepted,
            "Accepted",
            "QUO-1 accepted",
            None,
        ))
        .await
        .expect("create");
        repo.create(Notification::new(
            UserId("admin-1".to_string()),
            NotificationKind::QuotationAccepted,
            "Accepted",
            "QUO-1 accepted",
            None,
        ))
        .await
        .expect("create");

        let listed = repo.list_for_user(&supplier, 10).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].user_id, supplier);
    }
}
