use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use tradehub_core::domain::notification::Notification;
use tradehub_core::domain::party::{User, UserId};
use tradehub_core::domain::quotation::{Quotation, QuotationId};
use tradehub_core::domain::requirement::{Requirement, RequirementId};
use tradehub_core::domain::transaction::{Transaction, TransactionId};

pub mod memory;
pub mod notification;
pub mod quotation;
pub mod requirement;
pub mod transaction;
pub mod user;

pub use memory::{
    InMemoryNotificationRepository, InMemoryQuotationRepository, InMemoryTransactionRepository,
};
pub use notification::SqlNotificationRepository;
pub use quotation::{QuotationDetail, SqlQuotationRepository};
pub use requirement::SqlRequirementRepository;
pub use transaction::{SqlTransactionRepository, TransactionDetail};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RequirementRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequirementId) -> Result<Option<Requirement>, RepositoryError>;
    async fn save(&self, requirement: Requirement) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError>;
    async fn save(&self, quotation: Quotation) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_id(&self, id: &TransactionId) -> Result<Option<Transaction>, RepositoryError>;
    async fn save(&self, transaction: Transaction) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: Notification) -> Result<(), RepositoryError>;
    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Notification>, RepositoryError>;
}

// Shared column decoding for the TEXT-encoded datetime and decimal columns.

pub(crate) fn decode_datetime(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{raw}`: {e}")))
}

pub(crate) fn decode_opt_datetime(
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.as_deref().map(decode_datetime).transpose()
}

pub(crate) fn decode_decimal(raw: &str) -> Result<Decimal, RepositoryError> {
    raw.parse::<Decimal>()
        .map_err(|e| RepositoryError::Decode(format!("bad decimal `{raw}`: {e}")))
}

pub(crate) fn decode_opt_decimal(raw: Option<String>) -> Result<Option<Decimal>, RepositoryError> {
    raw.as_deref().map(decode_decimal).transpose()
}
