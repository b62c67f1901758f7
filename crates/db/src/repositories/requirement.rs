use sqlx::Row;

use tradehub_core::domain::party::UserId;
use tradehub_core::domain::requirement::{Requirement, RequirementId, RequirementStatus};

use super::{decode_datetime, decode_opt_decimal, RepositoryError, RequirementRepository};
use crate::DbPool;

pub struct SqlRequirementRepository {
    pool: DbPool,
}

impl SqlRequirementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_buyer(
        &self,
        buyer_id: &UserId,
    ) -> Result<Vec<Requirement>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, buyer_id, account_manager_id, title, category, quantity, unit,
                    budget, currency, status, created_at, updated_at
             FROM requirement WHERE buyer_id = ? ORDER BY created_at DESC",
        )
        .bind(&buyer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_requirement).collect()
    }
}

pub(crate) fn row_to_requirement(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Requirement, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let buyer_id: String =
        row.try_get("buyer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let account_manager_id: Option<String> =
        row.try_get("account_manager_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit: String = row.try_get("unit").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let budget: Option<String> =
        row.try_get("budget").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let currency: String =
        row.try_get("currency").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = RequirementStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown requirement status `{status_str}`")))?;

    Ok(Requirement {
        id: RequirementId(id),
        buyer_id: UserId(buyer_id),
        account_manager_id: account_manager_id.map(UserId),
        title,
        category,
        quantity: quantity as u32,
        unit,
        budget: decode_opt_decimal(budget)?,
        currency,
        status,
        created_at: decode_datetime(&created_at_str)?,
        updated_at: decode_datetime(&updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl RequirementRepository for SqlRequirementRepository {
    async fn find_by_id(&self, id: &RequirementId) -> Result<Option<Requirement>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, buyer_id, account_manager_id, title, category, quantity, unit,
                    budget, currency, status, created_at, updated_at
             FROM requirement WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_requirement(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, requirement: Requirement) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO requirement (id, buyer_id, account_manager_id, title, category,
                                      quantity, unit, budget, currency, status,
                                      created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 account_manager_id = excluded.account_manager_id,
                 title = excluded.title,
                 category = excluded.category,
                 quantity = excluded.quantity,
                 unit = excluded.unit,
                 budget = excluded.budget,
                 currency = excluded.currency,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
        )
        .bind(&requirement.id.0)
        .bind(&requirement.buyer_id.0)
        .bind(requirement.account_manager_id.as_ref().map(|id| id.0.clone()))
        .bind(&requirement.title)
        .bind(&requirement.category)
        .bind(requirement.quantity as i64)
        .bind(&requirement.unit)
        .bind(requirement.budget.map(|b| b.to_string()))
        .bind(&requirement.currency)
        .bind(requirement.status.as_str())
        .bind(requirement.created_at.to_rfc3339())
        .bind(requirement.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use tradehub_core::domain::party::{KybStatus, Role, User, UserId};
    use tradehub_core::domain::requirement::{Requirement, RequirementId, RequirementStatus};

    use super::SqlRequirementRepository;
    use crate::repositories::{RequirementRepository, SqlUserRepository, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let users = SqlUserRepository::new(pool.clone());
        users
            .save(User {
                id: UserId("buyer-1".to_string()),
                email: "buyer@example.com".to_string(),
                name: "Buyer".to_string(),
                role: Role::Buyer,
                kyb_status: KybStatus::Completed,
                created_at: Utc::now(),
            })
            .await
            .expect("seed buyer");

        pool
    }

    fn requirement(id: &str) -> Requirement {
        let now = Utc::now();
        Requirement {
            id: RequirementId(id.to_string()),
            buyer_id: UserId("buyer-1".to_string()),
            account_manager_id: None,
            title: "Industrial fasteners".to_string(),
            category: "hardware".to_string(),
            quantity: 5000,
            unit: "pcs".to_string(),
            budget: Some(Decimal::new(12_000_00, 2)),
            currency: "USD".to_string(),
            status: RequirementStatus::Sourcing,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trip() {
        let pool = setup().await;
        let repo = SqlRequirementRepository::new(pool);

        repo.save(requirement("REQ-1")).await.expect("save");
        let found = repo
            .find_by_id(&RequirementId("REQ-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.status, RequirementStatus::Sourcing);
        assert_eq!(found.budget, Some(Decimal::new(12_000_00, 2)));
        assert_eq!(found.quantity, 5000);
    }

    #[tokio::test]
    async fn save_upserts_status_changes() {
        let pool = setup().await;
        let repo = SqlRequirementRepository::new(pool);

        let mut record = requirement("REQ-1");
        repo.save(record.clone()).await.expect("save");

        record.status = RequirementStatus::Accepted;
        repo.save(record).await.expect("upsert");

        let found = repo
            .find_by_id(&RequirementId("REQ-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.status, RequirementStatus::Accepted);
    }

    #[tokio::test]
    async fn list_for_buyer_scopes_by_owner() {
        let pool = setup().await;
        let repo = SqlRequirementRepository::new(pool);

        repo.save(requirement("REQ-1")).await.expect("save");
        repo.save(requirement("REQ-2")).await.expect("save");

        let mine = repo.list_for_buyer(&UserId("buyer-1".to_string())).await.expect("list");
        assert_eq!(mine.len(), 2);

        let theirs = repo.list_for_buyer(&UserId("buyer-2".to_string())).await.expect("list");
        assert!(theirs.is_empty());
    }
}
