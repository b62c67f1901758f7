use sqlx::Row;

use tradehub_core::domain::party::{KybStatus, UserId};
use tradehub_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use tradehub_core::domain::requirement::{RequirementId, RequirementStatus};

use super::{decode_datetime, decode_decimal, decode_opt_datetime, QuotationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQuotationRepository {
    pool: DbPool,
}

/// A quotation joined with the requirement facts every PATCH action needs:
/// who owns the requirement, whether it is still open, and the owner's KYB
/// state.
#[derive(Clone, Debug)]
pub struct QuotationDetail {
    pub quotation: Quotation,
    pub requirement_status: RequirementStatus,
    pub buyer_id: UserId,
    pub buyer_kyb: KybStatus,
    pub account_manager_id: Option<UserId>,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_detail(
        &self,
        id: &QuotationId,
    ) -> Result<Option<QuotationDetail>, RepositoryError> {
        let row = sqlx::query(
            "SELECT q.id, q.requirement_id, q.supplier_id, q.status, q.unit_price, q.quantity,
                    q.subtotal, q.platform_fee, q.total, q.currency, q.lead_time_days, q.notes,
                    q.valid_until, q.accepted_at, q.accepted_by, q.created_at, q.updated_at,
                    r.status AS requirement_status, r.buyer_id, r.account_manager_id,
                    u.kyb_status AS buyer_kyb
             FROM quotation q
             JOIN requirement r ON r.id = q.requirement_id
             JOIN app_user u ON u.id = r.buyer_id
             WHERE q.id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let quotation = row_to_quotation(&row)?;
        let requirement_status_str: String = row
            .try_get("requirement_status")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let requirement_status = RequirementStatus::parse(&requirement_status_str).ok_or_else(
            || RepositoryError::Decode(format!("unknown requirement status `{requirement_status_str}`")),
        )?;
        let buyer_id: String =
            row.try_get("buyer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let account_manager_id: Option<String> = row
            .try_get("account_manager_id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let buyer_kyb_str: String =
            row.try_get("buyer_kyb").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let buyer_kyb = KybStatus::parse(&buyer_kyb_str)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown kyb status `{buyer_kyb_str}`")))?;

        Ok(Some(QuotationDetail {
            quotation,
            requirement_status,
            buyer_id: UserId(buyer_id),
            buyer_kyb,
            account_manager_id: account_manager_id.map(UserId),
        }))
    }

    pub async fn list_for_requirement(
        &self,
        requirement_id: &RequirementId,
    ) -> Result<Vec<Quotation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, requirement_id, supplier_id, status, unit_price, quantity, subtotal,
                    platform_fee, total, currency, lead_time_days, notes, valid_until,
                    accepted_at, accepted_by, created_at, updated_at
             FROM quotation WHERE requirement_id = ? ORDER BY created_at ASC",
        )
        .bind(&requirement_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_quotation).collect()
    }
}

pub(crate) fn row_to_quotation(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Quotation, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requirement_id: String =
        row.try_get("requirement_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let supplier_id: String =
        row.try_get("supplier_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit_price: String =
        row.try_get("unit_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let subtotal: String =
        row.try_get("subtotal").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let platform_fee: String =
        row.try_get("platform_fee").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total: String =
        row.try_get("total").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let currency: String =
        row.try_get("currency").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let lead_time_days: i64 =
        row.try_get("lead_time_days").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let notes: Option<String> =
        row.try_get("notes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let valid_until_str: String =
        row.try_get("valid_until").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let accepted_at_str: Option<String> =
        row.try_get("accepted_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let accepted_by: Option<String> =
        row.try_get("accepted_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = QuotationStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown quotation status `{status_str}`")))?;

    Ok(Quotation {
        id: QuotationId(id),
        requirement_id: RequirementId(requirement_id),
        supplier_id: UserId(supplier_id),
        status,
        unit_price: decode_decimal(&unit_price)?,
        quantity: quantity as u32,
        subtotal: decode_decimal(&subtotal)?,
        platform_fee: decode_decimal(&platform_fee)?,
        total: decode_decimal(&total)?,
        currency,
        lead_time_days: lead_time_days as u32,
        notes,
        valid_until: decode_datetime(&valid_until_str)?,
        accepted_at: decode_opt_datetime(accepted_at_str)?,
        accepted_by: accepted_by.map(UserId),
        created_at: decode_datetime(&created_at_str)?,
        updated_at: decode_datetime(&updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl QuotationRepository for SqlQuotationRepository {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, requirement_id, supplier_id, status, unit_price, quantity, subtotal,
                    platform_fee, total, currency, lead_time_days, notes, valid_until,
                    accepted_at, accepted_by, created_at, updated_at
             FROM quotation WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_quotation(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, quotation: Quotation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO quotation (id, requirement_id, supplier_id, status, unit_price,
                                    quantity, subtotal, platform_fee, total, currency,
                                    lead_time_days, notes, valid_until, accepted_at,
                                    accepted_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 unit_price = excluded.unit_price,
                 quantity = excluded.quantity,
                 subtotal = excluded.subtotal,
                 platform_fee = excluded.platform_fee,
                 total = excluded.total,
                 currency = excluded.currency,
                 lead_time_days = excluded.lead_time_days,
                 notes = excluded.notes,
                 valid_until = excluded.valid_until,
                 accepted_at = excluded.accepted_at,
                 accepted_by = excluded.accepted_by,
                 updated_at = excluded.updated_at",
        )
        .bind(&quotation.id.0)
        .bind(&quotation.requirement_id.0)
        .bind(&quotation.supplier_id.0)
        .bind(quotation.status.as_str())
        .bind(quotation.unit_price.to_string())
        .bind(quotation.quantity as i64)
        .bind(quotation.subtotal.to_string())
        .bind(quotation.platform_fee.to_string())
        .bind(quotation.total.to_string())
        .bind(&quotation.currency)
        .bind(quotation.lead_time_days as i64)
        .bind(&quotation.notes)
        .bind(quotation.valid_until.to_rfc3339())
        .bind(quotation.accepted_at.map(|dt| dt.to_rfc3339()))
        .bind(quotation.accepted_by.as_ref().map(|id| id.0.clone()))
        .bind(quotation.created_at.to_rfc3339())
        .bind(quotation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use tradehub_core::domain::party::{KybStatus, Role, User, UserId};
    use tradehub_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
    use tradehub_core::domain::requirement::{Requirement, RequirementId, RequirementStatus};

    use super::SqlQuotationRepository;
    use crate::repositories::{
        QuotationRepository, RequirementRepository, SqlRequirementRepository, SqlUserRepository,
        UserRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let users = SqlUserRepository::new(pool.clone());
        for (id, role, kyb) in [
            ("buyer-1", Role::Buyer, KybStatus::Completed),
            ("supplier-1", Role::Supplier, KybStatus::Completed),
        ] {
            users
                .save(User {
                    id: UserId(id.to_string()),
                    email: format!("{id}@example.com"),
                    name: id.to_string(),
                    role,
                    kyb_status: kyb,
                    created_at: Utc::now(),
                })
                .await
                .expect("seed user");
        }

        let now = Utc::now();
        SqlRequirementRepository::new(pool.clone())
            .save(Requirement {
                id: RequirementId("REQ-1".to_string()),
                buyer_id: UserId("buyer-1".to_string()),
                account_manager_id: None,
                title: "Solar inverters".to_string(),
                category: "energy".to_string(),
                quantity: 200,
                unit: "pcs".to_string(),
                budget: None,
                currency: "USD".to_string(),
                status: RequirementStatus::Verified,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed requirement");

        pool
    }

    fn quotation(id: &str) -> Quotation {
        let now = Utc::now();
        Quotation {
            id: QuotationId(id.to_string()),
            requirement_id: RequirementId("REQ-1".to_string()),
            supplier_id: UserId("supplier-1".to_string()),
            status: QuotationStatus::Submitted,
            unit_price: Decimal::new(89_90, 2),
            quantity: 200,
            subtotal: Decimal::new(17_980_00, 2),
            platform_fee: Decimal::new(359_60, 2),
            total: Decimal::new(18_339_60, 2),
            currency: "USD".to_string(),
            lead_time_days: 30,
            notes: None,
            valid_until: now + Duration::days(14),
            accepted_at: None,
            accepted_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trips_money_columns() {
        let pool = setup().await;
        let repo = SqlQuotationRepository::new(pool);

        repo.save(quotation("QUO-1")).await.expect("save");
        let found = repo
            .find_by_id(&QuotationId("QUO-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found.unit_price, Decimal::new(89_90, 2));
        assert_eq!(found.total, Decimal::new(18_339_60, 2));
        assert_eq!(found.status, QuotationStatus::Submitted);
    }

    #[tokio::test]
    async fn find_detail_joins_requirement_and_buyer_kyb() {
        let pool = setup().await;
        let repo = SqlQuotationRepository::new(pool);

        repo.save(quotation("QUO-1")).await.expect("save");
        let detail = repo
            .find_detail(&QuotationId("QUO-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(detail.buyer_id.0, "buyer-1");
        assert_eq!(detail.requirement_status, RequirementStatus::Verified);
        assert_eq!(detail.buyer_kyb, KybStatus::Completed);
    }

    #[tokio::test]
    async fn list_for_requirement_orders_by_submission() {
        let pool = setup().await;
        let repo = SqlQuotationRepository::new(pool);

        let mut first = quotation("QUO-1");
        first.created_at = Utc::now() - Duration::hours(2);
        repo.save(first).await.expect("save");
        repo.save(quotation("QUO-2")).await.expect("save");

        let listed = repo
            .list_for_requirement(&RequirementId("REQ-1".to_string()))
            .await
            .expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id.0, "QUO-1");
    }

    #[tokio::test]
    async fn find_detail_returns_none_for_unknown_id() {
        let pool = setup().await;
        let repo = SqlQuotationRepository::new(pool);

        let detail = repo.find_detail(&QuotationId("QUO-404".to_string())).await.expect("query");
        assert!(detail.is_none());
    }
}
