use sqlx::Row;

use tradehub_core::domain::escrow::{
    ConditionType, EscrowAccount, EscrowId, EscrowStatus, ReleaseCondition,
};
use tradehub_core::domain::milestone::TransactionMilestone;
use tradehub_core::domain::party::UserId;
use tradehub_core::domain::quotation::QuotationId;
use tradehub_core::domain::requirement::RequirementId;
use tradehub_core::domain::transaction::{Transaction, TransactionId, TransactionStatus};

use super::{decode_datetime, decode_decimal, decode_opt_datetime, RepositoryError, TransactionRepository};
use crate::DbPool;

pub struct SqlTransactionRepository {
    pool: DbPool,
}

/// Everything the transaction endpoint returns on GET: the settlement
/// record, its escrow account with condition mirrors, and the milestone
/// history.
#[derive(Clone, Debug)]
pub struct TransactionDetail {
    pub transaction: Transaction,
    pub escrow: Option<EscrowAccount>,
    pub conditions: Vec<ReleaseCondition>,
    pub milestones: Vec<TransactionMilestone>,
}

impl SqlTransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_detail(
        &self,
        id: &TransactionId,
    ) -> Result<Option<TransactionDetail>, RepositoryError> {
        let transaction = match self.find_by_id(id).await? {
            Some(transaction) => transaction,
            None => return Ok(None),
        };

        let escrow = self.find_escrow(id).await?;
        let conditions = match &escrow {
            Some(escrow) => self.list_conditions(&escrow.id).await?,
            None => Vec::new(),
        };
        let milestones = self.list_milestones(id).await?;

        Ok(Some(TransactionDetail { transaction, escrow, conditions, milestones }))
    }

    pub async fn find_escrow(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<EscrowAccount>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, transaction_id, amount, currency, status, delivery_confirmed,
                    quality_approved, documents_verified, released_at, refunded_at,
                    dispute_reason, created_at, updated_at
             FROM escrow_account WHERE transaction_id = ?",
        )
        .bind(&transaction_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_escrow(r)?)),
            None => Ok(None),
        }
    }

    pub async fn save_escrow(&self, escrow: EscrowAccount) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO escrow_account (id, transaction_id, amount, currency, status,
                                         delivery_confirmed, quality_approved,
                                         documents_verified, released_at, refunded_at,
                                         dispute_reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 delivery_confirmed = excluded.delivery_confirmed,
                 quality_approved = excluded.quality_approved,
                 documents_verified = excluded.documents_verified,
                 released_at = excluded.released_at,
                 refunded_at = excluded.refunded_at,
                 dispute_reason = excluded.dispute_reason,
                 updated_at = excluded.updated_at",
        )
        .bind(&escrow.id.0)
        .bind(&escrow.transaction_id.0)
        .bind(escrow.amount.to_string())
        .bind(&escrow.currency)
        .bind(escrow.status.as_str())
        .bind(escrow.delivery_confirmed as i64)
        .bind(escrow.quality_approved as i64)
        .bind(escrow.documents_verified as i64)
        .bind(escrow.released_at.map(|dt| dt.to_rfc3339()))
        .bind(escrow.refunded_at.map(|dt| dt.to_rfc3339()))
        .bind(&escrow.dispute_reason)
        .bind(escrow.created_at.to_rfc3339())
        .bind(escrow.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save_condition(
        &self,
        condition: ReleaseCondition,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO release_condition (id, escrow_id, condition_type, satisfied,
                                            satisfied_by, satisfied_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(escrow_id, condition_type) DO UPDATE SET
                 satisfied = excluded.satisfied,
                 satisfied_by = excluded.satisfied_by,
                 satisfied_at = excluded.satisfied_at",
        )
        .bind(&condition.id)
        .bind(&condition.escrow_id.0)
        .bind(condition.condition_type.as_str())
        .bind(condition.satisfied as i64)
        .bind(condition.satisfied_by.as_ref().map(|id| id.0.clone()))
        .bind(condition.satisfied_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_conditions(
        &self,
        escrow_id: &EscrowId,
    ) -> Result<Vec<ReleaseCondition>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, escrow_id, condition_type, satisfied, satisfied_by, satisfied_at
             FROM release_condition WHERE escrow_id = ? ORDER BY condition_type",
        )
        .bind(&escrow_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_condition).collect()
    }

    pub async fn append_milestone(
        &self,
        milestone: TransactionMilestone,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO transaction_milestone (id, transaction_id, actor, description,
                                                status_from, status_to, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&milestone.id)
        .bind(&milestone.transaction_id.0)
        .bind(&milestone.actor)
        .bind(&milestone.description)
        .bind(milestone.status_from.map(|s| s.as_str()))
        .bind(milestone.status_to.map(|s| s.as_str()))
        .bind(milestone.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_milestones(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Vec<TransactionMilestone>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, transaction_id, actor, description, status_from, status_to, occurred_at
             FROM transaction_milestone WHERE transaction_id = ? ORDER BY occurred_at ASC, id ASC",
        )
        .bind(&transaction_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_milestone).collect()
    }
}

pub(crate) fn row_to_transaction(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Transaction, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quotation_id: String =
        row.try_get("quotation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requirement_id: String =
        row.try_get("requirement_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let buyer_id: String =
        row.try_get("buyer_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let supplier_id: String =
        row.try_get("supplier_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let amount: String =
        row.try_get("amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let currency: String =
        row.try_get("currency").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let expected_delivery: Option<String> =
        row.try_get("expected_delivery").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actual_delivery: Option<String> =
        row.try_get("actual_delivery").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tracking_number: Option<String> =
        row.try_get("tracking_number").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = TransactionStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown transaction status `{status_str}`"))
    })?;

    Ok(Transaction {
        id: TransactionId(id),
        quotation_id: QuotationId(quotation_id),
        requirement_id: RequirementId(requirement_id),
        buyer_id: UserId(buyer_id),
        supplier_id: UserId(supplier_id),
        amount: decode_decimal(&amount)?,
        currency,
        status,
        expected_delivery: decode_opt_datetime(expected_delivery)?,
        actual_delivery: decode_opt_datetime(actual_delivery)?,
        tracking_number,
        created_at: decode_datetime(&created_at_str)?,
        updated_at: decode_datetime(&updated_at_str)?,
    })
}

pub(crate) fn row_to_escrow(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<EscrowAccount, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let transaction_id: String =
        row.try_get("transaction_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let amount: String =
        row.try_get("amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let currency: String =
        row.try_get("currency").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let delivery_confirmed: i64 =
        row.try_get("delivery_confirmed").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quality_approved: i64 =
        row.try_get("quality_approved").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let documents_verified: i64 =
        row.try_get("documents_verified").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let released_at: Option<String> =
        row.try_get("released_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let refunded_at: Option<String> =
        row.try_get("refunded_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let dispute_reason: Option<String> =
        row.try_get("dispute_reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = EscrowStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown escrow status `{status_str}`")))?;

    Ok(EscrowAccount {
        id: EscrowId(id),
        transaction_id: TransactionId(transaction_id),
        amount: decode_decimal(&amount)?,
        currency,
        status,
        delivery_confirmed: delivery_confirmed != 0,
        quality_approved: quality_approved != 0,
        documents_verified: documents_verified != 0,
        released_at: decode_opt_datetime(released_at)?,
        refunded_at: decode_opt_datetime(refunded_at)?,
        dispute_reason,
        created_at: decode_datetime(&created_at_str)?,
        updated_at: decode_datetime(&updated_at_str)?,
    })
}

fn row_to_condition(row: &sqlx::sqlite::SqliteRow) -> Result<ReleaseCondition, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let escrow_id: String =
        row.try_get("escrow_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let condition_type_str: String =
        row.try_get("condition_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let satisfied: i64 =
        row.try_get("satisfied").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let satisfied_by: Option<String> =
        row.try_get("satisfied_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let satisfied_at: Option<String> =
        row.try_get("satisfied_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let condition_type = ConditionType::parse(&condition_type_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown condition type `{condition_type_str}`"))
    })?;

    Ok(ReleaseCondition {
        id,
        escrow_id: EscrowId(escrow_id),
        condition_type,
        satisfied: satisfied != 0,
        satisfied_by: satisfied_by.map(UserId),
        satisfied_at: decode_opt_datetime(satisfied_at)?,
    })
}

fn row_to_milestone(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<TransactionMilestone, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let transaction_id: String =
        row.try_get("transaction_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actor: String =
        row.try_get("actor").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_from: Option<String> =
        row.try_get("status_from").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_to: Option<String> =
        row.try_get("status_to").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let occurred_at_str: String =
        row.try_get("occurred_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(TransactionMilestone {
        id,
        transaction_id: TransactionId(transaction_id),
        actor,
        description,
        status_from: status_from.as_deref().and_then(TransactionStatus::parse),
        status_to: status_to.as_deref().and_then(TransactionStatus::parse),
        occurred_at: decode_datetime(&occurred_at_str)?,
    })
}

#[async_trait::async_trait]
impl TransactionRepository for SqlTransactionRepository {
    async fn find_by_id(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, quotation_id, requirement_id, buyer_id, supplier_id, amount, currency,
                    status, expected_delivery, actual_delivery, tracking_number,
                    created_at, updated_at
             FROM trade_transaction WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_transaction(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, transaction: Transaction) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO trade_transaction (id, quotation_id, requirement_id, buyer_id,
                                            supplier_id, amount, currency, status,
                                            expected_delivery, actual_delivery,
                                            tracking_number, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 expected_delivery = excluded.expected_delivery,
                 actual_delivery = excluded.actual_delivery,
                 tracking_number = excluded.tracking_number,
                 updated_at = excluded.updated_at",
        )
        .bind(&transaction.id.0)
        .bind(&transaction.quotation_id.0)
        .bind(&transaction.requirement_id.0)
        .bind(&transaction.buyer_id.0)
        .bind(&transaction.supplier_id.0)
        .bind(transaction.amount.to_string())
        .bind(&transaction.currency)
        .bind(transaction.status.as_str())
        .bind(transaction.expected_delivery.map(|dt| dt.to_rfc3339()))
        .bind(transaction.actual_delivery.map(|dt| dt.to_rfc3339()))
        .bind(&transaction.tracking_number)
        .bind(transaction.created_at.to_rfc3339())
        .bind(transaction.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
