//! Transaction/escrow settlement endpoint.
//!
//! - `GET   /api/transactions/{id}` — transaction with escrow, release
//!   conditions, and milestone history
//! - `PATCH /api/transactions/{id}` — one of `CONFIRM_DELIVERY`,
//!   `APPROVE_QUALITY`, `VERIFY_DOCUMENTS`, `RELEASE_FUNDS`, `REFUND`,
//!   `DISPUTE`, `UPDATE_STATUS` in the body's `action` field
//!
//! Escrow funds release iff all three conditions are satisfied while the
//! escrow is `HELD`. The release itself (escrow + transaction + milestone)
//! commits in the same database transaction as the condition flip; the
//! settlement-provider call and notifications run after commit and are
//! best-effort.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use tradehub_core::authz::{authorize_transaction, TransactionAction};
use tradehub_core::domain::escrow::{ConditionType, EscrowStatus};
use tradehub_core::domain::milestone::TransactionMilestone;
use tradehub_core::domain::notification::{Notification, NotificationKind};
use tradehub_core::domain::transaction::{TransactionId, TransactionStatus};
use tradehub_core::errors::DomainError;
use tradehub_core::reference::format_transaction_reference;
use tradehub_db::repositories::{SqlTransactionRepository, TransactionDetail};
use tradehub_db::DemoDataset;

use crate::api::AppState;
use crate::auth::{authenticate, AuthUser};
use crate::envelope::{
    api_error, api_error_with_details, db_error, domain_error, repo_error, success, ApiError,
};
use crate::notify;

const ACTIONS: [&str; 7] = [
    "CONFIRM_DELIVERY",
    "APPROVE_QUALITY",
    "VERIFY_DOCUMENTS",
    "RELEASE_FUNDS",
    "REFUND",
    "DISPUTE",
    "UPDATE_STATUS",
];

fn transaction_payload(detail: &TransactionDetail) -> Value {
    let transaction = &detail.transaction;
    json!({
        "id": transaction.id.0,
        "reference": format_transaction_reference(&transaction.id.0),
        "quotation_id": transaction.quotation_id.0,
        "requirement_id": transaction.requirement_id.0,
        "buyer_id": transaction.buyer_id.0,
        "supplier_id": transaction.supplier_id.0,
        "amount": transaction.amount,
        "currency": transaction.currency,
        "status": transaction.status,
        "expected_delivery": transaction.expected_delivery.map(|dt| dt.to_rfc3339()),
        "actual_delivery": transaction.actual_delivery.map(|dt| dt.to_rfc3339()),
        "tracking_number": transaction.tracking_number,
        "created_at": transaction.created_at.to_rfc3339(),
        "updated_at": transaction.updated_at.to_rfc3339(),
        "escrow": detail.escrow.as_ref().map(|escrow| json!({
            "id": escrow.id.0,
            "status": escrow.status,
            "amount": escrow.amount,
            "currency": escrow.currency,
            "delivery_confirmed": escrow.delivery_confirmed,
            "quality_approved": escrow.quality_approved,
            "documents_verified": escrow.documents_verified,
            "released_at": escrow.released_at.map(|dt| dt.to_rfc3339()),
            "refunded_at": escrow.refunded_at.map(|dt| dt.to_rfc3339()),
            "dispute_reason": escrow.dispute_reason,
        })),
        "release_conditions": detail.conditions.iter().map(|condition| json!({
            "condition_type": condition.condition_type,
            "satisfied": condition.satisfied,
            "satisfied_by": condition.satisfied_by.as_ref().map(|id| id.0.clone()),
            "satisfied_at": condition.satisfied_at.map(|dt| dt.to_rfc3339()),
        })).collect::<Vec<_>>(),
        "milestones": detail.milestones.iter().map(|milestone| json!({
            "id": milestone.id,
            "actor": milestone.actor,
            "description": milestone.description,
            "status_from": milestone.status_from,
            "status_to": milestone.status_to,
            "occurred_at": milestone.occurred_at.to_rfc3339(),
        })).collect::<Vec<_>>(),
    })
}

pub async fn get_transaction(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let auth = authenticate(&state.db_pool, &headers).await?;
    let repo = SqlTransactionRepository::new(state.db_pool.clone());

    let detail = match repo.find_detail(&TransactionId(id.clone())).await {
        Ok(detail) => detail,
        Err(error) if state.demo_fallback => {
            warn!(
                event_name = "transaction.demo_fallback",
                transaction_id = %id,
                error = %error,
                "store unavailable, serving demo transaction"
            );
            return Ok(success(transaction_payload(&DemoDataset::fallback_transaction_detail())));
        }
        Err(error) => return Err(repo_error(error)),
    };

    let detail = match detail {
        Some(detail) => detail,
        None if state.demo_fallback => {
            warn!(
                event_name = "transaction.demo_fallback",
                transaction_id = %id,
                "transaction missing, serving demo transaction"
            );
            return Ok(success(transaction_payload(&DemoDataset::fallback_transaction_detail())));
        }
        None => {
            return Err(api_error(StatusCode::NOT_FOUND, format!("transaction `{id}` not found")))
        }
    };

    let related = auth.is_admin()
        || auth.id == detail.transaction.buyer_id
        || auth.id == detail.transaction.supplier_id;
    if !related {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "you do not have access to this transaction",
        ));
    }

    Ok(success(transaction_payload(&detail)))
}

pub async fn patch_transaction(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let auth = authenticate(&state.db_pool, &headers).await?;

    let action_raw = body
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "missing `action` field"))?;
    let action = TransactionAction::parse(action_raw).ok_or_else(|| {
        api_error_with_details(
            StatusCode::BAD_REQUEST,
            format!("unknown action `{action_raw}`"),
            json!({ "allowed": ACTIONS }),
        )
    })?;

    let repo = SqlTransactionRepository::new(state.db_pool.clone());
    let detail = repo
        .find_detail(&TransactionId(id.clone()))
        .await
        .map_err(repo_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("transaction `{id}` not found")))?;

    authorize_transaction(
        action,
        &auth.actor(),
        &detail.transaction.buyer_id,
        &detail.transaction.supplier_id,
    )
    .map_err(|e| api_error(StatusCode::FORBIDDEN, e.to_string()))?;

    match action {
        TransactionAction::ConfirmDelivery => {
            satisfy_condition(&state, &auth, detail, ConditionType::DeliveryConfirmed).await
        }
        TransactionAction::ApproveQuality => {
            satisfy_condition(&state, &auth, detail, ConditionType::QualityApproved).await
        }
        TransactionAction::VerifyDocuments => {
            satisfy_condition(&state, &auth, detail, ConditionType::DocumentsVerified).await
        }
        TransactionAction::ReleaseFunds => release_funds(&state, &auth, detail).await,
        TransactionAction::Refund => refund(&state, &auth, detail).await,
        TransactionAction::Dispute => dispute(&state, &auth, detail, &body).await,
        TransactionAction::UpdateStatus => update_status(&state, &auth, detail, &body).await,
    }
}

async fn insert_milestone(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    milestone: &TransactionMilestone,
) -> Result<(), ApiError> {
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
    .execute(&mut **tx)
    .await
    .map_err(db_error)?;
    Ok(())
}

async fn reload_detail(state: &AppState, id: &TransactionId) -> Result<Json<Value>, ApiError> {
    let repo = SqlTransactionRepository::new(state.db_pool.clone());
    let detail = repo
        .find_detail(id)
        .await
        .map_err(repo_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "transaction disappeared"))?;
    Ok(success(transaction_payload(&detail)))
}

fn condition_column(condition: ConditionType) -> &'static str {
    match condition {
        ConditionType::DeliveryConfirmed => "delivery_confirmed",
        ConditionType::QualityApproved => "quality_approved",
        ConditionType::DocumentsVerified => "documents_verified",
    }
}

fn condition_description(condition: ConditionType) -> &'static str {
    match condition {
        ConditionType::DeliveryConfirmed => "Delivery confirmed",
        ConditionType::QualityApproved => "Quality approved",
        ConditionType::DocumentsVerified => "Documents verified",
    }
}

async fn satisfy_condition(
    state: &AppState,
    auth: &AuthUser,
    detail: TransactionDetail,
    condition: ConditionType,
) -> Result<Json<Value>, ApiError> {
    let transaction = detail.transaction;
    let escrow = detail.escrow.ok_or_else(|| {
        domain_error(&DomainError::EscrowMissing { transaction: transaction.id.clone() })
    })?;

    escrow.ensure_condition_unsatisfied(condition).map_err(|e| domain_error(&e))?;
    if condition == ConditionType::DeliveryConfirmed && !transaction.status.delivery_confirmable()
    {
        return Err(domain_error(&DomainError::DeliveryNotConfirmable {
            status: transaction.status,
        }));
    }

    let now = Utc::now();
    let mut tx = state.db_pool.begin().await.map_err(db_error)?;

    let update_escrow_flag = format!(
        "UPDATE escrow_account SET {} = 1, updated_at = ? WHERE id = ?",
        condition_column(condition)
    );
    sqlx::query(&update_escrow_flag)
        .bind(now.to_rfc3339())
        .bind(&escrow.id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    sqlx::query(
        "UPDATE release_condition SET satisfied = 1, satisfied_by = ?, satisfied_at = ?
         WHERE escrow_id = ? AND condition_type = ?",
    )
    .bind(&auth.id.0)
    .bind(now.to_rfc3339())
    .bind(&escrow.id.0)
    .bind(condition.as_str())
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    if condition == ConditionType::DeliveryConfirmed {
        sqlx::query(
            "UPDATE trade_transaction SET status = 'DELIVERED', actual_delivery = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(&transaction.id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        insert_milestone(
            &mut tx,
            &TransactionMilestone::new(
                transaction.id.clone(),
                auth.id.0.clone(),
                condition_description(condition),
                Some(transaction.status),
                Some(TransactionStatus::Delivered),
            ),
        )
        .await?;
    } else {
        insert_milestone(
            &mut tx,
            &TransactionMilestone::new(
                transaction.id.clone(),
                auth.id.0.clone(),
                condition_description(condition),
                None,
                None,
            ),
        )
        .await?;
    }

    let all_satisfied =
        ConditionType::ALL.iter().all(|c| *c == condition || escrow.condition(*c));
    let released = all_satisfied && escrow.status == EscrowStatus::Held;
    if released {
        sqlx::query(
            "UPDATE escrow_account SET status = 'RELEASED', released_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(&escrow.id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("UPDATE trade_transaction SET status = 'COMPLETED', updated_at = ? WHERE id = ?")
            .bind(now.to_rfc3339())
            .bind(&transaction.id.0)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        insert_milestone(
            &mut tx,
            &TransactionMilestone::new(
                transaction.id.clone(),
                "system",
                "All release conditions satisfied, escrow released",
                Some(if condition == ConditionType::DeliveryConfirmed {
                    TransactionStatus::Delivered
                } else {
                    transaction.status
                }),
                Some(TransactionStatus::Completed),
            ),
        )
        .await?;
    }

    tx.commit().await.map_err(db_error)?;

    info!(
        event_name = "transaction.condition_satisfied",
        transaction_id = %transaction.id.0,
        condition = condition.as_str(),
        actor = %auth.id.0,
        released,
        "release condition satisfied"
    );

    if released {
        state.settlement.notify_release(
            &transaction.id,
            &escrow.id,
            escrow.amount,
            &escrow.currency,
        );
        let reference = format_transaction_reference(&transaction.id.0);
        for recipient in [transaction.buyer_id.clone(), transaction.supplier_id.clone()] {
            notify::send(
                &state.db_pool,
                Notification::new(
                    recipient,
                    NotificationKind::EscrowReleased,
                    "Escrow released",
                    format!("Escrow funds for {reference} were released to the supplier"),
                    Some(transaction.id.0.clone()),
                ),
            )
            .await;
        }
    }

    reload_detail(state, &transaction.id).await
}

async fn release_funds(
    state: &AppState,
    auth: &AuthUser,
    detail: TransactionDetail,
) -> Result<Json<Value>, ApiError> {
    let transaction = detail.transaction;
    let escrow = detail.escrow.ok_or_else(|| {
        domain_error(&DomainError::EscrowMissing { transaction: transaction.id.clone() })
    })?;
    escrow.ensure_releasable().map_err(|e| domain_error(&e))?;

    let now = Utc::now();
    let mut tx = state.db_pool.begin().await.map_err(db_error)?;

    sqlx::query(
        "UPDATE escrow_account SET status = 'RELEASED', released_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .bind(&escrow.id.0)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    sqlx::query("UPDATE trade_transaction SET status = 'COMPLETED', updated_at = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(&transaction.id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    insert_milestone(
        &mut tx,
        &TransactionMilestone::new(
            transaction.id.clone(),
            auth.id.0.clone(),
            "Escrow force-released by admin override",
            Some(transaction.status),
            Some(TransactionStatus::Completed),
        ),
    )
    .await?;

    tx.commit().await.map_err(db_error)?;

    info!(
        event_name = "transaction.escrow_force_released",
        transaction_id = %transaction.id.0,
        actor = %auth.id.0,
        "escrow force-released"
    );

    state.settlement.notify_release(&transaction.id, &escrow.id, escrow.amount, &escrow.currency);
    let reference = format_transaction_reference(&transaction.id.0);
    notify::send(
        &state.db_pool,
        Notification::new(
            transaction.supplier_id.clone(),
            NotificationKind::EscrowReleased,
            "Escrow released",
            format!("Escrow funds for {reference} were released by the platform"),
            Some(transaction.id.0.clone()),
        ),
    )
    .await;

    reload_detail(state, &transaction.id).await
}

async fn refund(
    state: &AppState,
    auth: &AuthUser,
    detail: TransactionDetail,
) -> Result<Json<Value>, ApiError> {
    let transaction = detail.transaction;
    let escrow = detail.escrow.ok_or_else(|| {
        domain_error(&DomainError::EscrowMissing { transaction: transaction.id.clone() })
    })?;
    escrow.ensure_refundable().map_err(|e| domain_error(&e))?;

    let now = Utc::now();
    let mut tx = state.db_pool.begin().await.map_err(db_error)?;

    sqlx::query(
        "UPDATE escrow_account SET status = 'REFUNDED', refunded_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .bind(&escrow.id.0)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    sqlx::query("UPDATE trade_transaction SET status = 'REFUNDED', updated_at = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(&transaction.id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    insert_milestone(
        &mut tx,
        &TransactionMilestone::new(
            transaction.id.clone(),
            auth.id.0.clone(),
            "Escrow refunded to buyer",
            Some(transaction.status),
            Some(TransactionStatus::Refunded),
        ),
    )
    .await?;

    tx.commit().await.map_err(db_error)?;

    info!(
        event_name = "transaction.escrow_refunded",
        transaction_id = %transaction.id.0,
        actor = %auth.id.0,
        "escrow refunded"
    );

    state.settlement.notify_refund(&transaction.id, &escrow.id, escrow.amount, &escrow.currency);
    let reference = format_transaction_reference(&transaction.id.0);
    notify::send(
        &state.db_pool,
        Notification::new(
            transaction.buyer_id.clone(),
            NotificationKind::EscrowRefunded,
            "Escrow refunded",
            format!("Escrow funds for {reference} were refunded"),
            Some(transaction.id.0.clone()),
        ),
    )
    .await;

    reload_detail(state, &transaction.id).await
}

async fn dispute(
    state: &AppState,
    auth: &AuthUser,
    detail: TransactionDetail,
    body: &Value,
) -> Result<Json<Value>, ApiError> {
    let transaction = detail.transaction;
    let escrow = detail.escrow.ok_or_else(|| {
        domain_error(&DomainError::EscrowMissing { transaction: transaction.id.clone() })
    })?;

    let reason = body
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("No reason provided");

    let now = Utc::now();
    let mut tx = state.db_pool.begin().await.map_err(db_error)?;

    sqlx::query(
        "UPDATE escrow_account SET status = 'DISPUTED', dispute_reason = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(reason)
    .bind(now.to_rfc3339())
    .bind(&escrow.id.0)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    sqlx::query("UPDATE trade_transaction SET status = 'DISPUTED', updated_at = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(&transaction.id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    insert_milestone(
        &mut tx,
        &TransactionMilestone::new(
            transaction.id.clone(),
            auth.id.0.clone(),
            format!("Dispute opened: {reason}"),
            Some(transaction.status),
            Some(TransactionStatus::Disputed),
        ),
    )
    .await?;

    tx.commit().await.map_err(db_error)?;

    info!(
        event_name = "transaction.disputed",
        transaction_id = %transaction.id.0,
        actor = %auth.id.0,
        "transaction disputed"
    );

    let reference = format_transaction_reference(&transaction.id.0);
    for admin in notify::admin_ids(&state.db_pool).await {
        notify::send(
            &state.db_pool,
            Notification::new(
                admin,
                NotificationKind::TransactionDisputed,
                "Transaction disputed",
                format!("Transaction {reference} was disputed: {reason}"),
                Some(transaction.id.0.clone()),
            ),
        )
        .await;
    }

    reload_detail(state, &transaction.id).await
}

async fn update_status(
    state: &AppState,
    auth: &AuthUser,
    detail: TransactionDetail,
    body: &Value,
) -> Result<Json<Value>, ApiError> {
    let transaction = detail.transaction;

    let next_raw = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "missing `status` field"))?;
    let next = TransactionStatus::parse(next_raw).ok_or_else(|| {
        api_error(StatusCode::BAD_REQUEST, format!("unknown transaction status `{next_raw}`"))
    })?;

    if !auth.is_admin() {
        transaction.validate_transition(next).map_err(|error| {
            api_error_with_details(
                StatusCode::BAD_REQUEST,
                error.to_string(),
                json!({
                    "allowed": transaction
                        .status
                        .allowed_transitions()
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>(),
                }),
            )
        })?;
    }

    let tracking_number = body.get("tracking_number").and_then(Value::as_str);
    let now = Utc::now();
    let mut tx = state.db_pool.begin().await.map_err(db_error)?;

    sqlx::query(
        "UPDATE trade_transaction
         SET status = ?, tracking_number = COALESCE(?, tracking_number), updated_at = ?
         WHERE id = ?",
    )
    .bind(next.as_str())
    .bind(tracking_number)
    .bind(now.to_rfc3339())
    .bind(&transaction.id.0)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    insert_milestone(
        &mut tx,
        &TransactionMilestone::new(
            transaction.id.clone(),
            auth.id.0.clone(),
            format!("Status changed to {}", next.as_str()),
            Some(transaction.status),
            Some(next),
        ),
    )
    .await?;

    tx.commit().await.map_err(db_error)?;

    info!(
        event_name = "transaction.status_updated",
        transaction_id = %transaction.id.0,
        from = transaction.status.as_str(),
        to = next.as_str(),
        actor = %auth.id.0,
        "transaction status updated"
    );

    let reference = format_transaction_reference(&transaction.id.0);
    for recipient in [transaction.buyer_id.clone(), transaction.supplier_id.clone()] {
        if recipient == auth.id {
            continue;
        }
        notify::send(
            &state.db_pool,
            Notification::new(
                recipient,
                NotificationKind::TransactionUpdated,
                "Transaction updated",
                format!("Transaction {reference} moved to {}", next.as_str()),
                Some(transaction.id.0.clone()),
            ),
        )
        .await;
    }

    reload_detail(state, &transaction.id).await
}
