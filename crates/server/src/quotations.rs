//! Quotation lifecycle endpoint.
//!
//! - `GET   /api/quotations/{id}` — quotation detail for a related party
//! - `PATCH /api/quotations/{id}` — one of `ACCEPT`, `REJECT`, `SHORTLIST`,
//!   `WITHDRAW`, `UPDATE` in the request body's `action` field
//!
//! ACCEPT is the grouped mutation: the winning quotation, the bulk-decline
//! of its active siblings, and the requirement status all change in one
//! database transaction. Notification fan-out happens after commit and is
//! best-effort.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{info, warn};

use tradehub_core::authz::{authorize_quotation, QuotationAction};
use tradehub_core::domain::notification::{Notification, NotificationKind};
use tradehub_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use tradehub_core::pricing;
use tradehub_core::reference::{format_quotation_reference, format_requirement_reference};
use tradehub_db::repositories::{QuotationDetail, QuotationRepository, SqlQuotationRepository};
use tradehub_db::DemoDataset;

use crate::api::AppState;
use crate::auth::{authenticate, AuthUser};
use crate::envelope::{
    api_error, api_error_with_details, db_error, domain_error, repo_error, success, ApiError,
};
use crate::notify;

const ACTIONS: [&str; 5] = ["ACCEPT", "REJECT", "SHORTLIST", "WITHDRAW", "UPDATE"];

pub(crate) fn quotation_payload(quotation: &Quotation) -> Value {
    json!({
        "id": quotation.id.0,
        "reference": format_quotation_reference(&quotation.id.0),
        "requirement_id": quotation.requirement_id.0,
        "requirement_reference": format_requirement_reference(&quotation.requirement_id.0),
        "supplier_id": quotation.supplier_id.0,
        "status": quotation.status,
        "unit_price": quotation.unit_price,
        "quantity": quotation.quantity,
        "subtotal": quotation.subtotal,
        "platform_fee": quotation.platform_fee,
        "total": quotation.total,
        "currency": quotation.currency,
        "lead_time_days": quotation.lead_time_days,
        "notes": quotation.notes,
        "valid_until": quotation.valid_until.to_rfc3339(),
        "accepted_at": quotation.accepted_at.map(|dt| dt.to_rfc3339()),
        "accepted_by": quotation.accepted_by.as_ref().map(|id| id.0.clone()),
        "created_at": quotation.created_at.to_rfc3339(),
        "updated_at": quotation.updated_at.to_rfc3339(),
    })
}

pub async fn get_quotation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let auth = authenticate(&state.db_pool, &headers).await?;
    let repo = SqlQuotationRepository::new(state.db_pool.clone());

    let detail = match repo.find_detail(&QuotationId(id.clone())).await {
        Ok(detail) => detail,
        Err(error) if state.demo_fallback => {
            warn!(
                event_name = "quotation.demo_fallback",
                quotation_id = %id,
                error = %error,
                "store unavailable, serving demo quotation"
            );
            return Ok(success(quotation_payload(&DemoDataset::fallback_quotation())));
        }
        Err(error) => return Err(repo_error(error)),
    };

    let detail = match detail {
        Some(detail) => detail,
        None if state.demo_fallback => {
            warn!(
                event_name = "quotation.demo_fallback",
                quotation_id = %id,
                "quotation missing, serving demo quotation"
            );
            return Ok(success(quotation_payload(&DemoDataset::fallback_quotation())));
        }
        None => {
            return Err(api_error(StatusCode::NOT_FOUND, format!("quotation `{id}` not found")))
        }
    };

    let related = auth.is_admin()
        || auth.id == detail.buyer_id
        || auth.id == detail.quotation.supplier_id
        || detail.account_manager_id.as_ref() == Some(&auth.id);
    if !related {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "you do not have access to this quotation",
        ));
    }

    Ok(success(quotation_payload(&detail.quotation)))
}

pub async fn patch_quotation(
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
    let action = QuotationAction::parse(action_raw).ok_or_else(|| {
        api_error_with_details(
            StatusCode::BAD_REQUEST,
            format!("unknown action `{action_raw}`"),
            json!({ "allowed": ACTIONS }),
        )
    })?;

    let repo = SqlQuotationRepository::new(state.db_pool.clone());
    let detail = repo
        .find_detail(&QuotationId(id.clone()))
        .await
        .map_err(repo_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("quotation `{id}` not found")))?;

    authorize_quotation(action, &auth.actor(), &detail.buyer_id, &detail.quotation.supplier_id)
        .map_err(|e| api_error(StatusCode::FORBIDDEN, e.to_string()))?;

    match action {
        QuotationAction::Accept => accept(&state, &auth, detail).await,
        QuotationAction::Reject => reject(&state, &auth, detail, &body).await,
        QuotationAction::Shortlist => shortlist(&state, &auth, detail).await,
        QuotationAction::Withdraw => withdraw(&state, &auth, detail).await,
        QuotationAction::Update => update(&state, detail, &body).await,
    }
}

async fn accept(
    state: &AppState,
    auth: &AuthUser,
    detail: QuotationDetail,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let mut quotation = detail.quotation;

    quotation
        .ensure_acceptable(detail.requirement_status, detail.buyer_kyb, now)
        .map_err(|e| domain_error(&e))?;

    let mut tx = state.db_pool.begin().await.map_err(db_error)?;

    sqlx::query(
        "UPDATE quotation SET status = 'ACCEPTED', accepted_at = ?, accepted_by = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(now.to_rfc3339())
    .bind(&auth.id.0)
    .bind(now.to_rfc3339())
    .bind(&quotation.id.0)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    let declined = sqlx::query(
        "UPDATE quotation SET status = 'DECLINED', updated_at = ?
         WHERE requirement_id = ? AND id != ?
           AND status IN ('SUBMITTED', 'UNDER_REVIEW', 'SHORTLISTED', 'APPROVED_BY_ADMIN')",
    )
    .bind(now.to_rfc3339())
    .bind(&quotation.requirement_id.0)
    .bind(&quotation.id.0)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    sqlx::query("UPDATE requirement SET status = 'ACCEPTED', updated_at = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(&quotation.requirement_id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    let reference = format_quotation_reference(&quotation.id.0);
    let mut recipients = notify::admin_ids(&state.db_pool).await;
    recipients.push(quotation.supplier_id.clone());
    if let Some(account_manager_id) = &detail.account_manager_id {
        recipients.push(account_manager_id.clone());
    }
    for recipient in recipients {
        notify::send(
            &state.db_pool,
            Notification::new(
                recipient,
                NotificationKind::QuotationAccepted,
                "Quotation accepted",
                format!("Quotation {reference} was accepted by the buyer"),
                Some(quotation.id.0.clone()),
            ),
        )
        .await;
    }

    info!(
        event_name = "quotation.accepted",
        quotation_id = %quotation.id.0,
        requirement_id = %quotation.requirement_id.0,
        actor = %auth.id.0,
        declined_siblings = declined.rows_affected(),
        "quotation accepted, siblings declined"
    );

    quotation.status = QuotationStatus::Accepted;
    quotation.accepted_at = Some(now);
    quotation.accepted_by = Some(auth.id.clone());
    quotation.updated_at = now;
    Ok(success(quotation_payload(&quotation)))
}

async fn reject(
    state: &AppState,
    auth: &AuthUser,
    detail: QuotationDetail,
    body: &Value,
) -> Result<Json<Value>, ApiError> {
    let mut quotation = detail.quotation;
    quotation.ensure_rejectable().map_err(|e| domain_error(&e))?;

    let reason = body
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("No reason provided");
    let now = Utc::now();
    let notes = match &quotation.notes {
        Some(notes) => format!("{notes}\nRejected: {reason}"),
        None => format!("Rejected: {reason}"),
    };

    sqlx::query("UPDATE quotation SET status = 'REJECTED', notes = ?, updated_at = ? WHERE id = ?")
        .bind(&notes)
        .bind(now.to_rfc3339())
        .bind(&quotation.id.0)
        .execute(&state.db_pool)
        .await
        .map_err(db_error)?;

    notify::send(
        &state.db_pool,
        Notification::new(
            quotation.supplier_id.clone(),
            NotificationKind::QuotationRejected,
            "Quotation rejected",
            format!(
                "Quotation {} was rejected: {reason}",
                format_quotation_reference(&quotation.id.0)
            ),
            Some(quotation.id.0.clone()),
        ),
    )
    .await;

    info!(
        event_name = "quotation.rejected",
        quotation_id = %quotation.id.0,
        actor = %auth.id.0,
        "quotation rejected"
    );

    quotation.status = QuotationStatus::Rejected;
    quotation.notes = Some(notes);
    quotation.updated_at = now;
    Ok(success(quotation_payload(&quotation)))
}

async fn shortlist(
    state: &AppState,
    auth: &AuthUser,
    detail: QuotationDetail,
) -> Result<Json<Value>, ApiError> {
    let mut quotation = detail.quotation;
    quotation.ensure_mutable().map_err(|e| domain_error(&e))?;

    let now = Utc::now();
    sqlx::query("UPDATE quotation SET status = 'SHORTLISTED', updated_at = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(&quotation.id.0)
        .execute(&state.db_pool)
        .await
        .map_err(db_error)?;

    info!(
        event_name = "quotation.shortlisted",
        quotation_id = %quotation.id.0,
        actor = %auth.id.0,
        "quotation shortlisted"
    );

    quotation.status = QuotationStatus::Shortlisted;
    quotation.updated_at = now;
    Ok(success(quotation_payload(&quotation)))
}

async fn withdraw(
    state: &AppState,
    auth: &AuthUser,
    detail: QuotationDetail,
) -> Result<Json<Value>, ApiError> {
    let mut quotation = detail.quotation;
    quotation.ensure_mutable().map_err(|e| domain_error(&e))?;

    // Withdrawal reuses the EXPIRED status; there is no separate WITHDRAWN
    // marker in the lifecycle.
    let now = Utc::now();
    sqlx::query("UPDATE quotation SET status = 'EXPIRED', updated_at = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(&quotation.id.0)
        .execute(&state.db_pool)
        .await
        .map_err(db_error)?;

    info!(
        event_name = "quotation.withdrawn",
        quotation_id = %quotation.id.0,
        actor = %auth.id.0,
        "quotation withdrawn by submitter"
    );

    quotation.status = QuotationStatus::Expired;
    quotation.updated_at = now;
    Ok(success(quotation_payload(&quotation)))
}

fn decimal_field(body: &Value, key: &str) -> Result<Option<Decimal>, ApiError> {
    let value = match body.get(key) {
        Some(value) if !value.is_null() => value,
        _ => return Ok(None),
    };
    let parsed = match value {
        Value::String(raw) => raw.parse::<Decimal>().ok(),
        Value::Number(_) => value.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        _ => None,
    };
    parsed.map(Some).ok_or_else(|| {
        api_error(StatusCode::BAD_REQUEST, format!("field `{key}` must be a decimal amount"))
    })
}

fn u32_field(body: &Value, key: &str) -> Result<Option<u32>, ApiError> {
    let value = match body.get(key) {
        Some(value) if !value.is_null() => value,
        _ => return Ok(None),
    };
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .map(Some)
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("field `{key}` must be a non-negative integer"),
            )
        })
}

fn datetime_field(body: &Value, key: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
    let value = match body.get(key).and_then(Value::as_str) {
        Some(raw) => raw,
        None => return Ok(None),
    };
    DateTime::parse_from_rfc3339(value)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("field `{key}` must be an RFC 3339 timestamp"),
            )
        })
}

async fn update(
    state: &AppState,
    detail: QuotationDetail,
    body: &Value,
) -> Result<Json<Value>, ApiError> {
    let quotation = detail.quotation;
    quotation.ensure_mutable().map_err(|e| domain_error(&e))?;

    let unit_price = decimal_field(body, "unit_price")?;
    let quantity = u32_field(body, "quantity")?;
    let lead_time_days = u32_field(body, "lead_time_days")?;
    let notes = body.get("notes").and_then(Value::as_str).map(str::to_string);
    let valid_until = datetime_field(body, "valid_until")?;
    let platform_fee_rate = decimal_field(body, "platform_fee_rate")?;

    let price_affecting =
        unit_price.is_some() || quantity.is_some() || platform_fee_rate.is_some();

    let new_unit_price = unit_price.unwrap_or(quotation.unit_price);
    let new_quantity = quantity.unwrap_or(quotation.quantity);
    let (subtotal, platform_fee, total) = if price_affecting {
        let pricing = pricing::compute(new_unit_price, new_quantity, platform_fee_rate);
        (pricing.subtotal, pricing.platform_fee, pricing.total)
    } else {
        (quotation.subtotal, quotation.platform_fee, quotation.total)
    };

    let now = Utc::now();
    sqlx::query(
        "UPDATE quotation SET unit_price = ?, quantity = ?, subtotal = ?, platform_fee = ?,
                              total = ?, lead_time_days = ?, notes = ?, valid_until = ?,
                              updated_at = ?
         WHERE id = ?",
    )
    .bind(new_unit_price.to_string())
    .bind(new_quantity as i64)
    .bind(subtotal.to_string())
    .bind(platform_fee.to_string())
    .bind(total.to_string())
    .bind(lead_time_days.unwrap_or(quotation.lead_time_days) as i64)
    .bind(notes.clone().or_else(|| quotation.notes.clone()))
    .bind(valid_until.unwrap_or(quotation.valid_until).to_rfc3339())
    .bind(now.to_rfc3339())
    .bind(&quotation.id.0)
    .execute(&state.db_pool)
    .await
    .map_err(db_error)?;

    info!(
        event_name = "quotation.updated",
        quotation_id = %quotation.id.0,
        price_affecting,
        "quotation updated"
    );

    let repo = SqlQuotationRepository::new(state.db_pool.clone());
    let updated = repo
        .find_by_id(&quotation.id)
        .await
        .map_err(repo_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "quotation disappeared during update"))?;
    Ok(success(quotation_payload(&updated)))
}
