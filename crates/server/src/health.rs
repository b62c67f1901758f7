//! Readiness endpoint served on its own listener so probes keep answering
//! while the API port drains during shutdown.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tradehub_db::DbPool;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub ready: bool,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checks: Vec<HealthCheck>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn spawn(bind_address: &str, port: u16, db_pool: DbPool) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool)).await {
            error!(
                event_name = "system.health.error",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let checks = vec![database_check(&state.db_pool).await, schema_check(&state.db_pool).await];
    let ready = checks.iter().all(|check| check.ready);

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        checks,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck {
            name: "database",
            ready: true,
            detail: "database query succeeded".to_string(),
        },
        Err(error) => HealthCheck {
            name: "database",
            ready: false,
            detail: format!("database query failed: {error}"),
        },
    }
}

/// The settlement tables must be visible; a connected-but-unmigrated store
/// would 500 on every API call.
async fn schema_check(pool: &DbPool) -> HealthCheck {
    let result = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master
         WHERE type = 'table' AND name IN ('trade_transaction', 'escrow_account')",
    )
    .fetch_one(pool)
    .await;

    match result {
        Ok(2) => HealthCheck {
            name: "schema",
            ready: true,
            detail: "settlement tables present".to_string(),
        },
        Ok(found) => HealthCheck {
            name: "schema",
            ready: false,
            detail: format!("settlement tables missing ({found} of 2 present)"),
        },
        Err(error) => HealthCheck {
            name: "schema",
            ready: false,
            detail: format!("schema probe failed: {error}"),
        },
    }
}
