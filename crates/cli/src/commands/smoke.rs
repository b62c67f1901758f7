use std::time::Instant;

use serde::Serialize;

use crate::commands::CommandResult;
use tradehub_core::config::{AppConfig, LoadOptions};
use tradehub_core::domain::escrow::{ConditionType, EscrowAccount, EscrowId, EscrowStatus};
use tradehub_core::domain::transaction::{TransactionId, TransactionStatus};
use tradehub_db::{connect_with_settings, migrations};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config_started = Instant::now();
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms: config_started.elapsed().as_millis() as u64,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err(error) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms: config_started.elapsed().as_millis() as u64,
                message: error.to_string(),
            });
            checks.push(skipped("db_connectivity"));
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("release_invariant"));
            checks.push(skipped("transition_table"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("release_invariant"));
            checks.push(skipped("transition_table"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let db_started = Instant::now();
    let pool = match runtime.block_on(connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )) {
        Ok(pool) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Pass,
                elapsed_ms: db_started.elapsed().as_millis() as u64,
                message: format!("connected using `{}`", config.database.url),
            });
            pool
        }
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: db_started.elapsed().as_millis() as u64,
                message: format!("failed to connect: {error}"),
            });
            checks.push(skipped("migration_visibility"));
            checks.push(release_invariant_check());
            checks.push(transition_table_check());
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let migration_started = Instant::now();
    let migration_result = runtime.block_on(async {
        migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;
        let table_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table'
               AND name IN ('quotation', 'trade_transaction', 'escrow_account',
                            'release_condition', 'transaction_milestone')",
        )
        .fetch_one(&pool)
        .await
        .map_err(|e| e.to_string())?;
        Ok::<i64, String>(table_count)
    });
    match migration_result {
        Ok(5) => checks.push(SmokeCheck {
            name: "migration_visibility",
            status: SmokeStatus::Pass,
            elapsed_ms: migration_started.elapsed().as_millis() as u64,
            message: "settlement-path tables visible after migration".to_string(),
        }),
        Ok(count) => checks.push(SmokeCheck {
            name: "migration_visibility",
            status: SmokeStatus::Fail,
            elapsed_ms: migration_started.elapsed().as_millis() as u64,
            message: format!("expected 5 settlement-path tables, found {count}"),
        }),
        Err(error) => checks.push(SmokeCheck {
            name: "migration_visibility",
            status: SmokeStatus::Fail,
            elapsed_ms: migration_started.elapsed().as_millis() as u64,
            message: error,
        }),
    }
    runtime.block_on(pool.close());

    checks.push(release_invariant_check());
    checks.push(transition_table_check());

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

/// Exercise the three-condition release invariant on an in-memory escrow:
/// no two-of-three combination may release, all three must.
fn release_invariant_check() -> SmokeCheck {
    let check_started = Instant::now();
    let base = EscrowAccount {
        id: EscrowId("ESC-SMOKE".to_string()),
        transaction_id: TransactionId("TXN-SMOKE".to_string()),
        amount: rust_decimal::Decimal::new(100_00, 2),
        currency: "USD".to_string(),
        status: EscrowStatus::Held,
        delivery_confirmed: false,
        quality_approved: false,
        documents_verified: false,
        released_at: None,
        refunded_at: None,
        dispute_reason: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    let mut holds = true;
    for skipped_condition in ConditionType::ALL {
        let mut escrow = base.clone();
        for condition in ConditionType::ALL {
            if condition != skipped_condition {
                match condition {
                    ConditionType::DeliveryConfirmed => escrow.delivery_confirmed = true,
                    ConditionType::QualityApproved => escrow.quality_approved = true,
                    ConditionType::DocumentsVerified => escrow.documents_verified = true,
                }
            }
        }
        holds &= !escrow.release_ready();
    }

    let mut full = base.clone();
    full.delivery_confirmed = true;
    full.quality_approved = true;
    full.documents_verified = true;
    holds &= full.release_ready();

    let mut already_released = full;
    already_released.status = EscrowStatus::Released;
    holds &= !already_released.release_ready();

    SmokeCheck {
        name: "release_invariant",
        status: if holds { SmokeStatus::Pass } else { SmokeStatus::Fail },
        elapsed_ms: check_started.elapsed().as_millis() as u64,
        message: if holds {
            "escrow releases iff all three conditions hold".to_string()
        } else {
            "three-condition release invariant violated".to_string()
        },
    }
}

/// Spot-check the fixed transition table, including the SHIPPED narrow gate.
fn transition_table_check() -> SmokeCheck {
    let check_started = Instant::now();
    let ok = TransactionStatus::Shipped.allowed_transitions()
        == [TransactionStatus::InTransit]
        && TransactionStatus::Delivered.can_transition_to(TransactionStatus::Completed)
        && TransactionStatus::Completed.is_terminal()
        && !TransactionStatus::PaymentPending.can_transition_to(TransactionStatus::Delivered);

    SmokeCheck {
        name: "transition_table",
        status: if ok { SmokeStatus::Pass } else { SmokeStatus::Fail },
        elapsed_ms: check_started.elapsed().as_millis() as u64,
        message: if ok {
            "transaction adjacency table matches the settlement workflow".to_string()
        } else {
            "transaction adjacency table drifted".to_string()
        },
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due to earlier failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let failed = checks.iter().filter(|check| check.status == SmokeStatus::Fail).count();
    let status = if failed == 0 { SmokeStatus::Pass } else { SmokeStatus::Fail };
    let summary = if failed == 0 {
        "smoke: all checks passed".to_string()
    } else {
        format!("smoke: {failed} check(s) failed")
    };

    let report = SmokeReport { command: "smoke", status, summary, total_elapsed_ms, checks };
    let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
        format!("{{\"command\":\"smoke\",\"status\":\"fail\",\"error\":\"{error}\"}}")
    });

    CommandResult { exit_code: if failed == 0 { 0 } else { 1 }, output }
}

#[cfg(test)]
mod tests {
    use super::{release_invariant_check, transition_table_check, SmokeStatus};

    #[test]
    fn release_invariant_check_passes() {
        let check = release_invariant_check();
        assert_eq!(check.status, SmokeStatus::Pass, "{}", check.message);
    }

    #[test]
    fn transition_table_check_passes() {
        let check = transition_table_check();
        assert_eq!(check.status, SmokeStatus::Pass, "{}", check.message);
    }
}
