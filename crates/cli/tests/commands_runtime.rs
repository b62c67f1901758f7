use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use tradehub_cli::commands::{doctor, migrate, seed, smoke};

#[test]
fn migrate_returns_success_with_memory_database() {
    with_env(&[("TRADEHUB_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert!(payload["details"]["known_migrations"].as_u64().unwrap_or(0) >= 1);
    });
}

#[test]
fn migrate_returns_connectivity_failure_for_unreachable_database() {
    with_env(
        &[("TRADEHUB_DATABASE_URL", "sqlite://does-not-exist-dir/tradehub.db")],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 4, "expected db connectivity failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "db_connectivity");
        },
    );
}

#[test]
fn seed_loads_and_verifies_demo_dataset() {
    with_env(&[("TRADEHUB_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected deterministic seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["details"]["users"], 4);
        assert_eq!(payload["details"]["quotations"], 4);
        assert_eq!(payload["details"]["transactions"], 1);
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(&[("TRADEHUB_DATABASE_URL", "sqlite::memory:")], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        let first_payload = parse_payload(&first.output);
        let second_payload = parse_payload(&second.output);
        assert_eq!(first_payload["details"], second_payload["details"]);
    });
}

#[test]
fn smoke_returns_pass_report_with_memory_database() {
    with_env(&[("TRADEHUB_DATABASE_URL", "sqlite::memory:")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "expected successful smoke report");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");
        let checks = payload["checks"].as_array().expect("checks should be an array");
        assert!(checks.iter().any(|check| check["name"] == "release_invariant"));
        assert!(checks.iter().any(|check| check["name"] == "transition_table"));
    });
}

#[test]
fn smoke_reports_failure_when_database_is_unreachable() {
    with_env(
        &[("TRADEHUB_DATABASE_URL", "sqlite://does-not-exist-dir/tradehub.db")],
        || {
            let result = smoke::run();
            assert_eq!(result.exit_code, 1, "expected smoke failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "smoke");
            assert_eq!(payload["status"], "fail");
        },
    );
}

#[test]
fn doctor_json_report_passes_with_memory_database() {
    with_env(&[("TRADEHUB_DATABASE_URL", "sqlite::memory:")], || {
        let output = doctor::run(true);
        let payload = parse_payload(&output);
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"].as_array().expect("checks").len(), 3);
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "TRADEHUB_CONFIG",
        "TRADEHUB_DATABASE_URL",
        "TRADEHUB_DB_MAX_CONNECTIONS",
        "TRADEHUB_BIND_ADDRESS",
        "TRADEHUB_PORT",
        "TRADEHUB_HEALTH_PORT",
        "TRADEHUB_DEMO_FALLBACK",
        "TRADEHUB_LOG_LEVEL",
        "TRADEHUB_LOG_FORMAT",
        "TRADEHUB_SETTLEMENT_ENABLED",
        "TRADEHUB_SETTLEMENT_ENDPOINT",
        "TRADEHUB_SETTLEMENT_API_KEY",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
