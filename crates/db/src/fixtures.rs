//! Deterministic demo dataset: four parties (one per role), an open
//! requirement with competing quotations, and one in-flight settlement with
//! a funded escrow. Loaded by `tradehub seed` and reused as the source of
//! the GET-path demo fallback records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use tradehub_core::domain::escrow::{
    ConditionType, EscrowAccount, EscrowId, EscrowStatus, ReleaseCondition,
};
use tradehub_core::domain::milestone::TransactionMilestone;
use tradehub_core::domain::party::{KybStatus, Role, User, UserId};
use tradehub_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use tradehub_core::domain::requirement::{Requirement, RequirementId, RequirementStatus};
use tradehub_core::domain::transaction::{Transaction, TransactionId, TransactionStatus};

use crate::repositories::{
    QuotationRepository, RepositoryError, RequirementRepository, SqlQuotationRepository,
    SqlRequirementRepository, SqlTransactionRepository, SqlUserRepository, TransactionDetail,
    TransactionRepository, UserRepository,
};
use crate::DbPool;

pub const DEMO_BUYER_TOKEN: &str = "demo-buyer-token";
pub const DEMO_SUPPLIER_TOKEN: &str = "demo-supplier-token";
pub const DEMO_ADMIN_TOKEN: &str = "demo-admin-token";
pub const DEMO_ACCOUNT_MANAGER_TOKEN: &str = "demo-am-token";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub users: usize,
    pub requirements: usize,
    pub quotations: usize,
    pub transactions: usize,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

pub struct DemoDataset;

fn fixed(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn demo_users() -> Vec<User> {
    let created_at = fixed("2026-01-05T08:00:00Z");
    vec![
        User {
            id: UserId("buyer-meridian".to_string()),
            email: "procurement@meridian-foods.example".to_string(),
            name: "Meridian Foods Procurement".to_string(),
            role: Role::Buyer,
            kyb_status: KybStatus::Completed,
            created_at,
        },
        User {
            id: UserId("supplier-hanwei".to_string()),
            email: "sales@hanwei-packaging.example".to_string(),
            name: "Hanwei Packaging".to_string(),
            role: Role::Supplier,
            kyb_status: KybStatus::Completed,
            created_at,
        },
        User {
            id: UserId("admin-ops".to_string()),
            email: "ops@tradehub.example".to_string(),
            name: "Platform Operations".to_string(),
            role: Role::Admin,
            kyb_status: KybStatus::Completed,
            created_at,
        },
        User {
            id: UserId("am-sofia".to_string()),
            email: "sofia@tradehub.example".to_string(),
            name: "Sofia Lindqvist".to_string(),
            role: Role::AccountManager,
            kyb_status: KybStatus::Completed,
            created_at,
        },
    ]
}

fn demo_requirements() -> Vec<Requirement> {
    let created_at = fixed("2026-02-10T09:30:00Z");
    vec![
        Requirement {
            id: RequirementId("REQ-DEMO-0001".to_string()),
            buyer_id: UserId("buyer-meridian".to_string()),
            account_manager_id: Some(UserId("am-sofia".to_string())),
            title: "Food-grade BOPP film, 25 micron".to_string(),
            category: "packaging".to_string(),
            quantity: 40_000,
            unit: "m2".to_string(),
            budget: Some(Decimal::new(18_000_00, 2)),
            currency: "USD".to_string(),
            status: RequirementStatus::Sourcing,
            created_at,
            updated_at: created_at,
        },
        Requirement {
            id: RequirementId("REQ-DEMO-0002".to_string()),
            buyer_id: UserId("buyer-meridian".to_string()),
            account_manager_id: Some(UserId("am-sofia".to_string())),
            title: "Corrugated shipping cartons, double wall".to_string(),
            category: "packaging".to_string(),
            quantity: 12_000,
            unit: "pcs".to_string(),
            budget: Some(Decimal::new(9_500_00, 2)),
            currency: "USD".to_string(),
            status: RequirementStatus::Accepted,
            created_at: fixed("2026-01-20T10:00:00Z"),
            updated_at: fixed("2026-02-01T14:15:00Z"),
        },
    ]
}

fn demo_quotations() -> Vec<Quotation> {
    let valid_until = fixed("2030-01-01T00:00:00Z");
    let base = fixed("2026-02-12T11:00:00Z");
    vec![
        Quotation {
            id: QuotationId("QUO-DEMO-0001".to_string()),
            requirement_id: RequirementId("REQ-DEMO-0001".to_string()),
            supplier_id: UserId("supplier-hanwei".to_string()),
            status: QuotationStatus::Submitted,
            unit_price: Decimal::new(42, 2),
            quantity: 40_000,
            subtotal: Decimal::new(16_800_00, 2),
            platform_fee: Decimal::new(336_00, 2),
            total: Decimal::new(17_136_00, 2),
            currency: "USD".to_string(),
            lead_time_days: 25,
            notes: Some("FOB Ningbo, food-grade certified".to_string()),
            valid_until,
            accepted_at: None,
            accepted_by: None,
            created_at: base,
            updated_at: base,
        },
        Quotation {
            id: QuotationId("QUO-DEMO-0002".to_string()),
            requirement_id: RequirementId("REQ-DEMO-0001".to_string()),
            supplier_id: UserId("supplier-hanwei".to_string()),
            status: QuotationStatus::Shortlisted,
            unit_price: Decimal::new(39, 2),
            quantity: 40_000,
            subtotal: Decimal::new(15_600_00, 2),
            platform_fee: Decimal::new(312_00, 2),
            total: Decimal::new(15_912_00, 2),
            currency: "USD".to_string(),
            lead_time_days: 40,
            notes: Some("Slower vessel routing, lower rate".to_string()),
            valid_until,
            accepted_at: None,
            accepted_by: None,
            created_at: fixed("2026-02-13T09:00:00Z"),
            updated_at: fixed("2026-02-14T16:30:00Z"),
        },
        Quotation {
            id: QuotationId("QUO-DEMO-0003".to_string()),
            requirement_id: RequirementId("REQ-DEMO-0001".to_string()),
            supplier_id: UserId("supplier-hanwei".to_string()),
            status: QuotationStatus::UnderReview,
            unit_price: Decimal::new(45, 2),
            quantity: 40_000,
            subtotal: Decimal::new(18_000_00, 2),
            platform_fee: Decimal::new(360_00, 2),
            total: Decimal::new(18_360_00, 2),
            currency: "USD".to_string(),
            lead_time_days: 18,
            notes: Some("Express production slot".to_string()),
            valid_until,
            accepted_at: None,
            accepted_by: None,
            created_at: fixed("2026-02-14T08:45:00Z"),
            updated_at: fixed("2026-02-14T08:45:00Z"),
        },
        Quotation {
            id: QuotationId("QUO-DEMO-0004".to_string()),
            requirement_id: RequirementId("REQ-DEMO-0002".to_string()),
            supplier_id: UserId("supplier-hanwei".to_string()),
            status: QuotationStatus::Accepted,
            unit_price: Decimal::new(72, 2),
            quantity: 12_000,
            subtotal: Decimal::new(8_640_00, 2),
            platform_fee: Decimal::new(172_80, 2),
            total: Decimal::new(8_812_80, 2),
            currency: "USD".to_string(),
            lead_time_days: 20,
            notes: None,
            valid_until,
            accepted_at: Some(fixed("2026-02-01T14:15:00Z")),
            accepted_by: Some(UserId("buyer-meridian".to_string())),
            created_at: fixed("2026-01-25T12:00:00Z"),
            updated_at: fixed("2026-02-01T14:15:00Z"),
        },
    ]
}

fn demo_transaction() -> Transaction {
    Transaction {
        id: TransactionId("TXN-DEMO-0001".to_string()),
        quotation_id: QuotationId("QUO-DEMO-0004".to_string()),
        requirement_id: RequirementId("REQ-DEMO-0002".to_string()),
        buyer_id: UserId("buyer-meridian".to_string()),
        supplier_id: UserId("supplier-hanwei".to_string()),
        amount: Decimal::new(8_812_80, 2),
        currency: "USD".to_string(),
        status: TransactionStatus::InTransit,
        expected_delivery: Some(fixed("2026-03-10T00:00:00Z")),
        actual_delivery: None,
        tracking_number: Some("MAEU-204881736".to_string()),
        created_at: fixed("2026-02-02T10:00:00Z"),
        updated_at: fixed("2026-02-20T07:30:00Z"),
    }
}

fn demo_escrow() -> EscrowAccount {
    EscrowAccount {
        id: EscrowId("ESC-DEMO-0001".to_string()),
        transaction_id: TransactionId("TXN-DEMO-0001".to_string()),
        amount: Decimal::new(8_812_80, 2),
        currency: "USD".to_string(),
        status: EscrowStatus::Held,
        delivery_confirmed: false,
        quality_approved: false,
        documents_verified: false,
        released_at: None,
        refunded_at: None,
        dispute_reason: None,
        created_at: fixed("2026-02-02T10:00:00Z"),
        updated_at: fixed("2026-02-02T10:00:00Z"),
    }
}

fn demo_conditions() -> Vec<ReleaseCondition> {
    ConditionType::ALL
        .into_iter()
        .map(|condition_type| ReleaseCondition {
            id: format!("RC-DEMO-{}", condition_type.as_str()),
            escrow_id: EscrowId("ESC-DEMO-0001".to_string()),
            condition_type,
            satisfied: false,
            satisfied_by: None,
            satisfied_at: None,
        })
        .collect()
}

impl DemoDataset {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let users = SqlUserRepository::new(pool.clone());
        let requirements = SqlRequirementRepository::new(pool.clone());
        let quotations = SqlQuotationRepository::new(pool.clone());
        let transactions = SqlTransactionRepository::new(pool.clone());

        let session_expiry = fixed("2030-01-01T00:00:00Z");
        let demo_user_list = demo_users();
        for user in &demo_user_list {
            users.save(user.clone()).await?;
        }
        for (token, user_id) in [
            (DEMO_BUYER_TOKEN, "buyer-meridian"),
            (DEMO_SUPPLIER_TOKEN, "supplier-hanwei"),
            (DEMO_ADMIN_TOKEN, "admin-ops"),
            (DEMO_ACCOUNT_MANAGER_TOKEN, "am-sofia"),
        ] {
            users.create_session(token, &UserId(user_id.to_string()), session_expiry).await?;
        }

        let demo_requirement_list = demo_requirements();
        for requirement in &demo_requirement_list {
            requirements.save(requirement.clone()).await?;
        }

        let demo_quotation_list = demo_quotations();
        for quotation in &demo_quotation_list {
            quotations.save(quotation.clone()).await?;
        }

        transactions.save(demo_transaction()).await?;
        transactions.save_escrow(demo_escrow()).await?;
        for condition in demo_conditions() {
            transactions.save_condition(condition).await?;
        }

        let existing_milestones =
            transactions.list_milestones(&TransactionId("TXN-DEMO-0001".to_string())).await?;
        if existing_milestones.is_empty() {
            transactions
                .append_milestone(TransactionMilestone::new(
                    TransactionId("TXN-DEMO-0001".to_string()),
                    "system",
                    "Escrow funded and goods in transit",
                    Some(TransactionStatus::Shipped),
                    Some(TransactionStatus::InTransit),
                ))
                .await?;
        }

        Ok(SeedResult {
            users: demo_user_list.len(),
            requirements: demo_requirement_list.len(),
            quotations: demo_quotation_list.len(),
            transactions: 1,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let user_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM app_user").fetch_one(pool).await?;
        checks.push(("demo-users", user_count >= 4));

        let open_status: Option<String> =
            sqlx::query_scalar("SELECT status FROM requirement WHERE id = 'REQ-DEMO-0001'")
                .fetch_optional(pool)
                .await?;
        checks.push(("open-requirement", open_status.as_deref() == Some("SOURCING")));

        let quotation_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM quotation WHERE requirement_id = 'REQ-DEMO-0001'",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("competing-quotations", quotation_count == 3));

        let escrow_status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM escrow_account WHERE transaction_id = 'TXN-DEMO-0001'",
        )
        .fetch_optional(pool)
        .await?;
        checks.push(("escrow-held", escrow_status.as_deref() == Some("HELD")));

        let condition_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM release_condition WHERE escrow_id = 'ESC-DEMO-0001'",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("release-conditions", condition_count == 3));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }

    /// Synthetic record served by the quotation GET fallback in demo mode.
    pub fn fallback_quotation() -> Quotation {
        demo_quotations().remove(0)
    }

    /// Synthetic record served by the transaction GET fallback in demo mode.
    pub fn fallback_transaction_detail() -> TransactionDetail {
        TransactionDetail {
            transaction: demo_transaction(),
            escrow: Some(demo_escrow()),
            conditions: demo_conditions(),
            milestones: vec![TransactionMilestone {
                id: "MIL-DEMO-0001".to_string(),
                transaction_id: TransactionId("TXN-DEMO-0001".to_string()),
                actor: "system".to_string(),
                description: "Escrow funded and goods in transit".to_string(),
                status_from: Some(TransactionStatus::Shipped),
                status_to: Some(TransactionStatus::InTransit),
                occurred_at: fixed("2026-02-20T07:30:00Z"),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DemoDataset;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn load_then_verify_passes_all_checks() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let seeded = DemoDataset::load(&pool).await.expect("load");
        assert_eq!(seeded.users, 4);
        assert_eq!(seeded.quotations, 4);

        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(
            verification.all_present,
            "failed checks: {:?}",
            verification
                .checks
                .iter()
                .filter(|(_, passed)| !passed)
                .map(|(name, _)| name)
                .collect::<Vec<_>>(),
        );
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        DemoDataset::load(&pool).await.expect("first load");
        DemoDataset::load(&pool).await.expect("second load");

        let milestone_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transaction_milestone WHERE transaction_id = 'TXN-DEMO-0001'",
        )
        .fetch_one(&pool)
        .await
        .expect("count");
        assert_eq!(milestone_count, 1, "reseeding must not duplicate milestones");

        for (name, passed) in DemoDataset::verify(&pool).await.expect("verify").checks {
            assert!(passed, "check {name} should pass after reseed");
        }
    }

    #[test]
    fn fallback_records_are_deterministic() {
        let first = DemoDataset::fallback_quotation();
        let second = DemoDataset::fallback_quotation();
        assert_eq!(first, second);

        let detail = DemoDataset::fallback_transaction_detail();
        assert_eq!(detail.transaction.id.0, "TXN-DEMO-0001");
        assert_eq!(detail.conditions.len(), 3);
    }
}
