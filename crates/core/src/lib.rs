pub mod authz;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod reference;

pub use authz::{
    authorize_quotation, authorize_transaction, Actor, AuthzError, QuotationAction,
    TransactionAction,
};
pub use domain::escrow::{ConditionType, EscrowAccount, EscrowId, EscrowStatus, ReleaseCondition};
pub use domain::milestone::TransactionMilestone;
pub use domain::notification::{Notification, NotificationKind};
pub use domain::party::{KybStatus, Role, User, UserId};
pub use domain::quotation::{Quotation, QuotationId, QuotationStatus};
pub use domain::requirement::{Requirement, RequirementId, RequirementStatus};
pub use domain::transaction::{Transaction, TransactionId, TransactionStatus};
pub use errors::DomainError;
pub use pricing::{compute as compute_pricing, default_platform_fee_rate, QuotationPricing};
pub use reference::{
    format_quotation_reference, format_reference, format_requirement_reference,
    format_transaction_reference,
};
