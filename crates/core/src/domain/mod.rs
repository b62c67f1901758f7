pub mod escrow;
pub mod milestone;
pub mod notification;
pub mod party;
pub mod quotation;
pub mod requirement;
pub mod transaction;
