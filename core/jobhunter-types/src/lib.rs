//! Shared domain types for the Job Hunter backend.
//!
//! This crate defines the plain types every other crate agrees on:
//! - Row identifiers (integer primary keys) and installation ids (UUID)
//! - Money in minor units with the currency it is quoted in
//! - The status and category enums stored as text columns
//!
//! Persistence, pricing rules and HTTP shapes live in their own crates.

mod ids;
mod money;
mod status;

pub use ids::{
    ActivationCodeId, AffiliateTransactionId, BadgeId, BannerId, CouponId, CustomerId,
    InstallationId, InvoiceId, OrderId, PayoutId, ProductId, TicketId, TicketMessageId, UserId,
};
pub use money::{Currency, Money, Percent};
pub use status::{
    CommissionStatus, DiscountType, InvoiceStatus, OrderStatus, PaymentMethod, PayoutStatus,
    SocialProvider, SubscriptionStatus, TicketCategory, TicketPriority, TicketStatus,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}
