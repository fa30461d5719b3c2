//! Status and category enums persisted as text columns.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            /// Returns the stored text form.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text $(| $alias)* => Ok(Self::$variant),)+
                    other => Err(Error::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum!(
    /// Lifecycle of an order.
    OrderStatus, "order status" {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Refunded => "refunded",
    }
);

text_enum!(
    /// Payment provider used for an order.
    PaymentMethod, "payment method" {
        Stripe => "stripe",
        PayPal => "paypal",
    }
);

text_enum!(
    /// How a coupon's value is applied.
    DiscountType, "discount type" {
        /// Value is a percentage of the order amount.
        Percentage => "percentage",
        /// Value is an absolute amount.
        Fixed => "fixed",
    }
);

text_enum!(
    /// State of one commission in the affiliate ledger.
    CommissionStatus, "commission status" {
        Pending => "pending",
        Approved => "approved",
        Paid => "paid",
        Cancelled => "cancelled",
    }
);

text_enum!(
    PayoutStatus, "payout status" {
        Pending => "pending",
        Processing => "processing",
        Paid => "paid",
        Failed => "failed",
    }
);

text_enum!(
    InvoiceStatus, "invoice status" {
        Issued => "issued",
        Paid => "paid",
        Overdue => "overdue",
        Cancelled => "cancelled",
    }
);

text_enum!(
    /// Workflow state of a support ticket.
    TicketStatus, "ticket status" {
        Open => "open",
        InProgress => "in-progress" | "in_progress",
        Resolved => "resolved",
        Closed => "closed",
    }
);

impl TicketStatus {
    /// Resolved and closed tickets carry a resolution timestamp.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

text_enum!(
    TicketPriority, "ticket priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
);

impl Default for TicketPriority {
    fn default() -> Self {
        Self::Medium
    }
}

text_enum!(
    TicketCategory, "ticket category" {
        Technical => "technical",
        Billing => "billing",
        FeatureRequest => "feature-request",
        BugReport => "bug-report",
        General => "general",
    }
);

impl Default for TicketCategory {
    fn default() -> Self {
        Self::General
    }
}

text_enum!(
    SubscriptionStatus, "subscription status" {
        Inactive => "inactive",
        Active => "active",
        Cancelled => "cancelled",
        Expired => "expired",
    }
);

text_enum!(
    /// OAuth identity providers supported for customer sign-in.
    SocialProvider, "social provider" {
        Google => "google",
        Facebook => "facebook",
        GitHub => "github",
    }
);
