//! Business rules of the Job Hunter shop.
//!
//! The services in this crate sit between the HTTP layer and the
//! [`Store`](jobhunter_store::Store):
//! - [`CatalogService`]: pricing and coupons
//! - [`CheckoutService`]: orders, payment completion and fulfilment
//! - [`AffiliateService`]: referral tracking, commissions and payouts
//! - [`InvoiceService`]: numbering, creation and HTML rendering
//! - [`LicensingService`]: activation codes, trials and premium devices
//! - [`TicketService`]: support tickets
//! - [`AccountService`]: customer and admin authentication
//! - [`AnalyticsService`]: admin dashboard figures
//! - [`ContentService`]: countdown banners, announcement badges and SEO metadata
//!
//! Operations that depend on the time take `now` explicitly. Third-party
//! calls go through the traits in `jobhunter-integrations`, so tests run
//! against fakes.

pub mod accounts;
pub mod affiliate;
pub mod analytics;
pub mod checkout;
pub mod content;
mod error;
pub mod invoices;
pub mod licensing;
pub mod pricing;
pub mod tickets;

pub use accounts::{
    hash_password, validate_password_strength, verify_password, AccountService, PasswordStrength,
    Registration, StrengthLevel,
};
pub use affiliate::{AffiliateDashboard, AffiliateOverview, AffiliateService, PayoutRequest};
pub use analytics::{AnalyticsService, DashboardStats};
pub use checkout::{
    CheckoutRequest, CheckoutService, CheckoutStarted, DownloadGrant, Fulfilment, PurchaseStatus,
    StripeCompletion, WebhookOutcome,
};
pub use content::{BannerPriceSync, ContentService};
pub use error::{CommerceError, CommerceResult};
pub use invoices::{render_invoice_html, InvoiceService};
pub use licensing::{
    InstallationPing, LicensingService, TrialStatus, UsageReport, ValidatedLicense,
};
pub use pricing::{evaluate_coupon, CatalogService, CouponRejection, Pricing, Quote};
pub use tickets::{OpenTicket, TicketService, TicketThread, Viewer};

use jobhunter_types::{Money, Percent};

/// Tunables shared by the services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommerceConfig {
    /// Public URL of the site, used in emails and redirect URLs.
    pub base_url: String,
    /// Rate given to new affiliates.
    pub default_commission_rate: Percent,
    /// Smallest payout an affiliate may request.
    pub minimum_payout: Money,
    /// Order amount at or above which commissions are auto-approved.
    pub auto_approve_threshold: Money,
    /// Downloads allowed per purchase.
    pub max_downloads: u32,
    /// Days between invoice date and due date.
    pub invoice_due_days: i64,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            default_commission_rate: Percent::from_basis_points(1_000),
            minimum_payout: Money::from_cents(5_000),
            auto_approve_threshold: Money::from_cents(10_000),
            max_downloads: 3,
            invoice_due_days: 30,
        }
    }
}

impl CommerceConfig {
    /// `base_url` joined with an absolute path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

/// Loose email shape check: something before `@` and a dot after it.
#[must_use]
pub fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}
