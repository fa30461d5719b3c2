//! Referral tracking, commissions and affiliate payouts.

use crate::error::{CommerceError, CommerceResult};
use crate::{looks_like_email, CommerceConfig};
use chrono::{DateTime, Utc};
use jobhunter_integrations::mail::templates::{
    self, AffiliateWelcome, CommissionApproved, PayoutProcessed, ReferralCommission,
};
use jobhunter_integrations::{Email, Mailer};
use jobhunter_license::generate_referral_code;
use jobhunter_store::{
    AffiliatePayout, AffiliateTotals, AffiliateTransaction, Customer, NewPayout, Order, Store,
    StoreError, TopAffiliate,
};
use jobhunter_types::{CustomerId, Money, PayoutId, PayoutStatus, Percent};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const RECENT_LIMIT: u32 = 10;
const TOP_AFFILIATES: u32 = 10;
const CODE_ATTEMPTS: usize = 5;

/// What an affiliate sees on their dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateDashboard {
    pub referral_code: String,
    pub referral_link: String,
    pub commission_rate: Percent,
    pub total_earnings: Money,
    pub stats: AffiliateTotals,
    pub available_balance: Money,
    pub minimum_payout: Money,
    pub recent_transactions: Vec<AffiliateTransaction>,
    pub payouts: Vec<AffiliatePayout>,
}

/// Program-wide figures for admins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateOverview {
    pub total_affiliates: u64,
    pub total_commissions: Money,
    pub pending_payout_count: u64,
    pub pending_payout_total: Money,
    pub top_affiliates: Vec<TopAffiliate>,
}

/// A payout an affiliate asks for.
#[derive(Debug, Clone)]
pub struct PayoutRequest {
    pub amount: Money,
    pub payment_method: String,
    pub payment_email: Option<String>,
}

#[derive(Clone)]
pub struct AffiliateService {
    store: Store,
    config: CommerceConfig,
    mailer: Arc<dyn Mailer>,
}

impl AffiliateService {
    pub fn new(store: Store, config: CommerceConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            config,
            mailer,
        }
    }

    fn referral_link(&self, code: &str) -> String {
        self.config.url(&format!("/?ref={code}"))
    }

    async fn notify(&self, email: Email) {
        if let Err(e) = self.mailer.send(&email).await {
            warn!(to = %email.to, error = %e, "failed to send affiliate email");
        }
    }

    /// Enrolls a customer in the affiliate program. Already enrolled
    /// customers are returned unchanged.
    pub async fn enroll(&self, customer: CustomerId, now: DateTime<Utc>) -> CommerceResult<Customer> {
        let existing = self.store.require_customer(customer)?;
        if existing.referral_code.is_some() {
            return Ok(existing);
        }

        let mut attempts = 0;
        let code = loop {
            attempts += 1;
            let code = generate_referral_code();
            match self.store.set_referral_code(
                customer,
                &code,
                self.config.default_commission_rate,
                now,
            ) {
                Ok(()) => break code,
                Err(StoreError::Conflict(_)) if attempts < CODE_ATTEMPTS => continue,
                Err(e) => return Err(e.into()),
            }
        };
        info!(customer_id = %customer, referral_code = %code, "affiliate enrolled");

        let enrolled = self.store.require_customer(customer)?;
        self.notify(templates::affiliate_welcome(
            &enrolled.email,
            &AffiliateWelcome {
                name: enrolled.name.clone(),
                referral_code: code,
                commission_rate: enrolled.commission_rate,
                base_url: self.config.base_url.clone(),
            },
        ))
        .await;
        Ok(enrolled)
    }

    /// Credits the affiliate behind `referral_code` for a completed order.
    ///
    /// Unknown codes, self-referrals and orders already credited are
    /// ignored and return `None`.
    pub async fn track_referral(
        &self,
        referral_code: &str,
        order: &Order,
        now: DateTime<Utc>,
    ) -> CommerceResult<Option<AffiliateTransaction>> {
        let Some(affiliate) = self
            .store
            .get_customer_by_referral_code(referral_code.trim())?
        else {
            debug!(referral_code, "unknown referral code");
            return Ok(None);
        };
        if affiliate.email.eq_ignore_ascii_case(order.customer_email.trim()) {
            debug!(order_id = %order.id, "ignoring self-referral");
            return Ok(None);
        }

        let commission = order.final_amount.percent_of(affiliate.commission_rate);
        let transaction =
            match self
                .store
                .record_commission(affiliate.id, order.id, commission, now)
            {
                Ok(t) => t,
                Err(StoreError::Conflict(_)) => {
                    debug!(order_id = %order.id, "referral already tracked");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };
        info!(
            affiliate_id = %affiliate.id,
            order_id = %order.id,
            commission = %commission,
            "recorded referral commission"
        );

        self.notify(templates::referral_commission(
            &affiliate.email,
            &ReferralCommission {
                affiliate_name: affiliate.name.clone(),
                referral_code: referral_code.trim().to_string(),
                customer_email: order.customer_email.clone(),
                order_amount: order.final_amount,
                commission,
                base_url: self.config.base_url.clone(),
            },
        ))
        .await;
        Ok(Some(transaction))
    }

    pub fn stats(&self, affiliate: CustomerId) -> CommerceResult<AffiliateTotals> {
        Ok(self.store.affiliate_totals(affiliate)?)
    }

    pub fn dashboard(&self, customer: CustomerId) -> CommerceResult<AffiliateDashboard> {
        let affiliate = self.store.require_customer(customer)?;
        let referral_code = affiliate.referral_code.clone().ok_or_else(|| {
            CommerceError::Validation("Not enrolled in the affiliate program".to_string())
        })?;
        let stats = self.store.affiliate_totals(customer)?;
        Ok(AffiliateDashboard {
            referral_link: self.referral_link(&referral_code),
            referral_code,
            commission_rate: affiliate.commission_rate,
            total_earnings: affiliate.total_earnings,
            available_balance: stats.available(),
            stats,
            minimum_payout: self.config.minimum_payout,
            recent_transactions: self.store.list_commissions(customer, Some(RECENT_LIMIT))?,
            payouts: self
                .store
                .list_payouts_for_affiliate(customer, Some(RECENT_LIMIT))?,
        })
    }

    /// Files a payout request against the affiliate's unpaid commission.
    pub fn request_payout(
        &self,
        affiliate: CustomerId,
        request: &PayoutRequest,
        now: DateTime<Utc>,
    ) -> CommerceResult<AffiliatePayout> {
        let method = request.payment_method.trim().to_ascii_lowercase();
        if !matches!(method.as_str(), "paypal" | "bank_transfer") {
            return Err(CommerceError::Validation(
                "Payment method must be paypal or bank_transfer".to_string(),
            ));
        }
        let payment_email = request
            .payment_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        if method == "paypal" && !payment_email.is_some_and(looks_like_email) {
            return Err(CommerceError::Validation(
                "A valid PayPal email is required".to_string(),
            ));
        }
        if request.amount < self.config.minimum_payout {
            return Err(CommerceError::BelowMinimum(self.config.minimum_payout));
        }
        self.store.require_customer(affiliate)?;
        let available = self.store.affiliate_totals(affiliate)?.available();
        if request.amount > available {
            return Err(CommerceError::InsufficientBalance { available });
        }

        let payout = self.store.create_payout(
            &NewPayout {
                affiliate_id: affiliate,
                amount: request.amount,
                payment_method: method,
                payment_email: payment_email.map(str::to_string),
                notes: None,
            },
            now,
        )?;
        info!(payout_id = %payout.id, affiliate_id = %affiliate, amount = %payout.amount, "payout requested");
        Ok(payout)
    }

    /// Marks a payout paid and settles commissions against it.
    pub async fn approve_payout(
        &self,
        payout: PayoutId,
        transaction_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> CommerceResult<AffiliatePayout> {
        let (payout, settled) = self
            .store
            .settle_payout(payout, transaction_id, now)
            .map_err(|e| match e {
                StoreError::Conflict(_) => {
                    CommerceError::Conflict("Payout has already been paid".to_string())
                }
                other => other.into(),
            })?;
        info!(payout_id = %payout.id, settled = %settled, "payout approved");

        if let Some(affiliate) = self.store.get_customer(payout.affiliate_id)? {
            self.notify(templates::payout_processed(
                &affiliate.email,
                &PayoutProcessed {
                    affiliate_name: affiliate.name,
                    amount: payout.amount,
                    payment_method: payout.payment_method.clone(),
                    transaction_id: payout.transaction_id.clone(),
                    base_url: self.config.base_url.clone(),
                },
            ))
            .await;
        }
        Ok(payout)
    }

    /// Records a failed transfer. The amount returns to the affiliate's
    /// available balance.
    pub fn reject_payout(
        &self,
        payout: PayoutId,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> CommerceResult<()> {
        let existing = self
            .store
            .get_payout(payout)?
            .ok_or_else(|| CommerceError::NotFound(format!("payout {payout}")))?;
        if existing.status == PayoutStatus::Paid {
            return Err(CommerceError::Conflict(
                "Payout has already been paid".to_string(),
            ));
        }
        self.store
            .set_payout_status(payout, PayoutStatus::Failed, notes, now)?;
        Ok(())
    }

    /// Approves pending commissions on completed orders at or above
    /// `threshold` (the configured default when `None`) and emails each
    /// affiliate whose balance changed.
    pub async fn auto_approve(&self, threshold: Option<Money>) -> CommerceResult<usize> {
        let threshold = threshold.unwrap_or(self.config.auto_approve_threshold);
        let before: Vec<(CustomerId, Money)> = self.store.approved_balances()?;
        let approved = self.store.approve_commissions_over(threshold)?;
        info!(approved, threshold = %threshold, "auto-approved commissions");
        if approved == 0 {
            return Ok(0);
        }

        for (affiliate_id, balance) in self.store.approved_balances()? {
            let previous = before
                .iter()
                .find(|(id, _)| *id == affiliate_id)
                .map_or(Money::ZERO, |(_, b)| *b);
            if balance <= previous {
                continue;
            }
            let Some(affiliate) = self.store.get_customer(affiliate_id)? else {
                continue;
            };
            let latest = self
                .store
                .list_commissions(affiliate_id, Some(1))?
                .into_iter()
                .next();
            if let Some(latest) = latest {
                self.notify(templates::commission_approved(
                    &affiliate.email,
                    &CommissionApproved {
                        affiliate_name: affiliate.name,
                        order_id: latest.order_id,
                        commission: balance - previous,
                        total_earnings: balance,
                        base_url: self.config.base_url.clone(),
                    },
                ))
                .await;
            }
        }
        Ok(approved)
    }

    /// Files a PayPal payout for every affiliate whose unclaimed approved
    /// commission reaches the minimum payout. Returns the payouts created.
    pub fn process_automatic_payouts(
        &self,
        now: DateTime<Utc>,
    ) -> CommerceResult<Vec<AffiliatePayout>> {
        let mut created = Vec::new();
        for (affiliate_id, balance) in self.store.approved_balances()? {
            if balance < self.config.minimum_payout {
                continue;
            }
            let Some(affiliate) = self.store.get_customer(affiliate_id)? else {
                continue;
            };
            let request = PayoutRequest {
                amount: balance,
                payment_method: "paypal".to_string(),
                payment_email: Some(affiliate.email.clone()),
            };
            match self.request_payout(affiliate_id, &request, now) {
                Ok(payout) => created.push(payout),
                Err(e) => warn!(affiliate_id = %affiliate_id, error = %e, "automatic payout skipped"),
            }
        }
        Ok(created)
    }

    pub fn list_payouts(&self, status: Option<PayoutStatus>) -> CommerceResult<Vec<AffiliatePayout>> {
        Ok(self.store.list_payouts(status)?)
    }

    pub fn overview(&self) -> CommerceResult<AffiliateOverview> {
        let (total_affiliates, total_commissions, pending_payout_count, pending_payout_total) =
            self.store.affiliate_program_totals()?;
        Ok(AffiliateOverview {
            total_affiliates,
            total_commissions,
            pending_payout_count,
            pending_payout_total,
            top_affiliates: self.store.top_affiliates(TOP_AFFILIATES)?,
        })
    }
}
