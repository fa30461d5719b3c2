//! Product pricing and coupon evaluation.

use crate::error::{CommerceError, CommerceResult};
use chrono::{DateTime, Utc};
use jobhunter_store::{Coupon, NewCoupon, Store};
use jobhunter_types::{CouponId, Currency, DiscountType, Money, Percent};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Why a coupon was refused. Messages are shown to the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("Invalid coupon code")]
    Unknown,
    #[error("Coupon is not active")]
    Inactive,
    #[error("Coupon has expired")]
    Expired,
    #[error("Coupon usage limit reached")]
    UsageLimitReached,
}

/// Price of an order after discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub original_amount: Money,
    pub discount: Money,
    pub final_amount: Money,
}

impl Quote {
    #[must_use]
    pub fn full_price(amount: Money) -> Self {
        Self {
            original_amount: amount,
            discount: Money::ZERO,
            final_amount: amount,
        }
    }
}

/// The current list price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub name: String,
    pub price: Money,
    pub before_price: Option<Money>,
    pub currency: Currency,
}

/// Applies `coupon` to `amount`.
///
/// Percentage coupons store the rate in their value (`10.00` is 10%);
/// fixed coupons subtract the value. The final amount never goes below
/// zero.
pub fn evaluate_coupon(
    coupon: &Coupon,
    amount: Money,
    now: DateTime<Utc>,
) -> Result<Quote, CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.expires_at.is_some_and(|at| at <= now) {
        return Err(CouponRejection::Expired);
    }
    if coupon
        .usage_limit
        .is_some_and(|limit| coupon.usage_count >= limit)
    {
        return Err(CouponRejection::UsageLimitReached);
    }
    let discount = match coupon.discount_type {
        DiscountType::Percentage => {
            amount.percent_of(Percent::from_basis_points(coupon.discount_value.cents()))
        }
        DiscountType::Fixed => coupon.discount_value,
    };
    let final_amount = amount.saturating_sub_floor_zero(discount);
    Ok(Quote {
        original_amount: amount,
        discount: amount - final_amount,
        final_amount,
    })
}

/// Product price and coupon administration.
#[derive(Clone)]
pub struct CatalogService {
    store: Store,
}

impl CatalogService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn current_pricing(&self, now: DateTime<Utc>) -> CommerceResult<Pricing> {
        let product = self.store.active_product(now)?;
        Ok(Pricing {
            name: product.name,
            price: product.price,
            before_price: product.before_price,
            currency: product.currency,
        })
    }

    pub fn update_pricing(
        &self,
        price: Money,
        before_price: Option<Money>,
        now: DateTime<Utc>,
    ) -> CommerceResult<Pricing> {
        if !price.is_positive() {
            return Err(CommerceError::Validation(
                "Price must be greater than zero".to_string(),
            ));
        }
        if before_price.is_some_and(|before| !before.is_positive()) {
            return Err(CommerceError::Validation(
                "Before price must be greater than zero".to_string(),
            ));
        }
        let product = self.store.update_product_pricing(price, before_price, now)?;
        info!(price = %product.price, "updated product pricing");
        Ok(Pricing {
            name: product.name,
            price: product.price,
            before_price: product.before_price,
            currency: product.currency,
        })
    }

    /// Prices an order for `amount`, applying `coupon_code` when given.
    pub fn quote(
        &self,
        coupon_code: Option<&str>,
        amount: Money,
        now: DateTime<Utc>,
    ) -> CommerceResult<Quote> {
        match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            None => Ok(Quote::full_price(amount)),
            Some(code) => {
                let coupon = self
                    .store
                    .get_coupon_by_code(code)?
                    .ok_or(CouponRejection::Unknown)?;
                Ok(evaluate_coupon(&coupon, amount, now)?)
            }
        }
    }

    pub fn create_coupon(&self, new: &NewCoupon, now: DateTime<Utc>) -> CommerceResult<Coupon> {
        if new.code.trim().is_empty() {
            return Err(CommerceError::Validation("Coupon code is required".to_string()));
        }
        if !new.discount_value.is_positive() {
            return Err(CommerceError::Validation(
                "Discount value must be greater than zero".to_string(),
            ));
        }
        if new.discount_type == DiscountType::Percentage
            && new.discount_value > Money::from_cents(10_000)
        {
            return Err(CommerceError::Validation(
                "Percentage discount cannot exceed 100".to_string(),
            ));
        }
        let coupon = self.store.create_coupon(new, now)?;
        info!(code = %coupon.code, "created coupon");
        Ok(coupon)
    }

    pub fn list_coupons(&self) -> CommerceResult<Vec<Coupon>> {
        Ok(self.store.list_coupons()?)
    }

    pub fn set_coupon_active(&self, id: CouponId, active: bool) -> CommerceResult<()> {
        Ok(self.store.set_coupon_active(id, active)?)
    }

    pub fn delete_coupon(&self, id: CouponId) -> CommerceResult<()> {
        Ok(self.store.delete_coupon(id)?)
    }
}
