//! Orders.

use crate::licensing::{insert_activation_code, NewActivationCode};
use crate::{count_column, parse_column, Page, Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use jobhunter_license::ActivationCode;
use jobhunter_types::{Currency, CustomerId, Money, OrderId, OrderStatus, PaymentMethod};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

/// A purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer_id: Option<CustomerId>,
    pub customer_email: String,
    pub customer_name: String,
    pub original_amount: Money,
    pub final_amount: Money,
    pub discount_amount: Money,
    pub coupon_code: Option<String>,
    pub referral_code: Option<String>,
    pub currency: Currency,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_intent_id: Option<String>,
    pub paypal_order_id: Option<String>,
    #[serde(skip_serializing)]
    pub download_token: String,
    pub download_count: u32,
    pub max_downloads: u32,
    pub activation_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }

    #[must_use]
    pub fn downloads_remaining(&self) -> u32 {
        self.max_downloads.saturating_sub(self.download_count)
    }
}

/// Fields for a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Option<CustomerId>,
    pub customer_email: String,
    pub customer_name: String,
    pub original_amount: Money,
    pub final_amount: Money,
    pub discount_amount: Money,
    pub coupon_code: Option<String>,
    pub referral_code: Option<String>,
    pub currency: Currency,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_intent_id: Option<String>,
    pub paypal_order_id: Option<String>,
    pub download_token: String,
    pub max_downloads: u32,
}

/// One page of orders plus the total count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
}

/// Revenue figures over completed orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub total_revenue: Money,
    pub completed_orders: u64,
    pub pending_orders: u64,
}

const ORDER_COLUMNS: &str = "id, customer_id, customer_email, customer_name, original_amount, \
    final_amount, discount_amount, coupon_code, referral_code, currency, status, payment_method, \
    payment_intent_id, paypal_order_id, download_token, download_count, max_downloads, \
    activation_code, created_at, completed_at";

pub(crate) fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: OrderId::from_raw(row.get(0)?),
        customer_id: row.get::<_, Option<i64>>(1)?.map(CustomerId::from_raw),
        customer_email: row.get(2)?,
        customer_name: row.get(3)?,
        original_amount: Money::from_cents(row.get(4)?),
        final_amount: Money::from_cents(row.get(5)?),
        discount_amount: Money::from_cents(row.get(6)?),
        coupon_code: row.get(7)?,
        referral_code: row.get(8)?,
        currency: parse_column(row, 9)?,
        status: parse_column(row, 10)?,
        payment_method: parse_column(row, 11)?,
        payment_intent_id: row.get(12)?,
        paypal_order_id: row.get(13)?,
        download_token: row.get(14)?,
        download_count: count_column(row, 15)?,
        max_downloads: count_column(row, 16)?,
        activation_code: row.get(17)?,
        created_at: row.get(18)?,
        completed_at: row.get(19)?,
    })
}

impl Store {
    pub fn create_order(&self, new: &NewOrder, now: DateTime<Utc>) -> StoreResult<Order> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO orders (customer_id, customer_email, customer_name, original_amount, \
             final_amount, discount_amount, coupon_code, referral_code, currency, status, \
             payment_method, payment_intent_id, paypal_order_id, download_token, max_downloads, \
             created_at, completed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                new.customer_id.map(|id| id.get()),
                new.customer_email.trim(),
                new.customer_name.trim(),
                new.original_amount.cents(),
                new.final_amount.cents(),
                new.discount_amount.cents(),
                new.coupon_code,
                new.referral_code,
                new.currency.as_str(),
                new.status.as_str(),
                new.payment_method.as_str(),
                new.payment_intent_id,
                new.paypal_order_id,
                new.download_token,
                i64::from(new.max_downloads),
                now,
                (new.status == OrderStatus::Completed).then_some(now),
            ],
        )
        .map_err(|e| StoreError::on_unique(e, "order"))?;
        let id = OrderId::from_raw(conn.last_insert_rowid());
        let order = conn.query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
            params![id.get()],
            order_from_row,
        )?;
        Ok(order)
    }

    pub fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        self.order_where("id = ?1", id.get())
    }

    pub fn require_order(&self, id: OrderId) -> StoreResult<Order> {
        self.get_order(id)?
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))
    }

    /// Looks up the order a Stripe session or payment intent belongs to.
    pub fn get_order_by_payment_intent(&self, intent_id: &str) -> StoreResult<Option<Order>> {
        self.order_where("payment_intent_id = ?1", intent_id)
    }

    pub fn get_order_by_paypal_order(&self, paypal_order_id: &str) -> StoreResult<Option<Order>> {
        self.order_where("paypal_order_id = ?1", paypal_order_id)
    }

    pub fn get_order_by_download_token(&self, token: &str) -> StoreResult<Option<Order>> {
        self.order_where("download_token = ?1", token)
    }

    fn order_where(
        &self,
        clause: &str,
        value: impl rusqlite::ToSql,
    ) -> StoreResult<Option<Order>> {
        let conn = self.conn()?;
        let order = conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {clause}"),
                params![value],
                order_from_row,
            )
            .optional()?;
        Ok(order)
    }

    pub fn set_order_payment_intent(&self, id: OrderId, intent_id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE orders SET payment_intent_id = ?1 WHERE id = ?2",
            params![intent_id, id.get()],
        )
        .map_err(|e| StoreError::on_unique(e, "payment intent"))?;
        Ok(())
    }

    pub fn set_order_paypal_id(&self, id: OrderId, paypal_order_id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE orders SET paypal_order_id = ?1 WHERE id = ?2",
            params![paypal_order_id, id.get()],
        )
        .map_err(|e| StoreError::on_unique(e, "paypal order"))?;
        Ok(())
    }

    /// Moves an order to `status`. Completing stamps `completed_at`.
    ///
    /// Returns false if the order was already in that status.
    pub fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE orders SET status = ?1, \
             completed_at = CASE WHEN ?1 = 'completed' THEN ?2 ELSE completed_at END \
             WHERE id = ?3 AND status != ?1",
            params![status.as_str(), now, id.get()],
        )?;
        if changed == 0 {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM orders WHERE id = ?1)",
                params![id.get()],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound(format!("order {id}")));
            }
        }
        Ok(changed > 0)
    }

    /// Marks an order completed and attaches a freshly issued activation
    /// code in one transaction.
    ///
    /// Returns `None` without issuing anything when the order is already
    /// completed or has been refunded.
    pub fn complete_order_with_code(
        &self,
        id: OrderId,
        code: &NewActivationCode,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ActivationCode>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE orders SET status = 'completed', completed_at = ?1 \
             WHERE id = ?2 AND status NOT IN ('completed', 'refunded')",
            params![now, id.get()],
        )?;
        if changed == 0 {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM orders WHERE id = ?1)",
                params![id.get()],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound(format!("order {id}")));
            }
            return Ok(None);
        }
        let issued = insert_activation_code(&tx, code, now)?;
        tx.execute(
            "UPDATE orders SET activation_code = ?1 WHERE id = ?2",
            params![issued.code, id.get()],
        )?;
        tx.commit()?;
        Ok(Some(issued))
    }

    pub fn set_order_customer(&self, id: OrderId, customer: CustomerId) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE orders SET customer_id = ?1 WHERE id = ?2",
            params![customer.get(), id.get()],
        )?;
        Ok(())
    }

    /// Consumes one download. Returns false once the limit is reached.
    pub fn consume_download(&self, id: OrderId) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE orders SET download_count = download_count + 1 \
             WHERE id = ?1 AND download_count < max_downloads",
            params![id.get()],
        )?;
        Ok(changed > 0)
    }

    /// Lists orders newest first.
    pub fn list_orders(&self, page: Page) -> StoreResult<OrderPage> {
        let conn = self.conn()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC \
             LIMIT ?1 OFFSET ?2"
        ))?;
        let orders = stmt
            .query_map(
                params![i64::from(page.limit), i64::from(page.offset)],
                order_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(OrderPage {
            orders,
            total: total as u64,
        })
    }

    /// Orders placed by a customer, by account or by email.
    pub fn list_orders_for_customer(
        &self,
        customer: CustomerId,
        email: &str,
    ) -> StoreResult<Vec<Order>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE customer_id = ?1 OR customer_email = ?2 COLLATE NOCASE \
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![customer.get(), email.trim()], order_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn sales_summary(&self) -> StoreResult<SalesSummary> {
        let conn = self.conn()?;
        let (revenue, completed, pending): (i64, i64, i64) = conn.query_row(
            "SELECT \
                COALESCE(SUM(CASE WHEN status = 'completed' THEN final_amount END), 0), \
                COUNT(CASE WHEN status = 'completed' THEN 1 END), \
                COUNT(CASE WHEN status = 'pending' THEN 1 END) \
             FROM orders",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(SalesSummary {
            total_revenue: Money::from_cents(revenue),
            completed_orders: completed as u64,
            pending_orders: pending as u64,
        })
    }
}
