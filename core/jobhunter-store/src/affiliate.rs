//! Affiliate commission ledger and payouts.

use crate::{parse_column, Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use jobhunter_types::{
    AffiliateTransactionId, CommissionStatus, CustomerId, Money, OrderId, PayoutId, PayoutStatus,
};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

/// One commission earned on a referred order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateTransaction {
    pub id: AffiliateTransactionId,
    pub affiliate_id: CustomerId,
    pub order_id: OrderId,
    pub commission: Money,
    pub status: CommissionStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Final amount of the referred order.
    pub order_amount: Money,
    pub customer_email: String,
}

/// A payout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliatePayout {
    pub id: PayoutId,
    pub affiliate_id: CustomerId,
    pub amount: Money,
    pub payment_method: String,
    pub payment_email: Option<String>,
    pub status: PayoutStatus,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewPayout {
    pub affiliate_id: CustomerId,
    pub amount: Money,
    pub payment_method: String,
    pub payment_email: Option<String>,
    pub notes: Option<String>,
}

/// Commission sums for one affiliate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateTotals {
    pub total_referrals: u64,
    pub total_commissions: Money,
    pub pending: Money,
    pub approved: Money,
    pub paid: Money,
    /// Amount already requested in payouts that are not settled yet.
    pub outstanding_payouts: Money,
}

impl AffiliateTotals {
    /// Unpaid commission not yet claimed by a payout request.
    #[must_use]
    pub fn available(&self) -> Money {
        (self.pending + self.approved).saturating_sub_floor_zero(self.outstanding_payouts)
    }
}

/// A row of the admin leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopAffiliate {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub referral_code: String,
    pub total_earnings: Money,
    pub total_referrals: u64,
    pub total_commissions: Money,
}

const TRANSACTION_SELECT: &str = "SELECT t.id, t.affiliate_id, t.order_id, t.commission, \
    t.status, t.paid_at, t.created_at, o.final_amount, o.customer_email \
    FROM affiliate_transactions t JOIN orders o ON o.id = t.order_id";

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<AffiliateTransaction> {
    Ok(AffiliateTransaction {
        id: AffiliateTransactionId::from_raw(row.get(0)?),
        affiliate_id: CustomerId::from_raw(row.get(1)?),
        order_id: OrderId::from_raw(row.get(2)?),
        commission: Money::from_cents(row.get(3)?),
        status: parse_column(row, 4)?,
        paid_at: row.get(5)?,
        created_at: row.get(6)?,
        order_amount: Money::from_cents(row.get(7)?),
        customer_email: row.get(8)?,
    })
}

const PAYOUT_COLUMNS: &str = "id, affiliate_id, amount, payment_method, payment_email, status, \
    transaction_id, notes, requested_at, processed_at, paid_at";

fn payout_from_row(row: &Row<'_>) -> rusqlite::Result<AffiliatePayout> {
    Ok(AffiliatePayout {
        id: PayoutId::from_raw(row.get(0)?),
        affiliate_id: CustomerId::from_raw(row.get(1)?),
        amount: Money::from_cents(row.get(2)?),
        payment_method: row.get(3)?,
        payment_email: row.get(4)?,
        status: parse_column(row, 5)?,
        transaction_id: row.get(6)?,
        notes: row.get(7)?,
        requested_at: row.get(8)?,
        processed_at: row.get(9)?,
        paid_at: row.get(10)?,
    })
}

impl Store {
    // ── Commissions ──────────────────────────────────────────────

    /// Records a pending commission and adds it to the affiliate's
    /// earnings. An order earns at most one commission.
    pub fn record_commission(
        &self,
        affiliate: CustomerId,
        order: OrderId,
        commission: Money,
        now: DateTime<Utc>,
    ) -> StoreResult<AffiliateTransaction> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO affiliate_transactions (affiliate_id, order_id, commission, status, \
             created_at) VALUES (?1, ?2, ?3, 'pending', ?4)",
            params![affiliate.get(), order.get(), commission.cents(), now],
        )
        .map_err(|e| StoreError::on_unique(e, "commission for order"))?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE customers SET total_earnings = total_earnings + ?1 WHERE id = ?2",
            params![commission.cents(), affiliate.get()],
        )?;
        let transaction = tx.query_row(
            &format!("{TRANSACTION_SELECT} WHERE t.id = ?1"),
            params![id],
            transaction_from_row,
        )?;
        tx.commit()?;
        Ok(transaction)
    }

    /// Commissions for an affiliate, newest first.
    pub fn list_commissions(
        &self,
        affiliate: CustomerId,
        limit: Option<u32>,
    ) -> StoreResult<Vec<AffiliateTransaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{TRANSACTION_SELECT} WHERE t.affiliate_id = ?1 \
             ORDER BY t.created_at DESC, t.id DESC LIMIT ?2"
        ))?;
        let limit = limit.map_or(-1, i64::from);
        let rows = stmt.query_map(params![affiliate.get(), limit], transaction_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn affiliate_totals(&self, affiliate: CustomerId) -> StoreResult<AffiliateTotals> {
        let conn = self.conn()?;
        let (referrals, total, pending, approved, paid): (i64, i64, i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(commission), 0), \
                 COALESCE(SUM(CASE WHEN status = 'pending' THEN commission END), 0), \
                 COALESCE(SUM(CASE WHEN status = 'approved' THEN commission END), 0), \
                 COALESCE(SUM(CASE WHEN status = 'paid' THEN commission END), 0) \
                 FROM affiliate_transactions WHERE affiliate_id = ?1",
                params![affiliate.get()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )?;
        let outstanding: i64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM affiliate_payouts \
             WHERE affiliate_id = ?1 AND status IN ('pending', 'processing')",
            params![affiliate.get()],
            |row| row.get(0),
        )?;
        Ok(AffiliateTotals {
            total_referrals: referrals as u64,
            total_commissions: Money::from_cents(total),
            pending: Money::from_cents(pending),
            approved: Money::from_cents(approved),
            paid: Money::from_cents(paid),
            outstanding_payouts: Money::from_cents(outstanding),
        })
    }

    /// Approves pending commissions on completed orders whose final amount
    /// is at least `threshold`. Returns the number approved.
    pub fn approve_commissions_over(&self, threshold: Money) -> StoreResult<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE affiliate_transactions SET status = 'approved' \
             WHERE status = 'pending' AND order_id IN \
             (SELECT id FROM orders WHERE status = 'completed' AND final_amount >= ?1)",
            params![threshold.cents()],
        )?;
        Ok(changed)
    }

    /// Approved commission per affiliate, less payouts already requested.
    pub fn approved_balances(&self) -> StoreResult<Vec<(CustomerId, Money)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT t.affiliate_id, SUM(t.commission) - COALESCE(( \
                 SELECT SUM(p.amount) FROM affiliate_payouts p \
                 WHERE p.affiliate_id = t.affiliate_id AND p.status IN ('pending', 'processing') \
             ), 0) AS balance \
             FROM affiliate_transactions t WHERE t.status = 'approved' \
             GROUP BY t.affiliate_id ORDER BY t.affiliate_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                CustomerId::from_raw(row.get(0)?),
                Money::from_cents(row.get(1)?),
            ))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ── Payouts ──────────────────────────────────────────────────

    pub fn create_payout(&self, new: &NewPayout, now: DateTime<Utc>) -> StoreResult<AffiliatePayout> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO affiliate_payouts (affiliate_id, amount, payment_method, payment_email, \
             status, notes, requested_at) VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6)",
            params![
                new.affiliate_id.get(),
                new.amount.cents(),
                new.payment_method,
                new.payment_email,
                new.notes,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        let payout = conn.query_row(
            &format!("SELECT {PAYOUT_COLUMNS} FROM affiliate_payouts WHERE id = ?1"),
            params![id],
            payout_from_row,
        )?;
        Ok(payout)
    }

    pub fn get_payout(&self, id: PayoutId) -> StoreResult<Option<AffiliatePayout>> {
        let conn = self.conn()?;
        let payout = conn
            .query_row(
                &format!("SELECT {PAYOUT_COLUMNS} FROM affiliate_payouts WHERE id = ?1"),
                params![id.get()],
                payout_from_row,
            )
            .optional()?;
        Ok(payout)
    }

    pub fn list_payouts_for_affiliate(
        &self,
        affiliate: CustomerId,
        limit: Option<u32>,
    ) -> StoreResult<Vec<AffiliatePayout>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM affiliate_payouts WHERE affiliate_id = ?1 \
             ORDER BY requested_at DESC, id DESC LIMIT ?2"
        ))?;
        let limit = limit.map_or(-1, i64::from);
        let rows = stmt.query_map(params![affiliate.get(), limit], payout_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Lists payouts, optionally filtered by status, oldest request first.
    pub fn list_payouts(&self, status: Option<PayoutStatus>) -> StoreResult<Vec<AffiliatePayout>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM affiliate_payouts \
             WHERE ?1 IS NULL OR status = ?1 ORDER BY requested_at, id"
        ))?;
        let rows = stmt.query_map(params![status.map(|s| s.as_str())], payout_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Marks a payout paid and settles commissions against it.
    ///
    /// Unpaid commissions are taken oldest first; a commission is settled
    /// only if it fits in what remains of the payout amount. Returns the
    /// updated payout and the total settled.
    pub fn settle_payout(
        &self,
        id: PayoutId,
        transaction_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<(AffiliatePayout, Money)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let payout = tx
            .query_row(
                &format!("SELECT {PAYOUT_COLUMNS} FROM affiliate_payouts WHERE id = ?1"),
                params![id.get()],
                payout_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("payout {id}")))?;
        if payout.status == PayoutStatus::Paid {
            return Err(StoreError::Conflict(format!("payout {id} settlement")));
        }

        tx.execute(
            "UPDATE affiliate_payouts SET status = 'paid', transaction_id = ?1, paid_at = ?2, \
             processed_at = ?2 WHERE id = ?3",
            params![transaction_id, now, id.get()],
        )?;

        let unpaid: Vec<(i64, i64)> = {
            let mut stmt = tx.prepare(
                "SELECT id, commission FROM affiliate_transactions \
                 WHERE affiliate_id = ?1 AND status IN ('pending', 'approved') \
                 ORDER BY created_at, id",
            )?;
            let rows = stmt.query_map(params![payout.affiliate_id.get()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut remaining = payout.amount.cents();
        let mut settled = 0i64;
        for (txn_id, commission) in unpaid {
            if remaining <= 0 {
                break;
            }
            if commission <= remaining {
                tx.execute(
                    "UPDATE affiliate_transactions SET status = 'paid', paid_at = ?1 WHERE id = ?2",
                    params![now, txn_id],
                )?;
                remaining -= commission;
                settled += commission;
            }
        }

        let updated = tx.query_row(
            &format!("SELECT {PAYOUT_COLUMNS} FROM affiliate_payouts WHERE id = ?1"),
            params![id.get()],
            payout_from_row,
        )?;
        tx.commit()?;
        Ok((updated, Money::from_cents(settled)))
    }

    /// Sets the status of a payout, e.g. to record a failed transfer.
    pub fn set_payout_status(
        &self,
        id: PayoutId,
        status: PayoutStatus,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE affiliate_payouts SET status = ?1, notes = COALESCE(?2, notes), \
             processed_at = ?3 WHERE id = ?4",
            params![status.as_str(), notes, now, id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("payout {id}")));
        }
        Ok(())
    }

    // ── Admin overview ───────────────────────────────────────────

    /// Returns (affiliate count, all commissions, pending payout count,
    /// pending payout amount).
    pub fn affiliate_program_totals(&self) -> StoreResult<(u64, Money, u64, Money)> {
        let conn = self.conn()?;
        let affiliates: i64 = conn.query_row(
            "SELECT COUNT(*) FROM customers WHERE referral_code IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        let commissions: i64 = conn.query_row(
            "SELECT COALESCE(SUM(commission), 0) FROM affiliate_transactions",
            [],
            |row| row.get(0),
        )?;
        let (pending_count, pending_total): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM affiliate_payouts \
             WHERE status = 'pending'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((
            affiliates as u64,
            Money::from_cents(commissions),
            pending_count as u64,
            Money::from_cents(pending_total),
        ))
    }

    /// Affiliates ranked by commission earned.
    pub fn top_affiliates(&self, limit: u32) -> StoreResult<Vec<TopAffiliate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.name, c.email, c.referral_code, c.total_earnings, \
             COUNT(t.id), COALESCE(SUM(t.commission), 0) AS commissions \
             FROM customers c LEFT JOIN affiliate_transactions t ON t.affiliate_id = c.id \
             WHERE c.referral_code IS NOT NULL \
             GROUP BY c.id ORDER BY commissions DESC, c.id LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![i64::from(limit)], |row| {
            Ok(TopAffiliate {
                id: CustomerId::from_raw(row.get(0)?),
                name: row.get(1)?,
                email: row.get(2)?,
                referral_code: row.get(3)?,
                total_earnings: Money::from_cents(row.get(4)?),
                total_referrals: row.get::<_, i64>(5)? as u64,
                total_commissions: Money::from_cents(row.get(6)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
