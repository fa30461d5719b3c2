//! Invoices, their line items, and the singleton invoice settings row.

use crate::{count_column, parse_column, Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use jobhunter_types::{Currency, CustomerId, InvoiceId, InvoiceStatus, Money, OrderId};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// An issued invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub order_id: Option<OrderId>,
    pub customer_id: Option<CustomerId>,
    pub customer_name: String,
    pub customer_email: String,
    pub billing_address: Option<String>,
    pub invoice_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub currency: Currency,
    pub status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub product_name: String,
    pub description: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
}

#[derive(Debug, Clone)]
pub struct NewInvoiceItem {
    pub product_name: String,
    pub description: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub order_id: Option<OrderId>,
    pub customer_id: Option<CustomerId>,
    pub customer_name: String,
    pub customer_email: String,
    pub billing_address: Option<String>,
    pub invoice_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub currency: Currency,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub items: Vec<NewInvoiceItem>,
}

/// Company details and branding printed on invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceSettings {
    pub company_name: String,
    pub company_address: Option<String>,
    pub company_phone: Option<String>,
    pub company_email: Option<String>,
    pub company_website: Option<String>,
    pub tax_number: Option<String>,
    pub invoice_prefix: String,
    pub receipt_prefix: String,
    pub invoice_notes: Option<String>,
    pub terms_and_conditions: Option<String>,
    pub footer_text: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
}

impl Default for InvoiceSettings {
    fn default() -> Self {
        Self {
            company_name: "OCUS Job Hunter".to_string(),
            company_address: None,
            company_phone: None,
            company_email: None,
            company_website: None,
            tax_number: None,
            invoice_prefix: "INV".to_string(),
            receipt_prefix: "RCP".to_string(),
            invoice_notes: None,
            terms_and_conditions: None,
            footer_text: None,
            primary_color: "#007bff".to_string(),
            secondary_color: "#6c757d".to_string(),
        }
    }
}

const INVOICE_COLUMNS: &str = "id, invoice_number, order_id, customer_id, customer_name, \
    customer_email, billing_address, invoice_date, due_date, subtotal, tax_amount, \
    discount_amount, total_amount, currency, status, paid_at, notes, created_at";

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: InvoiceId::from_raw(row.get(0)?),
        invoice_number: row.get(1)?,
        order_id: row.get::<_, Option<i64>>(2)?.map(OrderId::from_raw),
        customer_id: row.get::<_, Option<i64>>(3)?.map(CustomerId::from_raw),
        customer_name: row.get(4)?,
        customer_email: row.get(5)?,
        billing_address: row.get(6)?,
        invoice_date: row.get(7)?,
        due_date: row.get(8)?,
        subtotal: Money::from_cents(row.get(9)?),
        tax_amount: Money::from_cents(row.get(10)?),
        discount_amount: Money::from_cents(row.get(11)?),
        total_amount: Money::from_cents(row.get(12)?),
        currency: parse_column(row, 13)?,
        status: parse_column(row, 14)?,
        paid_at: row.get(15)?,
        notes: row.get(16)?,
        created_at: row.get(17)?,
        items: Vec::new(),
    })
}

fn load_items(conn: &rusqlite::Connection, invoice: &mut Invoice) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "SELECT product_name, description, quantity, unit_price, total_price \
         FROM invoice_items WHERE invoice_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![invoice.id.get()], |row| {
        Ok(InvoiceItem {
            product_name: row.get(0)?,
            description: row.get(1)?,
            quantity: count_column(row, 2)?,
            unit_price: Money::from_cents(row.get(3)?),
            total_price: Money::from_cents(row.get(4)?),
        })
    })?;
    invoice.items = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(())
}

impl Store {
    /// Inserts an invoice with its items in one transaction.
    pub fn create_invoice(&self, new: &NewInvoice, now: DateTime<Utc>) -> StoreResult<Invoice> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO invoices (invoice_number, order_id, customer_id, customer_name, \
             customer_email, billing_address, invoice_date, due_date, subtotal, tax_amount, \
             discount_amount, total_amount, currency, status, paid_at, notes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                new.invoice_number,
                new.order_id.map(|id| id.get()),
                new.customer_id.map(|id| id.get()),
                new.customer_name,
                new.customer_email,
                new.billing_address,
                new.invoice_date,
                new.due_date,
                new.subtotal.cents(),
                new.tax_amount.cents(),
                new.discount_amount.cents(),
                new.total_amount.cents(),
                new.currency.as_str(),
                new.status.as_str(),
                (new.status == InvoiceStatus::Paid).then_some(now),
                new.notes,
                now,
            ],
        )
        .map_err(|e| StoreError::on_unique(e, "invoice number"))?;
        let id = tx.last_insert_rowid();
        for item in &new.items {
            let total = Money::from_cents(item.unit_price.cents() * i64::from(item.quantity));
            tx.execute(
                "INSERT INTO invoice_items (invoice_id, product_name, description, quantity, \
                 unit_price, total_price) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    item.product_name,
                    item.description,
                    i64::from(item.quantity),
                    item.unit_price.cents(),
                    total.cents(),
                ],
            )?;
        }
        let mut invoice = tx.query_row(
            &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"),
            params![id],
            invoice_from_row,
        )?;
        load_items(&tx, &mut invoice)?;
        tx.commit()?;
        Ok(invoice)
    }

    pub fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        self.invoice_where("id = ?1", id.get())
    }

    pub fn get_invoice_by_number(&self, number: &str) -> StoreResult<Option<Invoice>> {
        self.invoice_where("invoice_number = ?1", number)
    }

    pub fn get_invoice_for_order(&self, order: OrderId) -> StoreResult<Option<Invoice>> {
        self.invoice_where("order_id = ?1", order.get())
    }

    fn invoice_where(&self, clause: &str, value: impl rusqlite::ToSql) -> StoreResult<Option<Invoice>> {
        let conn = self.conn()?;
        let invoice = conn
            .query_row(
                &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE {clause} LIMIT 1"),
                params![value],
                invoice_from_row,
            )
            .optional()?;
        match invoice {
            Some(mut invoice) => {
                load_items(&conn, &mut invoice)?;
                Ok(Some(invoice))
            }
            None => Ok(None),
        }
    }

    /// True if an invoice with this number exists.
    pub fn invoice_number_exists(&self, number: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM invoices WHERE invoice_number = ?1)",
            params![number],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Invoice numbers starting with `prefix`, ascending.
    pub fn invoice_numbers_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT invoice_number FROM invoices WHERE substr(invoice_number, 1, length(?1)) = ?1 \
             ORDER BY invoice_number",
        )?;
        let rows = stmt.query_map(params![prefix], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    /// Lists invoices newest first; with `customer` set, only that
    /// customer's (matched by account or email).
    pub fn list_invoices(
        &self,
        customer: Option<(CustomerId, &str)>,
    ) -> StoreResult<Vec<Invoice>> {
        let conn = self.conn()?;
        let (id, email) = match customer {
            Some((id, email)) => (Some(id.get()), Some(email.trim())),
            None => (None, None),
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE ?1 IS NULL OR customer_id = ?1 OR customer_email = ?2 COLLATE NOCASE \
             ORDER BY invoice_date DESC, id DESC"
        ))?;
        let mut invoices = stmt
            .query_map(params![id, email], invoice_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        for invoice in &mut invoices {
            load_items(&conn, invoice)?;
        }
        Ok(invoices)
    }

    /// Marks an invoice paid.
    pub fn mark_invoice_paid(&self, id: InvoiceId, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE invoices SET status = 'paid', paid_at = ?1 WHERE id = ?2",
            params![now, id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("invoice {id}")));
        }
        Ok(())
    }

    // ── Invoice settings ─────────────────────────────────────────

    /// Returns the invoice settings, creating the defaults on first use.
    pub fn invoice_settings(&self, now: DateTime<Utc>) -> StoreResult<InvoiceSettings> {
        let conn = self.conn()?;
        let existing = conn
            .query_row(
                "SELECT company_name, company_address, company_phone, company_email, \
                 company_website, tax_number, invoice_prefix, receipt_prefix, invoice_notes, \
                 terms_and_conditions, footer_text, primary_color, secondary_color \
                 FROM invoice_settings WHERE id = 1",
                [],
                |row| {
                    Ok(InvoiceSettings {
                        company_name: row.get(0)?,
                        company_address: row.get(1)?,
                        company_phone: row.get(2)?,
                        company_email: row.get(3)?,
                        company_website: row.get(4)?,
                        tax_number: row.get(5)?,
                        invoice_prefix: row.get(6)?,
                        receipt_prefix: row.get(7)?,
                        invoice_notes: row.get(8)?,
                        terms_and_conditions: row.get(9)?,
                        footer_text: row.get(10)?,
                        primary_color: row.get(11)?,
                        secondary_color: row.get(12)?,
                    })
                },
            )
            .optional()?;
        match existing {
            Some(settings) => Ok(settings),
            None => {
                drop(conn);
                let defaults = InvoiceSettings::default();
                self.save_invoice_settings(&defaults, now)?;
                Ok(defaults)
            }
        }
    }

    /// Replaces the invoice settings.
    pub fn save_invoice_settings(
        &self,
        settings: &InvoiceSettings,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO invoice_settings (id, company_name, company_address, company_phone, \
             company_email, company_website, tax_number, invoice_prefix, receipt_prefix, \
             invoice_notes, terms_and_conditions, footer_text, primary_color, secondary_color, \
             updated_at) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
             ON CONFLICT(id) DO UPDATE SET company_name = excluded.company_name, \
             company_address = excluded.company_address, company_phone = excluded.company_phone, \
             company_email = excluded.company_email, company_website = excluded.company_website, \
             tax_number = excluded.tax_number, invoice_prefix = excluded.invoice_prefix, \
             receipt_prefix = excluded.receipt_prefix, invoice_notes = excluded.invoice_notes, \
             terms_and_conditions = excluded.terms_and_conditions, \
             footer_text = excluded.footer_text, primary_color = excluded.primary_color, \
             secondary_color = excluded.secondary_color, updated_at = excluded.updated_at",
            params![
                settings.company_name,
                settings.company_address,
                settings.company_phone,
                settings.company_email,
                settings.company_website,
                settings.tax_number,
                settings.invoice_prefix,
                settings.receipt_prefix,
                settings.invoice_notes,
                settings.terms_and_conditions,
                settings.footer_text,
                settings.primary_color,
                settings.secondary_color,
                now,
            ],
        )?;
        Ok(())
    }
}
