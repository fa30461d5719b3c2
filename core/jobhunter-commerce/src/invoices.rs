//! Invoice numbering, creation and HTML rendering.

use crate::error::{CommerceError, CommerceResult};
use crate::CommerceConfig;
use chrono::{DateTime, Duration, Utc};
use jobhunter_integrations::mail::escape_html as esc;
use jobhunter_store::{
    Invoice, InvoiceSettings, NewInvoice, NewInvoiceItem, Order, Store, StoreError,
};
use jobhunter_types::{CustomerId, InvoiceId, InvoiceStatus, Money, OrderStatus};
use std::fmt::Write;
use tracing::{debug, info};

/// Highest counter tried within one prefix and month.
const MAX_COUNTER: u32 = 9_999;

/// Inserts tried before a number collision is reported.
const NUMBER_ATTEMPTS: u32 = 10;

#[derive(Clone)]
pub struct InvoiceService {
    store: Store,
    config: CommerceConfig,
}

impl InvoiceService {
    pub fn new(store: Store, config: CommerceConfig) -> Self {
        Self { store, config }
    }

    /// Next free number of the form `<PREFIX>-<YYYYMM>-<NNNN>`, taking the
    /// lowest unused counter starting at `0001`.
    pub fn next_number(&self, now: DateTime<Utc>) -> CommerceResult<String> {
        let settings = self.store.invoice_settings(now)?;
        let stem = format!("{}-{}-", settings.invoice_prefix, now.format("%Y%m"));
        let taken = self.store.invoice_numbers_with_prefix(&stem)?;
        (1..=MAX_COUNTER)
            .map(|n| format!("{stem}{n:04}"))
            .find(|candidate| !taken.iter().any(|t| t == candidate))
            .ok_or_else(|| CommerceError::Conflict(format!("no invoice numbers left for {stem}")))
    }

    /// Creates the invoice for an order, or returns the existing one.
    ///
    /// A number taken by a concurrent writer is retried with the next free
    /// one.
    pub fn create_for_order(&self, order: &Order, now: DateTime<Utc>) -> CommerceResult<Invoice> {
        let mut attempt = 1;
        loop {
            if let Some(existing) = self.store.get_invoice_for_order(order.id)? {
                return Ok(existing);
            }
            let new = self.draft_for_order(order, now)?;
            match self.store.create_invoice(&new, now) {
                Ok(invoice) => {
                    info!(
                        invoice_number = %invoice.invoice_number,
                        order_id = %order.id,
                        "created invoice"
                    );
                    return Ok(invoice);
                }
                Err(StoreError::Conflict(what)) if attempt < NUMBER_ATTEMPTS => {
                    debug!(attempt, %what, order_id = %order.id, "invoice insert collided, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn draft_for_order(&self, order: &Order, now: DateTime<Utc>) -> CommerceResult<NewInvoice> {
        let product = self.store.active_product(now)?;
        let status = if order.status == OrderStatus::Completed {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Issued
        };
        let subtotal = order.original_amount;
        let discount = order.original_amount.saturating_sub_floor_zero(order.final_amount);
        let tax = Money::ZERO;
        let new = NewInvoice {
            invoice_number: self.next_number(now)?,
            order_id: Some(order.id),
            customer_id: order.customer_id,
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
            billing_address: None,
            invoice_date: now,
            due_date: now + Duration::days(self.config.invoice_due_days),
            subtotal,
            tax_amount: tax,
            discount_amount: discount,
            total_amount: subtotal + tax - discount,
            currency: order.currency.clone(),
            status,
            notes: order
                .coupon_code
                .as_ref()
                .map(|code| format!("Coupon applied: {code}")),
            items: vec![NewInvoiceItem {
                product_name: product.name,
                description: Some(product.description),
                quantity: 1,
                unit_price: order.original_amount,
            }],
        };
        Ok(new)
    }

    pub fn get(&self, id: InvoiceId) -> CommerceResult<Invoice> {
        self.store
            .get_invoice(id)?
            .ok_or_else(|| CommerceError::NotFound(format!("invoice {id}")))
    }

    /// Invoices of one customer, matched by account or email.
    pub fn list_for_customer(&self, customer: CustomerId, email: &str) -> CommerceResult<Vec<Invoice>> {
        Ok(self.store.list_invoices(Some((customer, email)))?)
    }

    pub fn list_all(&self) -> CommerceResult<Vec<Invoice>> {
        Ok(self.store.list_invoices(None)?)
    }

    pub fn mark_paid(&self, id: InvoiceId, now: DateTime<Utc>) -> CommerceResult<Invoice> {
        self.store.mark_invoice_paid(id, now)?;
        self.get(id)
    }

    pub fn settings(&self, now: DateTime<Utc>) -> CommerceResult<InvoiceSettings> {
        Ok(self.store.invoice_settings(now)?)
    }

    pub fn update_settings(
        &self,
        settings: &InvoiceSettings,
        now: DateTime<Utc>,
    ) -> CommerceResult<InvoiceSettings> {
        if settings.invoice_prefix.trim().is_empty() || settings.receipt_prefix.trim().is_empty() {
            return Err(CommerceError::Validation(
                "Invoice and receipt prefixes are required".to_string(),
            ));
        }
        for color in [&settings.primary_color, &settings.secondary_color] {
            if !is_hex_color(color) {
                return Err(CommerceError::Validation(format!("Invalid color: {color}")));
            }
        }
        self.store.save_invoice_settings(settings, now)?;
        Ok(self.store.invoice_settings(now)?)
    }

    /// Renders an invoice with the current settings.
    pub fn render_html(&self, invoice: &Invoice, now: DateTime<Utc>) -> CommerceResult<String> {
        let settings = self.store.invoice_settings(now)?;
        Ok(render_invoice_html(invoice, &settings))
    }
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

fn optional_line(out: &mut String, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        let _ = write!(out, "<div>{}</div>", esc(value));
    }
}

/// Renders a standalone HTML invoice. Every value that came from a user or
/// an admin is escaped.
#[must_use]
pub fn render_invoice_html(invoice: &Invoice, settings: &InvoiceSettings) -> String {
    // Colors are validated on save; fall back if an older row holds junk.
    let primary = if is_hex_color(&settings.primary_color) {
        settings.primary_color.as_str()
    } else {
        "#007bff"
    };
    let secondary = if is_hex_color(&settings.secondary_color) {
        settings.secondary_color.as_str()
    } else {
        "#6c757d"
    };
    let currency = invoice.currency.upper();

    let mut company = String::new();
    optional_line(&mut company, settings.company_address.as_deref());
    optional_line(&mut company, settings.company_phone.as_deref());
    optional_line(&mut company, settings.company_email.as_deref());
    optional_line(&mut company, settings.company_website.as_deref());
    if let Some(tax) = settings.tax_number.as_deref() {
        optional_line(&mut company, Some(format!("Tax ID: {tax}").as_str()));
    }

    let mut bill_to = format!(
        "<div><strong>{}</strong></div><div>{}</div>",
        esc(&invoice.customer_name),
        esc(&invoice.customer_email)
    );
    optional_line(&mut bill_to, invoice.billing_address.as_deref());

    let mut rows = String::new();
    for item in &invoice.items {
        let description = item
            .description
            .as_deref()
            .map(|d| format!("<div class=\"muted\">{}</div>", esc(d)))
            .unwrap_or_default();
        let _ = write!(
            rows,
            "<tr><td>{}{description}</td><td class=\"num\">{}</td>\
             <td class=\"num\">{} {currency}</td><td class=\"num\">{} {currency}</td></tr>",
            esc(&item.product_name),
            item.quantity,
            item.unit_price,
            item.total_price,
        );
    }

    let mut totals = format!(
        "<tr><td>Subtotal</td><td class=\"num\">{} {currency}</td></tr>",
        invoice.subtotal
    );
    if invoice.discount_amount.is_positive() {
        let _ = write!(
            totals,
            "<tr><td>Discount</td><td class=\"num\">-{} {currency}</td></tr>",
            invoice.discount_amount
        );
    }
    if invoice.tax_amount.is_positive() {
        let _ = write!(
            totals,
            "<tr><td>Tax</td><td class=\"num\">{} {currency}</td></tr>",
            invoice.tax_amount
        );
    }
    let _ = write!(
        totals,
        "<tr class=\"total\"><td>Total</td><td class=\"num\">{} {currency}</td></tr>",
        invoice.total_amount
    );

    let mut footer = String::new();
    optional_line(&mut footer, invoice.notes.as_deref());
    optional_line(&mut footer, settings.invoice_notes.as_deref());
    optional_line(&mut footer, settings.terms_and_conditions.as_deref());
    optional_line(
        &mut footer,
        Some(
            settings
                .footer_text
                .as_deref()
                .unwrap_or("Thank you for your business!"),
        ),
    );

    let paid = invoice
        .paid_at
        .map(|at| format!("<div>Paid: {}</div>", at.format("%Y-%m-%d")))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>Invoice {number}</title>\
         <style>\
         body {{ font-family: Arial, sans-serif; color: #333; margin: 40px; }}\
         .header {{ display: flex; justify-content: space-between; border-bottom: 3px solid {primary}; padding-bottom: 20px; }}\
         .company {{ color: {primary}; font-size: 24px; font-weight: bold; }}\
         .muted {{ color: {secondary}; font-size: 12px; }}\
         .status {{ text-transform: uppercase; font-weight: bold; color: {primary}; }}\
         table {{ width: 100%; border-collapse: collapse; margin-top: 30px; }}\
         th {{ background: {primary}; color: #fff; text-align: left; padding: 10px; }}\
         td {{ padding: 10px; border-bottom: 1px solid #eee; }}\
         .num {{ text-align: right; }}\
         .totals {{ width: 40%; margin-left: auto; }}\
         .total td {{ font-weight: bold; border-top: 2px solid {primary}; }}\
         .footer {{ margin-top: 40px; color: {secondary}; font-size: 12px; }}\
         </style></head><body>\
         <div class=\"header\"><div><div class=\"company\">{company_name}</div>{company}</div>\
         <div><h1>INVOICE</h1><div>{number}</div>\
         <div>Date: {date}</div><div>Due: {due}</div>{paid}\
         <div class=\"status\">{status}</div></div></div>\
         <h3>Bill To</h3>{bill_to}\
         <table><thead><tr><th>Item</th><th class=\"num\">Qty</th><th class=\"num\">Unit price</th>\
         <th class=\"num\">Amount</th></tr></thead><tbody>{rows}</tbody></table>\
         <table class=\"totals\">{totals}</table>\
         <div class=\"footer\">{footer}</div>\
         </body></html>",
        number = esc(&invoice.invoice_number),
        company_name = esc(&settings.company_name),
        date = invoice.invoice_date.format("%Y-%m-%d"),
        due = invoice.due_date.format("%Y-%m-%d"),
        status = invoice.status,
    )
}
