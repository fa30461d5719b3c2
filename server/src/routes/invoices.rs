//! Invoice lookup, HTML rendering and invoice branding.

use crate::auth::{CurrentAdmin, Principal};
use crate::error::{ApiError, ApiResult};
use crate::routes::parse;
use crate::state::{AppState, SharedState};
use axum::{
    Json, Router,
    extract::{Path, State},
    response::Html,
    routing::{get, post},
};
use chrono::Utc;
use jobhunter_store::{Invoice, InvoiceSettings};
use jobhunter_types::InvoiceId;
use tracing::info;

/// Loads an invoice the caller is allowed to read. Customers only see
/// their own, matched by account or by billing email.
fn visible_invoice(state: &AppState, id: &str, principal: &Principal) -> ApiResult<Invoice> {
    let id: InvoiceId = parse(id, "invoice id")?;
    let invoice = state.invoices.get(id)?;
    match principal {
        Principal::Admin(_) => Ok(invoice),
        Principal::Customer(customer) => {
            let owned = invoice.customer_id == Some(customer.id)
                || invoice
                    .customer_email
                    .eq_ignore_ascii_case(customer.email.trim());
            if owned {
                Ok(invoice)
            } else {
                Err(ApiError::NotFound(format!("invoice {id}")))
            }
        }
    }
}

async fn get_invoice(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Invoice>> {
    Ok(Json(visible_invoice(&state, &id, &principal)?))
}

async fn invoice_html(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Html<String>> {
    let invoice = visible_invoice(&state, &id, &principal)?;
    Ok(Html(state.invoices.render_html(&invoice, Utc::now())?))
}

async fn list_invoices(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<Vec<Invoice>>> {
    Ok(Json(state.invoices.list_all()?))
}

async fn mark_paid(
    State(state): State<SharedState>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
) -> ApiResult<Json<Invoice>> {
    let id: InvoiceId = parse(&id, "invoice id")?;
    let invoice = state.invoices.mark_paid(id, Utc::now())?;
    info!(admin = %admin.admin.username, invoice = %invoice.invoice_number, "invoice marked paid");
    Ok(Json(invoice))
}

async fn settings(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
) -> ApiResult<Json<InvoiceSettings>> {
    Ok(Json(state.invoices.settings(Utc::now())?))
}

async fn update_settings(
    State(state): State<SharedState>,
    _admin: CurrentAdmin,
    Json(body): Json<InvoiceSettings>,
) -> ApiResult<Json<InvoiceSettings>> {
    Ok(Json(state.invoices.update_settings(&body, Utc::now())?))
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/invoices/{id}", get(get_invoice))
        .route("/api/invoices/{id}/html", get(invoice_html))
        .route("/api/admin/invoices", get(list_invoices))
        .route("/api/admin/invoices/{id}/mark-paid", post(mark_paid))
        .route(
            "/api/invoice-settings",
            get(settings).put(update_settings),
        )
}
