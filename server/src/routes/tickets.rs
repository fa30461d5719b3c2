//! Support tickets.

use crate::auth::{CurrentAdmin, OptionalCustomer, Principal};
use crate::error::{ApiError, ApiResult};
use crate::routes::parse;
use crate::state::SharedState;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::Utc;
use jobhunter_commerce::{OpenTicket, TicketThread};
use jobhunter_store::{Ticket, TicketMessage};
use jobhunter_types::{TicketCategory, TicketId, TicketPriority, TicketStatus};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenBody {
    title: String,
    description: String,
    customer_email: Option<String>,
    customer_name: Option<String>,
    category: Option<TicketCategory>,
    priority: Option<TicketPriority>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: TicketStatus,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

async fn open(
    State(state): State<SharedState>,
    OptionalCustomer(customer): OptionalCustomer,
    Json(body): Json<OpenBody>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    // A signed-in customer always files under their own account.
    let (email, name) = match customer {
        Some(customer) => (customer.email, Some(customer.name)),
        None => (
            body.customer_email.ok_or_else(|| {
                ApiError::BadRequest("Customer email is required".to_string())
            })?,
            body.customer_name,
        ),
    };
    let ticket = state.tickets.open(
        &OpenTicket {
            title: body.title,
            description: body.description,
            customer_email: email,
            customer_name: name,
            category: body.category,
            priority: body.priority,
        },
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn list(
    State(state): State<SharedState>,
    principal: Principal,
) -> ApiResult<Json<Vec<Ticket>>> {
    Ok(Json(state.tickets.list_for(&principal.viewer())?))
}

async fn thread(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<TicketThread>> {
    let id: TicketId = parse(&id, "ticket id")?;
    Ok(Json(state.tickets.thread(id, &principal.viewer())?))
}

async fn messages(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TicketMessage>>> {
    let id: TicketId = parse(&id, "ticket id")?;
    Ok(Json(state.tickets.thread(id, &principal.viewer())?.messages))
}

async fn set_status(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Json<Ticket>> {
    let id: TicketId = parse(&id, "ticket id")?;
    Ok(Json(state.tickets.set_status(
        id,
        body.status,
        &principal.viewer(),
        Utc::now(),
    )?))
}

async fn reply(
    State(state): State<SharedState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(body): Json<MessageBody>,
) -> ApiResult<(StatusCode, Json<TicketMessage>)> {
    let id: TicketId = parse(&id, "ticket id")?;
    let message = state
        .tickets
        .reply(id, &body.message, &principal.viewer(), Utc::now())?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn delete(
    State(state): State<SharedState>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: TicketId = parse(&id, "ticket id")?;
    state.tickets.delete(id)?;
    info!(admin = %admin.admin.username, ticket_id = %id, "ticket deleted by admin");
    Ok(StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/tickets", get(list).post(open))
        .route("/api/tickets/{id}", get(thread).delete(delete))
        .route("/api/tickets/{id}/status", put(set_status))
        .route("/api/tickets/{id}/messages", get(messages).post(reply))
}
