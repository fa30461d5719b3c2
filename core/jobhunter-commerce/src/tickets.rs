//! Support tickets.

use crate::error::{CommerceError, CommerceResult};
use crate::looks_like_email;
use chrono::{DateTime, Utc};
use jobhunter_store::{NewTicket, NewTicketMessage, Store, Ticket, TicketMessage};
use jobhunter_types::{TicketCategory, TicketId, TicketPriority, TicketStatus};
use serde::Serialize;
use tracing::info;

/// Who is looking at a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    /// A customer, who only sees tickets filed under their email.
    Customer { email: String, name: String },
    /// Support staff, who see everything.
    Staff { name: String },
}

impl Viewer {
    fn can_see(&self, ticket: &Ticket) -> bool {
        match self {
            Self::Customer { email, .. } => ticket.customer_email.eq_ignore_ascii_case(email.trim()),
            Self::Staff { .. } => true,
        }
    }
}

/// A new ticket as submitted.
#[derive(Debug, Clone, Default)]
pub struct OpenTicket {
    pub title: String,
    pub description: String,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
}

/// A ticket with its messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketThread {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}

#[derive(Clone)]
pub struct TicketService {
    store: Store,
}

impl TicketService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn open(&self, request: &OpenTicket, now: DateTime<Utc>) -> CommerceResult<Ticket> {
        let title = request.title.trim();
        let description = request.description.trim();
        let email = request.customer_email.trim();
        if title.is_empty() || description.is_empty() {
            return Err(CommerceError::Validation(
                "Title and description are required".to_string(),
            ));
        }
        if !looks_like_email(email) {
            return Err(CommerceError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        let name = request
            .customer_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(email);

        let ticket = self.store.create_ticket(
            &NewTicket {
                title: title.to_string(),
                description: description.to_string(),
                category: request.category.unwrap_or(TicketCategory::General),
                priority: request.priority.unwrap_or(TicketPriority::Medium),
                customer_email: email.to_string(),
                customer_name: name.to_string(),
            },
            now,
        )?;
        info!(ticket_id = %ticket.id, category = %ticket.category, "ticket opened");
        Ok(ticket)
    }

    /// Tickets visible to `viewer`, newest first.
    pub fn list_for(&self, viewer: &Viewer) -> CommerceResult<Vec<Ticket>> {
        let filter = match viewer {
            Viewer::Customer { email, .. } => Some(email.trim()),
            Viewer::Staff { .. } => None,
        };
        Ok(self.store.list_tickets(filter)?)
    }

    pub fn get(&self, id: TicketId, viewer: &Viewer) -> CommerceResult<Ticket> {
        let ticket = self
            .store
            .get_ticket(id)?
            .ok_or_else(|| CommerceError::NotFound("Ticket".to_string()))?;
        if !viewer.can_see(&ticket) {
            return Err(CommerceError::Forbidden);
        }
        Ok(ticket)
    }

    pub fn thread(&self, id: TicketId, viewer: &Viewer) -> CommerceResult<TicketThread> {
        let ticket = self.get(id, viewer)?;
        let messages = self.store.list_ticket_messages(id)?;
        Ok(TicketThread { ticket, messages })
    }

    /// Changes the status. Customers may only close their own tickets.
    pub fn set_status(
        &self,
        id: TicketId,
        status: TicketStatus,
        viewer: &Viewer,
        now: DateTime<Utc>,
    ) -> CommerceResult<Ticket> {
        self.get(id, viewer)?;
        if matches!(viewer, Viewer::Customer { .. }) && status != TicketStatus::Closed {
            return Err(CommerceError::Forbidden);
        }
        let ticket = self.store.set_ticket_status(id, status, now)?;
        info!(ticket_id = %id, status = %status, "ticket status changed");
        Ok(ticket)
    }

    /// Adds a message to the thread. A staff reply on an open ticket moves
    /// it to in-progress; a customer reply reopens a resolved one.
    pub fn reply(
        &self,
        id: TicketId,
        message: &str,
        viewer: &Viewer,
        now: DateTime<Utc>,
    ) -> CommerceResult<TicketMessage> {
        let message = message.trim();
        if message.is_empty() {
            return Err(CommerceError::Validation("Message is required".to_string()));
        }
        let ticket = self.get(id, viewer)?;
        if ticket.status == TicketStatus::Closed {
            return Err(CommerceError::Conflict("Ticket is closed".to_string()));
        }

        let new = match viewer {
            Viewer::Customer { email, name } => NewTicketMessage {
                message: message.to_string(),
                is_from_customer: true,
                sender_name: name.clone(),
                sender_email: Some(email.trim().to_string()),
            },
            Viewer::Staff { name } => NewTicketMessage {
                message: message.to_string(),
                is_from_customer: false,
                sender_name: name.clone(),
                sender_email: None,
            },
        };
        let saved = self.store.add_ticket_message(id, &new, now)?;

        let next = match (viewer, ticket.status) {
            (Viewer::Staff { .. }, TicketStatus::Open) => Some(TicketStatus::InProgress),
            (Viewer::Customer { .. }, TicketStatus::Resolved) => Some(TicketStatus::Open),
            _ => None,
        };
        if let Some(status) = next {
            self.store.set_ticket_status(id, status, now)?;
        }
        Ok(saved)
    }

    pub fn delete(&self, id: TicketId) -> CommerceResult<()> {
        self.store.delete_ticket(id)?;
        info!(ticket_id = %id, "ticket deleted");
        Ok(())
    }
}
