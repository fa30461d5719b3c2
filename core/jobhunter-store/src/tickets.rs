//! Support tickets and their message threads.

use crate::{parse_column, Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use jobhunter_types::{TicketCategory, TicketId, TicketMessageId, TicketPriority, TicketStatus};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub customer_email: String,
    pub customer_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub customer_email: String,
    pub customer_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketMessage {
    pub id: TicketMessageId,
    pub ticket_id: TicketId,
    pub message: String,
    pub is_from_customer: bool,
    pub sender_name: String,
    pub sender_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTicketMessage {
    pub message: String,
    pub is_from_customer: bool,
    pub sender_name: String,
    pub sender_email: Option<String>,
}

const TICKET_COLUMNS: &str = "id, title, description, category, priority, status, \
    customer_email, customer_name, created_at, updated_at, resolved_at";

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: TicketId::from_raw(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        category: parse_column(row, 3)?,
        priority: parse_column(row, 4)?,
        status: parse_column(row, 5)?,
        customer_email: row.get(6)?,
        customer_name: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        resolved_at: row.get(10)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<TicketMessage> {
    Ok(TicketMessage {
        id: TicketMessageId::from_raw(row.get(0)?),
        ticket_id: TicketId::from_raw(row.get(1)?),
        message: row.get(2)?,
        is_from_customer: row.get(3)?,
        sender_name: row.get(4)?,
        sender_email: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Store {
    pub fn create_ticket(&self, new: &NewTicket, now: DateTime<Utc>) -> StoreResult<Ticket> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tickets (title, description, category, priority, status, \
             customer_email, customer_name, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 'open', ?5, ?6, ?7, ?7)",
            params![
                new.title,
                new.description,
                new.category.as_str(),
                new.priority.as_str(),
                new.customer_email,
                new.customer_name,
                now,
            ],
        )?;
        Ok(Ticket {
            id: TicketId::from_raw(conn.last_insert_rowid()),
            title: new.title.clone(),
            description: new.description.clone(),
            category: new.category,
            priority: new.priority,
            status: TicketStatus::Open,
            customer_email: new.customer_email.clone(),
            customer_name: new.customer_name.clone(),
            created_at: now,
            updated_at: now,
            resolved_at: None,
        })
    }

    pub fn get_ticket(&self, id: TicketId) -> StoreResult<Option<Ticket>> {
        let conn = self.conn()?;
        let ticket = conn
            .query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"),
                params![id.get()],
                ticket_from_row,
            )
            .optional()?;
        Ok(ticket)
    }

    /// Lists tickets newest first, optionally only one customer's.
    pub fn list_tickets(&self, customer_email: Option<&str>) -> StoreResult<Vec<Ticket>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets \
             WHERE ?1 IS NULL OR customer_email = ?1 COLLATE NOCASE \
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![customer_email.map(str::trim)], ticket_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Changes a ticket's status. Resolving or closing stamps
    /// `resolved_at`; reopening clears it.
    pub fn set_ticket_status(
        &self,
        id: TicketId,
        status: TicketStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<Ticket> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE tickets SET status = ?1, updated_at = ?2, \
             resolved_at = CASE WHEN ?3 THEN COALESCE(resolved_at, ?2) ELSE NULL END \
             WHERE id = ?4",
            params![status.as_str(), now, status.is_terminal(), id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("ticket {id}")));
        }
        let ticket = conn.query_row(
            &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"),
            params![id.get()],
            ticket_from_row,
        )?;
        Ok(ticket)
    }

    /// Deletes a ticket and its messages.
    pub fn delete_ticket(&self, id: TicketId) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM tickets WHERE id = ?1", params![id.get()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("ticket {id}")));
        }
        Ok(())
    }

    /// Appends a message and bumps the ticket's `updated_at`.
    pub fn add_ticket_message(
        &self,
        ticket: TicketId,
        new: &NewTicketMessage,
        now: DateTime<Utc>,
    ) -> StoreResult<TicketMessage> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE tickets SET updated_at = ?1 WHERE id = ?2",
            params![now, ticket.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("ticket {ticket}")));
        }
        tx.execute(
            "INSERT INTO ticket_messages (ticket_id, message, is_from_customer, sender_name, \
             sender_email, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                ticket.get(),
                new.message,
                new.is_from_customer,
                new.sender_name,
                new.sender_email,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(TicketMessage {
            id: TicketMessageId::from_raw(id),
            ticket_id: ticket,
            message: new.message.clone(),
            is_from_customer: new.is_from_customer,
            sender_name: new.sender_name.clone(),
            sender_email: new.sender_email.clone(),
            created_at: now,
        })
    }

    /// Messages of a ticket, oldest first.
    pub fn list_ticket_messages(&self, ticket: TicketId) -> StoreResult<Vec<TicketMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, ticket_id, message, is_from_customer, sender_name, sender_email, \
             created_at FROM ticket_messages WHERE ticket_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![ticket.get()], message_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
