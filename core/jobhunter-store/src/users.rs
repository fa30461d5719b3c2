//! Admin accounts and login sessions.

use crate::{Store, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use jobhunter_types::{CustomerId, UserId};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

/// An administrator account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Who a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SessionSubject {
    Customer(CustomerId),
    Admin(UserId),
}

impl SessionSubject {
    fn kind(&self) -> &'static str {
        match self {
            Self::Customer(_) => "customer",
            Self::Admin(_) => "admin",
        }
    }

    fn raw_id(&self) -> i64 {
        match self {
            Self::Customer(id) => id.get(),
            Self::Admin(id) => id.get(),
        }
    }
}

/// A bearer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub subject: SessionSubject,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn admin_from_row(row: &Row<'_>) -> rusqlite::Result<AdminUser> {
    Ok(AdminUser {
        id: UserId::from_raw(row.get(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let kind: String = row.get(1)?;
    let subject_id: i64 = row.get(2)?;
    let subject = match kind.as_str() {
        "admin" => SessionSubject::Admin(UserId::from_raw(subject_id)),
        _ => SessionSubject::Customer(CustomerId::from_raw(subject_id)),
    };
    Ok(Session {
        token: row.get(0)?,
        subject,
        created_at: row.get(3)?,
        last_activity: row.get(4)?,
        expires_at: row.get(5)?,
    })
}

impl Store {
    // ── Admin accounts ───────────────────────────────────────────

    /// Creates an admin account.
    pub fn create_admin(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<AdminUser> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![username.trim(), email.trim(), password_hash, now],
        )
        .map_err(|e| StoreError::on_unique(e, "admin user"))?;
        Ok(AdminUser {
            id: UserId::from_raw(conn.last_insert_rowid()),
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
        })
    }

    pub fn get_admin(&self, id: UserId) -> StoreResult<Option<AdminUser>> {
        let conn = self.conn()?;
        let admin = conn
            .query_row(
                "SELECT id, username, email, password_hash, created_at FROM users WHERE id = ?1",
                params![id.get()],
                admin_from_row,
            )
            .optional()?;
        Ok(admin)
    }

    /// Looks an admin up by username or email.
    pub fn get_admin_by_login(&self, login: &str) -> StoreResult<Option<AdminUser>> {
        let conn = self.conn()?;
        let admin = conn
            .query_row(
                "SELECT id, username, email, password_hash, created_at FROM users \
                 WHERE username = ?1 OR email = ?1 ORDER BY id LIMIT 1",
                params![login.trim()],
                admin_from_row,
            )
            .optional()?;
        Ok(admin)
    }

    pub fn count_admins(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn update_admin_password(&self, id: UserId, password_hash: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id.get()],
        )?;
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────

    pub fn create_session(&self, session: &Session) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (token, kind, subject_id, created_at, last_activity, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.token,
                session.subject.kind(),
                session.subject.raw_id(),
                session.created_at,
                session.last_activity,
                session.expires_at,
            ],
        )
        .map_err(|e| StoreError::on_unique(e, "session"))?;
        Ok(())
    }

    pub fn get_session(&self, token: &str) -> StoreResult<Option<Session>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                "SELECT token, kind, subject_id, created_at, last_activity, expires_at \
                 FROM sessions WHERE token = ?1",
                params![token],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    /// Records activity on a session.
    pub fn touch_session(&self, token: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sessions SET last_activity = ?1 WHERE token = ?2",
            params![now, token],
        )?;
        Ok(())
    }

    pub fn delete_session(&self, token: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }

    /// Removes expired sessions, returning how many were deleted.
    pub fn purge_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
        Ok(removed)
    }
}
