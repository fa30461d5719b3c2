//! SQLite persistence for the Job Hunter backend.
//!
//! One [`Store`] owns a single connection behind a mutex and exposes typed
//! operations grouped by aggregate (customers, orders, licensing, affiliate
//! ledger, invoices, tickets, settings, storefront content). Multi-row writes
//! run inside a SQLite transaction; everything else is a single statement.

mod affiliate;
mod catalog;
mod content;
mod customers;
mod error;
mod invoices;
mod licensing;
mod orders;
mod schema;
mod tickets;
mod users;

pub use affiliate::{AffiliatePayout, AffiliateTotals, AffiliateTransaction, NewPayout, TopAffiliate};
pub use catalog::{Coupon, DashboardFeature, NewCoupon, Product, Setting};
pub use content::{
    AnnouncementBadge, CountdownBanner, NewAnnouncementBadge, NewCountdownBanner, SeoSettings,
    Translations,
};
pub use customers::{Customer, NewCustomer};
pub use error::{StoreError, StoreResult};
pub use invoices::{Invoice, InvoiceItem, InvoiceSettings, NewInvoice, NewInvoiceItem};
pub use licensing::{Installation, NewActivationCode, PremiumDevice, UsageLogEntry};
pub use orders::{NewOrder, Order, OrderPage, SalesSummary};
pub use tickets::{NewTicket, NewTicketMessage, Ticket, TicketMessage};
pub use users::{AdminUser, Session, SessionSubject};

use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        debug!(path = %path.display(), "opened database");
        Self::from_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

/// Reads a text column into any `FromStr` type.
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a nullable text column into any `FromStr` type.
pub(crate) fn parse_optional_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        t.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Reads a non-negative integer column as `u32`.
pub(crate) fn count_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u32> {
    let value: i64 = row.get(idx)?;
    u32::try_from(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e))
    })
}

/// Page of a listing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// Builds a page from 1-based page number and page size.
    #[must_use]
    pub fn numbered(page: u32, per_page: u32) -> Self {
        let per_page = per_page.clamp(1, 100);
        Self {
            limit: per_page,
            offset: page.max(1).saturating_sub(1).saturating_mul(per_page),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}
