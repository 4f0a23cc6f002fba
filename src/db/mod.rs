//! Forex cache database module
//!
//! [`ForexDb`] is the only write path into the cache. Reads dispatch through
//! the fixed resource patterns in [`resource`], and every successful mutation
//! publishes a change notification tagged with the written resource.

pub mod currencies;
pub mod migrations;
pub mod models;
pub mod rates;
pub mod resource;

use crate::error::{AppError, Result};
use crate::events::{ChangeKind, EventBus};
use models::{Currency, NewCurrency, NewRate, PairRate, QueryResult};
use parking_lot::Mutex;
use resource::{RateResource, SortOrder};
use rusqlite::Connection;
use std::path::Path;

/// SQLite-backed rate repository
pub struct ForexDb {
    conn: Mutex<Connection>,
    events: EventBus,
}

impl ForexDb {
    /// Open (or create) the cache at `path` and run migrations.
    pub fn new(path: &Path, events: EventBus) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL lets readers proceed while the sync cycle writes.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
            events,
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// In-memory cache, used by tests.
    pub fn open_in_memory(events: EventBus) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
            events,
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Rate Methods ==========

    /// Upsert one rate row; the date is normalized and a same-day duplicate
    /// replaces the existing row. Returns the row id holding the value.
    pub fn insert_rate(&self, rate: &NewRate) -> Result<i64> {
        let id = {
            let conn = self.conn.lock();
            rates::insert(&conn, rate)?
        };
        self.events
            .notify_change(RateResource::RateItem(id), ChangeKind::Insert);
        Ok(id)
    }

    /// Insert a batch of rate rows in one transaction, returning how many
    /// were written. Exactly one notification is published for the batch.
    pub fn bulk_insert_rates(&self, rows: &[NewRate]) -> Result<usize> {
        let inserted = {
            let mut conn = self.conn.lock();
            rates::bulk_insert(&mut conn, rows)?
        };
        self.events
            .notify_change(RateResource::Rates, ChangeKind::BulkInsert);
        Ok(inserted)
    }

    /// Retention pruning: delete rate rows strictly older than `cutoff`.
    /// Notifies only when rows were actually removed.
    pub fn delete_rates_before(&self, cutoff: i64) -> Result<usize> {
        let deleted = {
            let conn = self.conn.lock();
            rates::delete_before(&conn, cutoff)?
        };
        if deleted > 0 {
            self.events
                .notify_change(RateResource::Rates, ChangeKind::Delete);
        }
        Ok(deleted)
    }

    /// Delete every rate row.
    pub fn delete_all_rates(&self) -> Result<usize> {
        let deleted = {
            let conn = self.conn.lock();
            rates::delete_all(&conn)?
        };
        if deleted > 0 {
            self.events
                .notify_change(RateResource::Rates, ChangeKind::Delete);
        }
        Ok(deleted)
    }

    // ========== Currency Methods ==========

    /// Insert a currency reference row, returning the new row id.
    pub fn insert_currency(&self, currency: &NewCurrency) -> Result<i64> {
        let id = {
            let conn = self.conn.lock();
            currencies::insert(&conn, currency)?
        };
        self.events
            .notify_change(RateResource::CurrencyItem(id), ChangeKind::Insert);
        Ok(id)
    }

    /// Administrative correction of a currency's attributes.
    pub fn update_currency(&self, currency: &Currency) -> Result<usize> {
        let updated = {
            let conn = self.conn.lock();
            currencies::update(&conn, currency)?
        };
        if updated > 0 {
            self.events
                .notify_change(RateResource::Currencies, ChangeKind::Update);
        }
        Ok(updated)
    }

    /// Delete every currency row. Not part of normal operation; the seed set
    /// is otherwise immutable.
    pub fn delete_all_currencies(&self) -> Result<usize> {
        let deleted = {
            let conn = self.conn.lock();
            currencies::delete_all(&conn)?
        };
        if deleted > 0 {
            self.events
                .notify_change(RateResource::Currencies, ChangeKind::Delete);
        }
        Ok(deleted)
    }

    pub fn get_currency(&self, code: &str) -> Result<Option<Currency>> {
        let conn = self.conn.lock();
        currencies::get_by_code(&conn, code)
    }

    pub fn list_currencies(&self) -> Result<Vec<Currency>> {
        let conn = self.conn.lock();
        currencies::list(&conn)
    }

    pub fn currency_count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        currencies::count(&conn)
    }

    // ========== Query Dispatch ==========

    /// Execute the query a resource identifier maps to.
    ///
    /// Each pattern runs exactly one parameterized statement; the pair
    /// patterns run the two-way currency join.
    pub fn query(&self, resource: &RateResource, sort: SortOrder) -> Result<QueryResult> {
        let conn = self.conn.lock();
        match resource {
            RateResource::Rates => Ok(QueryResult::Rates(rates::query_all(&conn, sort)?)),
            RateResource::RateItem(id) => {
                let rate = rates::get_by_id(&conn, *id)?
                    .ok_or_else(|| AppError::NotFound(format!("rate/{id}")))?;
                Ok(QueryResult::Rates(vec![rate]))
            }
            RateResource::RatesFrom { from, start_date } => Ok(QueryResult::PairRates(
                rates::query_from(&conn, from, *start_date, sort)?,
            )),
            RateResource::Pair {
                from,
                to,
                start_date,
            } => Ok(QueryResult::PairRates(rates::query_pair(
                &conn,
                from,
                to,
                *start_date,
                sort,
            )?)),
            RateResource::PairOnDate { from, to, date } => Ok(QueryResult::PairRates(
                rates::query_pair_on_date(&conn, from, to, *date, sort)?,
            )),
            RateResource::Currencies => Ok(QueryResult::Currencies(currencies::list(&conn)?)),
            RateResource::CurrencyItem(id) => {
                let currency = currencies::get_by_id(&conn, *id)?
                    .ok_or_else(|| AppError::NotFound(format!("currency/{id}")))?;
                Ok(QueryResult::Currencies(vec![currency]))
            }
        }
    }

    /// Lazily scan one pair's joined rows; the callback returns `false` to
    /// stop early. Used for the bounded rolling-average computation.
    pub fn scan_pair_rates(
        &self,
        from: &str,
        to: &str,
        sort: SortOrder,
        f: impl FnMut(&PairRate) -> bool,
    ) -> Result<()> {
        let conn = self.conn.lock();
        rates::for_each_pair_rate(&conn, from, to, sort, f)
    }
}
