//! Rate fact table operations
//!
//! The pair queries join the rate table against the currency table twice,
//! once per side, so callers get both currencies' full attribute sets in a
//! single row.

use crate::db::currencies::read_currency;
use crate::db::models::{NewRate, PairRate, Rate};
use crate::db::resource::{normalize_date, SortOrder};
use crate::error::Result;
use rusqlite::{params, Connection, Row};

const RATE_COLUMNS: &str = "id, from_code, to_code, date, value";

// Projection: rate id, the from-side currency, the to-side currency, then
// date and value. read_pair_rate below is tied to this column order.
const PAIR_JOIN_SELECT: &str = "\
SELECT rate.id,
       c_from.id, c_from.currency_code, c_from.name, c_from.symbol,
       c_from.country_code, c_from.country_name, c_from.country_flag_url,
       c_to.id, c_to.currency_code, c_to.name, c_to.symbol,
       c_to.country_code, c_to.country_name, c_to.country_flag_url,
       rate.date, rate.value
  FROM rate
 INNER JOIN currency AS c_from ON rate.from_code = c_from.currency_code
 INNER JOIN currency AS c_to ON rate.to_code = c_to.currency_code";

fn read_rate(row: &Row) -> rusqlite::Result<Rate> {
    Ok(Rate {
        id: row.get(0)?,
        from_code: row.get(1)?,
        to_code: row.get(2)?,
        date: row.get(3)?,
        value: row.get(4)?,
    })
}

fn read_pair_rate(row: &Row) -> rusqlite::Result<PairRate> {
    Ok(PairRate {
        id: row.get(0)?,
        from: read_currency(row, 1)?,
        to: read_currency(row, 8)?,
        date: row.get(15)?,
        value: row.get(16)?,
    })
}

/// Insert one rate row, returning the row id that now holds the value.
///
/// The date is normalized first; the table's UNIQUE(date, from, to)
/// ON CONFLICT REPLACE constraint turns a same-day duplicate into a replace.
pub fn insert(conn: &Connection, rate: &NewRate) -> Result<i64> {
    conn.execute(
        "INSERT INTO rate (from_code, to_code, date, value) VALUES (?1, ?2, ?3, ?4)",
        params![
            rate.from_code,
            rate.to_code,
            normalize_date(rate.date),
            rate.value
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Insert a batch of rate rows inside a single transaction.
///
/// A row that fails individually is skipped and left out of the returned
/// count without aborting the batch; only a transaction-level fault rolls
/// everything back.
pub fn bulk_insert(conn: &mut Connection, rates: &[NewRate]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut inserted = 0;

    for rate in rates {
        let result = tx.execute(
            "INSERT INTO rate (from_code, to_code, date, value) VALUES (?1, ?2, ?3, ?4)",
            params![
                rate.from_code,
                rate.to_code,
                normalize_date(rate.date),
                rate.value
            ],
        );
        match result {
            Ok(_) => inserted += 1,
            Err(e) => {
                tracing::warn!(
                    "Skipping rate row {}_{}: {}",
                    rate.from_code,
                    rate.to_code,
                    e
                );
            }
        }
    }

    tx.commit()?;
    Ok(inserted)
}

/// Delete rate rows strictly older than `cutoff`, returning the count.
pub fn delete_before(conn: &Connection, cutoff: i64) -> Result<usize> {
    let rows = conn.execute("DELETE FROM rate WHERE date < ?1", params![cutoff])?;
    Ok(rows)
}

/// Delete every rate row, returning the number removed.
pub fn delete_all(conn: &Connection) -> Result<usize> {
    let rows = conn.execute("DELETE FROM rate", [])?;
    Ok(rows)
}

/// Unfiltered query over the plain rate table.
pub fn query_all(conn: &Connection, sort: SortOrder) -> Result<Vec<Rate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RATE_COLUMNS} FROM rate{}",
        match sort {
            SortOrder::Unsorted => "",
            SortOrder::DateAsc => " ORDER BY date ASC",
            SortOrder::DateDesc => " ORDER BY date DESC",
        }
    ))?;

    let rates = stmt
        .query_map([], read_rate)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rates)
}

pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Rate>> {
    let result = conn.query_row(
        &format!("SELECT {RATE_COLUMNS} FROM rate WHERE id = ?1"),
        params![id],
        read_rate,
    );

    match result {
        Ok(rate) => Ok(Some(rate)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Join query for every rate from one currency, optionally `date >= start`.
pub fn query_from(
    conn: &Connection,
    from: &str,
    start_date: Option<i64>,
    sort: SortOrder,
) -> Result<Vec<PairRate>> {
    match start_date {
        None => {
            let sql = format!("{PAIR_JOIN_SELECT} WHERE rate.from_code = ?1{}", sort.sql());
            collect_pair_rates(conn, &sql, params![from])
        }
        Some(start) => {
            let sql = format!(
                "{PAIR_JOIN_SELECT} WHERE rate.from_code = ?1 AND rate.date >= ?2{}",
                sort.sql()
            );
            collect_pair_rates(conn, &sql, params![from, start])
        }
    }
}

/// Join query for one pair, optionally `date >= start`.
pub fn query_pair(
    conn: &Connection,
    from: &str,
    to: &str,
    start_date: Option<i64>,
    sort: SortOrder,
) -> Result<Vec<PairRate>> {
    match start_date {
        None => {
            let sql = format!(
                "{PAIR_JOIN_SELECT} WHERE rate.from_code = ?1 AND rate.to_code = ?2{}",
                sort.sql()
            );
            collect_pair_rates(conn, &sql, params![from, to])
        }
        Some(start) => {
            let sql = format!(
                "{PAIR_JOIN_SELECT} WHERE rate.from_code = ?1 AND rate.to_code = ?2 AND rate.date >= ?3{}",
                sort.sql()
            );
            collect_pair_rates(conn, &sql, params![from, to, start])
        }
    }
}

/// Join query for one pair on one exact normalized day.
pub fn query_pair_on_date(
    conn: &Connection,
    from: &str,
    to: &str,
    date: i64,
    sort: SortOrder,
) -> Result<Vec<PairRate>> {
    let sql = format!(
        "{PAIR_JOIN_SELECT} WHERE rate.from_code = ?1 AND rate.to_code = ?2 AND rate.date = ?3{}",
        sort.sql()
    );
    collect_pair_rates(conn, &sql, params![from, to, date])
}

/// Lazily walk the join for one pair, newest or oldest first.
///
/// The callback returns `false` to stop the scan early; the statement and its
/// row cursor are released on every exit path when they drop at the end of
/// this function.
pub fn for_each_pair_rate(
    conn: &Connection,
    from: &str,
    to: &str,
    sort: SortOrder,
    mut f: impl FnMut(&PairRate) -> bool,
) -> Result<()> {
    let sql = format!(
        "{PAIR_JOIN_SELECT} WHERE rate.from_code = ?1 AND rate.to_code = ?2{}",
        sort.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![from, to])?;

    while let Some(row) = rows.next()? {
        let pair_rate = read_pair_rate(row)?;
        if !f(&pair_rate) {
            break;
        }
    }

    Ok(())
}

fn collect_pair_rates(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<PairRate>> {
    let mut stmt = conn.prepare(sql)?;
    let rates = stmt
        .query_map(params, read_pair_rate)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rates)
}
