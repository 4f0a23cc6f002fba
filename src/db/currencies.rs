//! Currency reference table operations

use crate::db::models::{Currency, NewCurrency};
use crate::error::Result;
use rusqlite::{params, Connection, Row};

pub(crate) const CURRENCY_COLUMNS: &str =
    "id, currency_code, name, symbol, country_code, country_name, country_flag_url";

pub(crate) fn read_currency(row: &Row, offset: usize) -> rusqlite::Result<Currency> {
    Ok(Currency {
        id: row.get(offset)?,
        code: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        symbol: row.get(offset + 3)?,
        country_code: row.get(offset + 4)?,
        country_name: row.get(offset + 5)?,
        country_flag_url: row.get(offset + 6)?,
    })
}

/// Insert a currency, returning the new row id.
pub fn insert(conn: &Connection, currency: &NewCurrency) -> Result<i64> {
    conn.execute(
        "INSERT INTO currency (currency_code, name, symbol, country_code, country_name, country_flag_url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            currency.code,
            currency.name,
            currency.symbol,
            currency.country_code,
            currency.country_name,
            currency.country_flag_url
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Administrative correction of a currency's attributes.
pub fn update(conn: &Connection, currency: &Currency) -> Result<usize> {
    let rows = conn.execute(
        "UPDATE currency
            SET name = ?2, symbol = ?3, country_code = ?4, country_name = ?5, country_flag_url = ?6
          WHERE currency_code = ?1",
        params![
            currency.code,
            currency.name,
            currency.symbol,
            currency.country_code,
            currency.country_name,
            currency.country_flag_url
        ],
    )?;
    Ok(rows)
}

/// Look up a currency by its 3-letter code.
pub fn get_by_code(conn: &Connection, code: &str) -> Result<Option<Currency>> {
    let result = conn.query_row(
        &format!("SELECT {CURRENCY_COLUMNS} FROM currency WHERE currency_code = ?1"),
        params![code],
        |row| read_currency(row, 0),
    );

    match result {
        Ok(currency) => Ok(Some(currency)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Currency>> {
    let result = conn.query_row(
        &format!("SELECT {CURRENCY_COLUMNS} FROM currency WHERE id = ?1"),
        params![id],
        |row| read_currency(row, 0),
    );

    match result {
        Ok(currency) => Ok(Some(currency)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list(conn: &Connection) -> Result<Vec<Currency>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CURRENCY_COLUMNS} FROM currency ORDER BY currency_code"
    ))?;

    let currencies = stmt
        .query_map([], |row| read_currency(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(currencies)
}

pub fn count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM currency", [], |row| row.get(0))?;
    Ok(count)
}

/// Delete every currency row, returning the number removed.
pub fn delete_all(conn: &Connection) -> Result<usize> {
    let rows = conn.execute("DELETE FROM currency", [])?;
    Ok(rows)
}
