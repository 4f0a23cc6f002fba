//! Row types for the forex cache

use serde::{Deserialize, Serialize};

/// Currency reference entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub country_code: String,
    pub country_name: String,
    pub country_flag_url: String,
}

/// Insert request for a currency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCurrency {
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub country_code: String,
    pub country_name: String,
    pub country_flag_url: String,
}

/// Rate fact row, date in epoch milliseconds normalized to UTC day start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub id: i64,
    pub from_code: String,
    pub to_code: String,
    pub date: i64,
    pub value: f64,
}

/// Insert request for a rate row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRate {
    pub from_code: String,
    pub to_code: String,
    pub date: i64,
    pub value: f64,
}

/// Rate row denormalized with both sides of the pair joined in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRate {
    pub id: i64,
    pub from: Currency,
    pub to: Currency,
    pub date: i64,
    pub value: f64,
}

/// Result of dispatching a resource query
#[derive(Debug, Clone)]
pub enum QueryResult {
    Rates(Vec<Rate>),
    PairRates(Vec<PairRate>),
    Currencies(Vec<Currency>),
}

impl QueryResult {
    /// Number of rows in the result, whatever its shape
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Rates(rows) => rows.len(),
            QueryResult::PairRates(rows) => rows.len(),
            QueryResult::Currencies(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
