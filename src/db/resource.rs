//! Resource identifiers for the forex cache
//!
//! Every read and write against the cache is addressed by one of a fixed set
//! of resource patterns. The set is closed, so it is modeled as an enum and
//! matched explicitly; the string form only exists at the boundary for
//! external consumers (widgets, notifications).

use crate::error::{AppError, Result};
use chrono::Utc;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Snap an epoch-millisecond timestamp to the start of its UTC calendar day.
///
/// Every date entering the rate table goes through this, so multiple fetches
/// within one day collapse onto the same row per pair. Idempotent.
pub fn normalize_date(millis: i64) -> i64 {
    millis.div_euclid(MILLIS_PER_DAY) * MILLIS_PER_DAY
}

/// The current UTC day start in epoch milliseconds.
pub fn today_normalized() -> i64 {
    normalize_date(Utc::now().timestamp_millis())
}

/// A normalized date moved back a whole number of days.
pub fn days_before(normalized: i64, days: i64) -> i64 {
    normalized - days * MILLIS_PER_DAY
}

/// Result ordering requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Unsorted,
    DateAsc,
    DateDesc,
}

impl SortOrder {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            SortOrder::Unsorted => "",
            SortOrder::DateAsc => " ORDER BY rate.date ASC",
            SortOrder::DateDesc => " ORDER BY rate.date DESC",
        }
    }
}

/// The fixed set of addressable resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateResource {
    /// `rate` — the whole rate table
    Rates,
    /// `rate/{id}` — one rate row, produced after inserts
    RateItem(i64),
    /// `rate/{from}` — all rates from one currency, optional `date >= start`
    RatesFrom {
        from: String,
        start_date: Option<i64>,
    },
    /// `rate/{from}/{to}` — join query for a pair, optional `date >= start`
    Pair {
        from: String,
        to: String,
        start_date: Option<i64>,
    },
    /// `rate/{from}/{to}/{date}` — join query for a pair on one exact day
    PairOnDate { from: String, to: String, date: i64 },
    /// `currency` — the whole currency table
    Currencies,
    /// `currency/{id}` — one currency row, produced after inserts
    CurrencyItem(i64),
}

impl RateResource {
    /// Pair resource with the start date normalized up front.
    pub fn pair_since(from: &str, to: &str, start_date: i64) -> Self {
        RateResource::Pair {
            from: from.to_uppercase(),
            to: to.to_uppercase(),
            start_date: Some(normalize_date(start_date)),
        }
    }

    /// Exact-day pair resource; the date is normalized up front.
    pub fn pair_on_date(from: &str, to: &str, date: i64) -> Self {
        RateResource::PairOnDate {
            from: from.to_uppercase(),
            to: to.to_uppercase(),
            date: normalize_date(date),
        }
    }

    /// Parse the string form of a resource identifier.
    ///
    /// First match wins on the fixed pattern list; anything else is an
    /// `UnknownResource` error. An optional `?date=N` query parameter carries
    /// the start-date filter for the `rate/{from}` and `rate/{from}/{to}`
    /// patterns.
    pub fn parse(input: &str) -> Result<Self> {
        let (path, query) = match input.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (input, None),
        };

        let start_date = match query {
            Some(q) => parse_start_date(q)?,
            None => None,
        };

        let segments: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        // Currency segments are uppercased to match the stored codes, the
        // same normalization the typed constructors apply.
        let resource = match segments.as_slice() {
            ["rate"] => RateResource::Rates,
            ["rate", id] if is_numeric(id) => RateResource::RateItem(parse_i64(id)?),
            ["rate", from] => RateResource::RatesFrom {
                from: from.to_uppercase(),
                start_date,
            },
            ["rate", from, to, date] if is_numeric(date) => RateResource::PairOnDate {
                from: from.to_uppercase(),
                to: to.to_uppercase(),
                date: parse_i64(date)?,
            },
            ["rate", from, to] => RateResource::Pair {
                from: from.to_uppercase(),
                to: to.to_uppercase(),
                start_date,
            },
            ["currency"] => RateResource::Currencies,
            ["currency", id] if is_numeric(id) => RateResource::CurrencyItem(parse_i64(id)?),
            _ => return Err(AppError::UnknownResource(input.to_string())),
        };

        Ok(resource)
    }
}

impl std::fmt::Display for RateResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateResource::Rates => write!(f, "rate"),
            RateResource::RateItem(id) => write!(f, "rate/{id}"),
            RateResource::RatesFrom { from, start_date } => match start_date {
                Some(d) => write!(f, "rate/{from}?date={d}"),
                None => write!(f, "rate/{from}"),
            },
            RateResource::Pair {
                from,
                to,
                start_date,
            } => match start_date {
                Some(d) => write!(f, "rate/{from}/{to}?date={d}"),
                None => write!(f, "rate/{from}/{to}"),
            },
            RateResource::PairOnDate { from, to, date } => {
                write!(f, "rate/{from}/{to}/{date}")
            }
            RateResource::Currencies => write!(f, "currency"),
            RateResource::CurrencyItem(id) => write!(f, "currency/{id}"),
        }
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn parse_i64(s: &str) -> Result<i64> {
    s.parse()
        .map_err(|_| AppError::UnknownResource(s.to_string()))
}

fn parse_start_date(query: &str) -> Result<Option<i64>> {
    for param in query.split('&') {
        if let Some(value) = param.strip_prefix("date=") {
            if value.is_empty() {
                return Ok(None);
            }
            return Ok(Some(
                value
                    .parse()
                    .map_err(|_| AppError::UnknownResource(query.to_string()))?,
            ));
        }
    }
    Ok(None)
}
