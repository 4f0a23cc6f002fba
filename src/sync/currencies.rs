//! Currency seed load
//!
//! The currency reference set ships with the binary and is loaded into the
//! cache once, on first run. After a successful load the displayed-pairs list
//! is derived as `MAIN_OTHER` for every currency other than the main one, so
//! the first sync cycle has something to fetch.

use crate::config::{ConfigStore, CurrencyStatus};
use crate::db::models::NewCurrency;
use crate::db::ForexDb;
use crate::error::Result;

struct SeedCurrency {
    code: &'static str,
    name: &'static str,
    symbol: &'static str,
    country_code: &'static str,
    country_name: &'static str,
}

const SEED: &[SeedCurrency] = &[
    SeedCurrency { code: "USD", name: "US Dollar", symbol: "$", country_code: "US", country_name: "United States" },
    SeedCurrency { code: "EUR", name: "Euro", symbol: "\u{20ac}", country_code: "EU", country_name: "European Union" },
    SeedCurrency { code: "GBP", name: "British Pound", symbol: "\u{a3}", country_code: "GB", country_name: "United Kingdom" },
    SeedCurrency { code: "JPY", name: "Japanese Yen", symbol: "\u{a5}", country_code: "JP", country_name: "Japan" },
    SeedCurrency { code: "CHF", name: "Swiss Franc", symbol: "CHF", country_code: "CH", country_name: "Switzerland" },
    SeedCurrency { code: "CAD", name: "Canadian Dollar", symbol: "$", country_code: "CA", country_name: "Canada" },
    SeedCurrency { code: "AUD", name: "Australian Dollar", symbol: "$", country_code: "AU", country_name: "Australia" },
    SeedCurrency { code: "NZD", name: "New Zealand Dollar", symbol: "$", country_code: "NZ", country_name: "New Zealand" },
    SeedCurrency { code: "CNY", name: "Chinese Yuan", symbol: "\u{a5}", country_code: "CN", country_name: "China" },
    SeedCurrency { code: "INR", name: "Indian Rupee", symbol: "\u{20b9}", country_code: "IN", country_name: "India" },
    SeedCurrency { code: "BRL", name: "Brazilian Real", symbol: "R$", country_code: "BR", country_name: "Brazil" },
    SeedCurrency { code: "MXN", name: "Mexican Peso", symbol: "$", country_code: "MX", country_name: "Mexico" },
    SeedCurrency { code: "ZAR", name: "South African Rand", symbol: "R", country_code: "ZA", country_name: "South Africa" },
    SeedCurrency { code: "RUB", name: "Russian Ruble", symbol: "\u{20bd}", country_code: "RU", country_name: "Russia" },
    SeedCurrency { code: "SEK", name: "Swedish Krona", symbol: "kr", country_code: "SE", country_name: "Sweden" },
    SeedCurrency { code: "NOK", name: "Norwegian Krone", symbol: "kr", country_code: "NO", country_name: "Norway" },
    SeedCurrency { code: "DKK", name: "Danish Krone", symbol: "kr", country_code: "DK", country_name: "Denmark" },
    SeedCurrency { code: "PLN", name: "Polish Zloty", symbol: "z\u{142}", country_code: "PL", country_name: "Poland" },
    SeedCurrency { code: "TRY", name: "Turkish Lira", symbol: "\u{20ba}", country_code: "TR", country_name: "Turkey" },
    SeedCurrency { code: "SGD", name: "Singapore Dollar", symbol: "$", country_code: "SG", country_name: "Singapore" },
    SeedCurrency { code: "HKD", name: "Hong Kong Dollar", symbol: "$", country_code: "HK", country_name: "Hong Kong" },
    SeedCurrency { code: "KRW", name: "South Korean Won", symbol: "\u{20a9}", country_code: "KR", country_name: "South Korea" },
];

fn flag_url(country_code: &str) -> String {
    format!(
        "https://flagcdn.com/w320/{}.png",
        country_code.to_lowercase()
    )
}

/// Load the currency reference set and derive the displayed-pairs list.
///
/// Idempotent: once the load status is Ok and the table is populated, this
/// returns without touching anything. A partially completed earlier load is
/// resumed; currencies already present are left alone.
pub fn seed_currencies(db: &ForexDb, config: &ConfigStore) -> Result<()> {
    if config.currency_status() == CurrencyStatus::Ok && db.currency_count()? > 0 {
        tracing::debug!("Currency table already seeded");
        return Ok(());
    }

    let mut inserted = 0;
    for seed in SEED {
        if db.get_currency(seed.code)?.is_none() {
            db.insert_currency(&NewCurrency {
                code: seed.code.to_string(),
                name: seed.name.to_string(),
                symbol: seed.symbol.to_string(),
                country_code: seed.country_code.to_string(),
                country_name: seed.country_name.to_string(),
                country_flag_url: flag_url(seed.country_code),
            })?;
            inserted += 1;
        }
    }
    tracing::info!("Seeded {inserted} currencies");

    let main = config.main_currency();
    let pairs: Vec<String> = SEED
        .iter()
        .filter(|s| s.code != main.code)
        .map(|s| format!("{}_{}", main.code, s.code))
        .collect();
    config.set_sync_pairs(&pairs)?;
    config.set_currency_status(CurrencyStatus::Ok)?;

    Ok(())
}
