//! SQLite-backed trade store.
//!
//! Loads one normalized batch at a time: dimension rows are upserted by
//! natural key, surrogate keys are resolved, and trades are appended. A
//! batch either lands completely or not at all.

use crate::schema::SCHEMA;
use positions_core::{CanonicalTrade, Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const INSERT_TRADE: &str = "INSERT INTO trades (
    broker_id, external_trade_id, account_id, product_id,
    trade_date, delivery_month, side, quantity,
    trade_price, market_price, variation_margin,
    currency_code, as_of_date
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

/// Counts from one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Trades appended.
    pub trades_inserted: usize,
    /// Broker rows created.
    pub new_brokers: usize,
    /// Account rows created.
    pub new_accounts: usize,
    /// Product rows created.
    pub new_products: usize,
    /// Currency rows created.
    pub new_currencies: usize,
}

/// A persisted trade, read back with its natural keys.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTrade {
    pub broker_code: String,
    pub external_trade_id: String,
    pub account_number: String,
    pub product_code: Option<String>,
    pub product_name: String,
    pub trade_date: Option<String>,
    pub delivery_month: Option<String>,
    pub side: Option<String>,
    pub quantity: Option<Decimal>,
    pub currency_code: String,
    pub as_of_date: Option<String>,
}

/// Trade store over a SQLite connection.
pub struct PositionStore {
    conn: Connection,
}

impl PositionStore {
    /// Open (or create) a store file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db)?;
        debug!(path = %path.display(), "opened trade store");
        Self::with_connection(conn)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().map_err(db)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db)?;
        Ok(Self { conn })
    }

    /// Persist a normalized batch.
    ///
    /// Records with a gap in a dimension key, or whose side and quantity
    /// disagree, reject the whole batch before anything is written.
    pub fn load(&mut self, broker_name: &str, records: &[CanonicalTrade]) -> Result<LoadReport> {
        validate(records)?;

        let tx = self.conn.transaction().map_err(db)?;
        let mut report = LoadReport::default();
        let mut keys = KeyCache::default();

        {
            let mut insert = tx.prepare_cached(INSERT_TRADE).map_err(db)?;
            for record in records {
                let broker_id = keys.broker(&tx, &record.broker_code, broker_name, &mut report)?;
                let account_id = keys.account(&tx, &record.account_number, &mut report)?;
                let product_id = keys.product(
                    &tx,
                    record.product_code.as_deref(),
                    &record.product_name,
                    &mut report,
                )?;
                keys.currency(&tx, &record.currency_code, &mut report)?;

                insert
                    .execute(params![
                        broker_id,
                        record.external_trade_id,
                        account_id,
                        product_id,
                        record.trade_date.map(|d| d.format("%Y-%m-%d").to_string()),
                        record.delivery_month.map(|m| m.to_string()),
                        record.side.map(|s| s.as_str()),
                        record.quantity.map(|q| q.to_string()),
                        record.trade_price.map(|p| p.to_string()),
                        record.market_price.map(|p| p.to_string()),
                        record.variation_margin.map(|v| v.to_string()),
                        record.currency_code,
                        record.as_of_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    ])
                    .map_err(db)?;
                report.trades_inserted += 1;
            }
        }

        tx.commit().map_err(db)?;

        info!(
            broker = broker_name,
            trades = report.trades_inserted,
            new_accounts = report.new_accounts,
            new_products = report.new_products,
            "batch persisted"
        );
        Ok(report)
    }

    /// Number of stored trades.
    pub fn trade_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))
            .map_err(db)?;
        Ok(count as u64)
    }

    /// All stored trades in insertion order.
    pub fn trades(&self) -> Result<Vec<StoredTrade>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT b.broker_code, t.external_trade_id, a.account_number,
                        p.product_code, p.product_name, t.trade_date, t.delivery_month,
                        t.side, t.quantity, t.currency_code, t.as_of_date
                 FROM trades t
                 JOIN brokers b ON b.broker_id = t.broker_id
                 JOIN accounts a ON a.account_id = t.account_id
                 JOIN products p ON p.product_id = t.product_id
                 ORDER BY t.trade_id",
            )
            .map_err(db)?;

        let rows = stmt
            .query_map([], |row| {
                let quantity: Option<String> = row.get(8)?;
                Ok(StoredTrade {
                    broker_code: row.get(0)?,
                    external_trade_id: row.get(1)?,
                    account_number: row.get(2)?,
                    product_code: row.get(3)?,
                    product_name: row.get(4)?,
                    trade_date: row.get(5)?,
                    delivery_month: row.get(6)?,
                    side: row.get(7)?,
                    quantity: quantity.and_then(|q| Decimal::from_str(&q).ok()),
                    currency_code: row.get(9)?,
                    as_of_date: row.get(10)?,
                })
            })
            .map_err(db)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db)
    }
}

/// Reject batches the fact table cannot hold.
fn validate(records: &[CanonicalTrade]) -> Result<()> {
    for record in records {
        let key = &record.external_trade_id;
        if record.broker_code.is_empty() {
            return Err(Error::unresolved("broker", key));
        }
        if record.account_number.is_empty() {
            return Err(Error::unresolved("account", key));
        }
        if record.product_code.is_none() && record.product_name.is_empty() {
            return Err(Error::unresolved("product", key));
        }
        if record.currency_code.is_empty() {
            return Err(Error::unresolved("currency", key));
        }
        if !record.is_side_consistent() {
            return Err(Error::data(format!(
                "record '{key}' has side {:?} but quantity {:?}",
                record.side, record.quantity
            )));
        }
    }
    Ok(())
}

/// Surrogate keys resolved so far in one load.
#[derive(Default)]
struct KeyCache {
    brokers: HashMap<String, i64>,
    accounts: HashMap<String, i64>,
    products: HashMap<(Option<String>, String), i64>,
    currencies: HashMap<String, ()>,
}

impl KeyCache {
    fn broker(
        &mut self,
        conn: &Connection,
        code: &str,
        name: &str,
        report: &mut LoadReport,
    ) -> Result<i64> {
        if let Some(id) = self.brokers.get(code) {
            return Ok(*id);
        }
        report.new_brokers += conn
            .execute(
                "INSERT OR IGNORE INTO brokers (broker_code, broker_name) VALUES (?1, ?2)",
                params![code, name],
            )
            .map_err(db)?;
        let id: i64 = conn
            .query_row(
                "SELECT broker_id FROM brokers WHERE broker_code = ?1",
                params![code],
                |row| row.get(0),
            )
            .map_err(db)?;
        self.brokers.insert(code.to_string(), id);
        Ok(id)
    }

    fn account(&mut self, conn: &Connection, number: &str, report: &mut LoadReport) -> Result<i64> {
        if let Some(id) = self.accounts.get(number) {
            return Ok(*id);
        }
        report.new_accounts += conn
            .execute("INSERT OR IGNORE INTO accounts (account_number) VALUES (?1)", params![number])
            .map_err(db)?;
        let id: i64 = conn
            .query_row(
                "SELECT account_id FROM accounts WHERE account_number = ?1",
                params![number],
                |row| row.get(0),
            )
            .map_err(db)?;
        self.accounts.insert(number.to_string(), id);
        Ok(id)
    }

    /// Products resolve by code when there is one, otherwise by name.
    fn product(
        &mut self,
        conn: &Connection,
        code: Option<&str>,
        name: &str,
        report: &mut LoadReport,
    ) -> Result<i64> {
        let key = (code.map(str::to_string), name.to_string());
        if let Some(id) = self.products.get(&key) {
            return Ok(*id);
        }

        let id: i64 = match code {
            Some(code) => {
                let display = if name.is_empty() { code } else { name };
                report.new_products += conn
                    .execute(
                        "INSERT OR IGNORE INTO products (product_code, product_name)
                         VALUES (?1, ?2)",
                        params![code, display],
                    )
                    .map_err(db)?;
                conn.query_row(
                    "SELECT product_id FROM products WHERE product_code = ?1",
                    params![code],
                    |row| row.get(0),
                )
                .map_err(db)?
            }
            None => {
                let existing: Option<i64> = conn
                    .query_row(
                        "SELECT product_id FROM products WHERE product_name = ?1
                         ORDER BY product_id LIMIT 1",
                        params![name],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(db)?;
                match existing {
                    Some(id) => id,
                    None => {
                        conn.execute(
                            "INSERT INTO products (product_name) VALUES (?1)",
                            params![name],
                        )
                        .map_err(db)?;
                        report.new_products += 1;
                        conn.last_insert_rowid()
                    }
                }
            }
        };

        self.products.insert(key, id);
        Ok(id)
    }

    fn currency(&mut self, conn: &Connection, code: &str, report: &mut LoadReport) -> Result<()> {
        if self.currencies.contains_key(code) {
            return Ok(());
        }
        report.new_currencies += conn
            .execute("INSERT OR IGNORE INTO currencies (currency_code) VALUES (?1)", params![code])
            .map_err(db)?;
        self.currencies.insert(code.to_string(), ());
        Ok(())
    }
}

fn db(e: rusqlite::Error) -> Error {
    Error::database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use positions_core::{DeliveryMonth, Side};
    use rust_decimal_macros::dec;

    fn make_record(
        id: usize,
        account: &str,
        code: Option<&str>,
        side: Side,
        qty: Decimal,
    ) -> CanonicalTrade {
        CanonicalTrade {
            broker_code: "BKA".to_string(),
            external_trade_id: id.to_string(),
            account_number: account.to_string(),
            product_name: "Brent Crude".to_string(),
            product_code: code.map(str::to_string),
            trade_date: NaiveDate::from_ymd_opt(2025, 4, 3),
            delivery_month: DeliveryMonth::new(2025, 6),
            side: Some(side),
            quantity: Some(qty),
            trade_price: Some(dec!(70.25)),
            market_price: Some(dec!(71)),
            variation_margin: None,
            currency_code: "USD".to_string(),
            as_of_date: NaiveDate::from_ymd_opt(2025, 4, 30),
        }
    }

    #[test]
    fn test_load_and_read_back() {
        let mut store = PositionStore::open_in_memory().unwrap();
        let records = vec![
            make_record(0, "ACC1", Some("BRN"), Side::Buy, dec!(10)),
            make_record(1, "ACC1", Some("BRN"), Side::Sell, dec!(-2.5)),
            make_record(2, "ACC2", Some("BRN"), Side::Buy, dec!(1)),
        ];

        let report = store.load("Broker A", &records).unwrap();
        assert_eq!(report.trades_inserted, 3);
        assert_eq!(report.new_brokers, 1);
        assert_eq!(report.new_accounts, 2);
        assert_eq!(report.new_products, 1);
        assert_eq!(report.new_currencies, 1);

        let stored = store.trades().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[1].side.as_deref(), Some("SELL"));
        assert_eq!(stored[1].quantity, Some(dec!(-2.5)));
        assert_eq!(stored[1].delivery_month.as_deref(), Some("2025-06"));
        assert_eq!(stored[1].trade_date.as_deref(), Some("2025-04-03"));
        assert_eq!(stored[2].account_number, "ACC2");
    }

    #[test]
    fn test_dimensions_reused_across_loads() {
        let mut store = PositionStore::open_in_memory().unwrap();
        let records = vec![make_record(0, "ACC1", Some("BRN"), Side::Buy, dec!(10))];

        store.load("Broker A", &records).unwrap();
        let second = store.load("Broker A", &records).unwrap();

        assert_eq!(second.trades_inserted, 1);
        assert_eq!(second.new_brokers, 0);
        assert_eq!(second.new_accounts, 0);
        assert_eq!(second.new_products, 0);
        assert_eq!(store.trade_count().unwrap(), 2);
    }

    #[test]
    fn test_product_resolved_by_name_without_code() {
        let mut store = PositionStore::open_in_memory().unwrap();
        let records = vec![
            make_record(0, "ACC1", None, Side::Buy, dec!(1)),
            make_record(1, "ACC1", None, Side::Buy, dec!(2)),
        ];

        let report = store.load("Broker A", &records).unwrap();
        assert_eq!(report.new_products, 1);

        let stored = store.trades().unwrap();
        assert_eq!(stored[0].product_code, None);
        assert_eq!(stored[1].product_name, "Brent Crude");
    }

    #[test]
    fn test_missing_account_rejects_whole_batch() {
        let mut store = PositionStore::open_in_memory().unwrap();
        let records = vec![
            make_record(0, "ACC1", Some("BRN"), Side::Buy, dec!(1)),
            make_record(1, "", Some("BRN"), Side::Buy, dec!(1)),
        ];

        let err = store.load("Broker A", &records).unwrap_err();
        assert!(matches!(
            err,
            Error::Unresolved { ref dimension, ref key } if dimension == "account" && key == "1"
        ));
        assert_eq!(store.trade_count().unwrap(), 0);
    }

    #[test]
    fn test_inconsistent_side_rejected() {
        let mut store = PositionStore::open_in_memory().unwrap();
        let records = vec![make_record(0, "ACC1", Some("BRN"), Side::Sell, dec!(5))];

        assert!(matches!(store.load("Broker A", &records), Err(Error::Data(_))));
        assert_eq!(store.trade_count().unwrap(), 0);
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = std::env::temp_dir().join(format!("positions-store-test-{}", std::process::id()));
        let path = dir.join("nested").join("trades.sqlite");

        let mut store = PositionStore::open(&path).unwrap();
        store
            .load("Broker A", &[make_record(0, "ACC1", Some("BRN"), Side::Buy, dec!(1))])
            .unwrap();
        drop(store);

        let reopened = PositionStore::open(&path).unwrap();
        assert_eq!(reopened.trade_count().unwrap(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
