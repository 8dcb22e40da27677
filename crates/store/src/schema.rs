//! Trade store schema.
//!
//! Dimension tables are keyed by natural key with surrogate ids; the
//! `trades` fact table is append-only. Decimals are stored as text so no
//! precision is lost.

pub(crate) const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS brokers (
    broker_id INTEGER PRIMARY KEY AUTOINCREMENT,
    broker_code TEXT NOT NULL UNIQUE,
    broker_name TEXT
);

CREATE TABLE IF NOT EXISTS accounts (
    account_id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_number TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS products (
    product_id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_code TEXT UNIQUE,
    product_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS currencies (
    currency_code TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS trades (
    trade_id INTEGER PRIMARY KEY AUTOINCREMENT,
    broker_id INTEGER NOT NULL REFERENCES brokers(broker_id),
    external_trade_id TEXT NOT NULL,
    account_id INTEGER NOT NULL REFERENCES accounts(account_id),
    product_id INTEGER NOT NULL REFERENCES products(product_id),
    trade_date TEXT,
    delivery_month TEXT,
    side TEXT CHECK (side IN ('BUY', 'SELL')),
    quantity TEXT,
    trade_price TEXT,
    market_price TEXT,
    variation_margin TEXT,
    currency_code TEXT NOT NULL REFERENCES currencies(currency_code),
    as_of_date TEXT,
    loaded_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_trades_broker_asof
    ON trades(broker_id, as_of_date);
"#;
