//! Canonical data types for normalized broker positions.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a position record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Long / bought.
    Buy,
    /// Short / sold.
    Sell,
}

impl Side {
    /// Interpret a free-text side flag.
    ///
    /// Anything starting with `B` is a buy, anything starting with `S` is a
    /// sell (case-insensitive, surrounding whitespace ignored). Everything
    /// else is unresolved.
    pub fn from_flag(text: &str) -> Option<Side> {
        match text.trim().chars().next() {
            Some('B') | Some('b') => Some(Side::Buy),
            Some('S') | Some('s') => Some(Side::Sell),
            _ => None,
        }
    }

    /// Infer the side from the sign of a raw quantity.
    ///
    /// Negative is a sell; zero and positive are buys.
    pub fn from_signed(quantity: Decimal) -> Side {
        if quantity < Decimal::ZERO {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    /// Canonical text form, as stored.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply the canonical sign convention to a quantity.
///
/// The magnitude is taken as an absolute value first, then negated for
/// sells. Buys and unresolved sides stay non-negative, so a negative
/// quantity always carries `Side::Sell`.
pub fn signed_quantity(magnitude: Decimal, side: Option<Side>) -> Decimal {
    let magnitude = magnitude.abs();
    if magnitude.is_zero() {
        return Decimal::ZERO;
    }
    match side {
        Some(Side::Sell) => -magnitude,
        _ => magnitude,
    }
}

/// Calendar month a contract delivers in, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeliveryMonth {
    year: i32,
    month: u32,
}

impl DeliveryMonth {
    /// Create a delivery month, rejecting months outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (0..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// Decode a four digit `YYMM` code (`"2504"` is April 2025).
    ///
    /// Years are always taken in the 2000s.
    pub fn from_yymm(code: &str) -> Option<Self> {
        if code.len() != 4 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let yy: i32 = code[..2].parse().ok()?;
        let mm: u32 = code[2..].parse().ok()?;
        Self::new(2000 + yy, mm)
    }

    /// Delivery month containing the given date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for DeliveryMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for DeliveryMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(format!("expected YYYY-MM, got '{s}'"));
        }
        let year = year.parse().map_err(|_| format!("bad year in '{s}'"))?;
        let month = month.parse().map_err(|_| format!("bad month in '{s}'"))?;
        DeliveryMonth::new(year, month).ok_or_else(|| format!("month out of range in '{s}'"))
    }
}

impl TryFrom<String> for DeliveryMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeliveryMonth> for String {
    fn from(value: DeliveryMonth) -> Self {
        value.to_string()
    }
}

/// One normalized position record, the unit handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTrade {
    /// Broker natural key (file value or source default).
    pub broker_code: String,
    /// Row position within the load batch; unique per batch only.
    pub external_trade_id: String,
    /// Client / ledger account.
    pub account_number: String,
    /// Product display name.
    pub product_name: String,
    /// Product identifier, when the source has one.
    pub product_code: Option<String>,
    pub trade_date: Option<NaiveDate>,
    pub delivery_month: Option<DeliveryMonth>,
    pub side: Option<Side>,
    /// Signed quantity: negative for sells.
    pub quantity: Option<Decimal>,
    pub trade_price: Option<Decimal>,
    pub market_price: Option<Decimal>,
    pub variation_margin: Option<Decimal>,
    /// ISO currency code, uppercased.
    pub currency_code: String,
    /// Snapshot date the position is valid for.
    pub as_of_date: Option<NaiveDate>,
}

impl CanonicalTrade {
    /// Check that quantity sign and side agree.
    ///
    /// A sell requires a negative quantity and a negative quantity requires
    /// a sell. A zero quantity is a buy or has no side.
    pub fn is_side_consistent(&self) -> bool {
        match (self.side, self.quantity) {
            (_, None) => true,
            (Some(Side::Sell), Some(q)) => q < Decimal::ZERO,
            (Some(Side::Buy), Some(q)) | (None, Some(q)) => q >= Decimal::ZERO,
        }
    }
}
