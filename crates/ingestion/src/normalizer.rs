//! Mapping-driven normalization.
//!
//! Reads every canonical field through the source's [`FieldMapping`] and
//! applies the generic cleaning rules: thousands separators stripped from
//! numbers, dates read through the source's [`DatePolicy`], `YYMM` delivery
//! codes, free-text side flags and uppercased currencies.

use crate::binding::{resolve, Binding};
use crate::coerce::{parse_date, parse_decimal, parse_delivery_code};
use crate::raw_table::RawTable;
use crate::strategy::{Normalize, NormalizeStats, NormalizedBatch};
use positions_core::{
    signed_quantity, CanonicalField, CanonicalTrade, DatePolicy, FieldMapping, Result, Side,
};
use tracing::debug;

/// Normalizer for sources fully described by a field mapping.
#[derive(Debug, Clone)]
pub struct MappedNormalizer {
    /// Broker code used when the row carries none.
    default_broker_code: String,
    mapping: FieldMapping,
    dates: DatePolicy,
}

/// Resolved bindings for every field the generic path reads.
struct Bindings<'a> {
    broker_code: Binding<'a>,
    account_number: Binding<'a>,
    product_name: Binding<'a>,
    product_code: Binding<'a>,
    trade_date: Binding<'a>,
    delivery_date: Binding<'a>,
    side: Binding<'a>,
    quantity: Binding<'a>,
    trade_price: Binding<'a>,
    market_price: Binding<'a>,
    variation_margin: Binding<'a>,
    currency: Binding<'a>,
    as_of_date: Binding<'a>,
}

impl MappedNormalizer {
    /// Create a normalizer with day-first date reading.
    pub fn new(default_broker_code: impl Into<String>, mapping: FieldMapping) -> Self {
        Self {
            default_broker_code: default_broker_code.into(),
            mapping,
            dates: DatePolicy::day_first(),
        }
    }

    /// Override the date reading convention.
    pub fn with_date_policy(mut self, dates: DatePolicy) -> Self {
        self.dates = dates;
        self
    }

    fn bind<'a>(&'a self, table: &RawTable) -> Result<Bindings<'a>> {
        Ok(Bindings {
            broker_code: resolve(&self.mapping, CanonicalField::BrokerCode, table)?,
            account_number: resolve(&self.mapping, CanonicalField::AccountNumber, table)?,
            product_name: resolve(&self.mapping, CanonicalField::ProductName, table)?,
            product_code: resolve(&self.mapping, CanonicalField::ProductCode, table)?,
            trade_date: resolve(&self.mapping, CanonicalField::TradeDate, table)?,
            delivery_date: resolve(&self.mapping, CanonicalField::DeliveryDate, table)?,
            side: resolve(&self.mapping, CanonicalField::Side, table)?,
            quantity: resolve(&self.mapping, CanonicalField::Quantity, table)?,
            trade_price: resolve(&self.mapping, CanonicalField::TradePrice, table)?,
            market_price: resolve(&self.mapping, CanonicalField::MarketPrice, table)?,
            variation_margin: resolve(&self.mapping, CanonicalField::VariationMargin, table)?,
            currency: resolve(&self.mapping, CanonicalField::Currency, table)?,
            as_of_date: resolve(&self.mapping, CanonicalField::AsOfDate, table)?,
        })
    }

    fn normalize_row(
        &self,
        b: &Bindings<'_>,
        table: &RawTable,
        row: usize,
        stats: &mut NormalizeStats,
    ) -> CanonicalTrade {
        let broker_code = match b.broker_code.text(table, row) {
            Some(code) if !code.is_empty() => code.to_string(),
            _ => {
                stats.defaulted_broker_codes += 1;
                self.default_broker_code.clone()
            }
        };

        let flag = coerce(
            b.side.text(table, row),
            Side::from_flag,
            &mut stats.unresolved_sides,
        );
        let quantity = coerce(
            b.quantity.text(table, row),
            parse_decimal,
            &mut stats.unparsed_numbers,
        )
        .map(|magnitude| signed_quantity(magnitude, flag));
        // A flat position carries no direction.
        let side = match quantity {
            Some(q) if q.is_zero() => None,
            _ => flag,
        };

        CanonicalTrade {
            broker_code,
            external_trade_id: row.to_string(),
            account_number: text_or_empty(b.account_number.text(table, row)),
            product_name: text_or_empty(b.product_name.text(table, row)),
            product_code: non_empty(b.product_code.text(table, row)),
            trade_date: coerce(
                b.trade_date.text(table, row),
                |t| parse_date(t, &self.dates),
                &mut stats.unparsed_dates,
            ),
            delivery_month: coerce(
                b.delivery_date.text(table, row),
                parse_delivery_code,
                &mut stats.unparsed_delivery,
            ),
            side,
            quantity,
            trade_price: coerce(
                b.trade_price.text(table, row),
                parse_decimal,
                &mut stats.unparsed_numbers,
            ),
            market_price: coerce(
                b.market_price.text(table, row),
                parse_decimal,
                &mut stats.unparsed_numbers,
            ),
            variation_margin: coerce(
                b.variation_margin.text(table, row),
                parse_decimal,
                &mut stats.unparsed_numbers,
            ),
            currency_code: text_or_empty(b.currency.text(table, row)).to_uppercase(),
            as_of_date: coerce(
                b.as_of_date.text(table, row),
                |t| parse_date(t, &self.dates),
                &mut stats.unparsed_dates,
            ),
        }
    }
}

impl Normalize for MappedNormalizer {
    fn normalize(&self, table: &RawTable) -> Result<NormalizedBatch> {
        let bindings = self.bind(table)?;
        let mut stats = NormalizeStats::default();

        let records = (0..table.len())
            .map(|row| {
                stats.rows += 1;
                self.normalize_row(&bindings, table, row, &mut stats)
            })
            .collect();

        debug!(
            broker = %self.default_broker_code,
            rows = stats.rows,
            misses = stats.coercion_misses(),
            "normalized mapped batch"
        );

        Ok(NormalizedBatch { records, stats })
    }
}

/// Normalize raw rows with a mapping and a default broker code.
pub fn normalize(
    table: &RawTable,
    default_broker_code: &str,
    mapping: &FieldMapping,
) -> Result<Vec<CanonicalTrade>> {
    MappedNormalizer::new(default_broker_code, mapping.clone())
        .normalize(table)
        .map(|batch| batch.records)
}

/// Apply a parser to a cell, counting non-empty cells it rejects.
pub(crate) fn coerce<T>(
    text: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
    misses: &mut u64,
) -> Option<T> {
    let text = text?;
    if text.is_empty() {
        return None;
    }
    let value = parse(text);
    if value.is_none() {
        *misses += 1;
    }
    value
}

pub(crate) fn text_or_empty(text: Option<&str>) -> String {
    text.unwrap_or_default().to_string()
}

pub(crate) fn non_empty(text: Option<&str>) -> Option<String> {
    text.filter(|t| !t.is_empty()).map(str::to_string)
}
