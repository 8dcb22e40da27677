//! Normalization for sources with a signed volume and no side column.
//!
//! The side is inferred from the sign of the raw volume, the delivery month
//! comes from a full prompt date rather than a `YYMM` code, and the broker
//! code is fixed for the source. Dates are read cell by cell with the
//! source's primary order and retried with the alternate order.

use crate::binding::{resolve, Binding};
use crate::coerce::{parse_date, parse_decimal};
use crate::normalizer::{coerce, non_empty, text_or_empty};
use crate::raw_table::RawTable;
use crate::strategy::{Normalize, NormalizeStats, NormalizedBatch};
use positions_core::{
    signed_quantity, CanonicalField, CanonicalTrade, DatePolicy, DeliveryMonth, Error,
    FieldMapping, FieldSource, Result, Side,
};
use tracing::debug;

/// Normalizer for signed-volume sources.
#[derive(Debug, Clone)]
pub struct SignedVolumeNormalizer {
    /// Broker code stamped on every record.
    broker_code: String,
    /// Column locations; `side` must be derived.
    mapping: FieldMapping,
    dates: DatePolicy,
}

struct Bindings<'a> {
    account_number: Binding<'a>,
    product_name: Binding<'a>,
    product_code: Binding<'a>,
    trade_date: Binding<'a>,
    delivery_date: Binding<'a>,
    quantity: Binding<'a>,
    trade_price: Binding<'a>,
    market_price: Binding<'a>,
    variation_margin: Binding<'a>,
    currency: Binding<'a>,
    as_of_date: Binding<'a>,
}

impl SignedVolumeNormalizer {
    /// Create a normalizer with month-first, then day-first date reading.
    pub fn new(broker_code: impl Into<String>, mapping: FieldMapping) -> Self {
        Self {
            broker_code: broker_code.into(),
            mapping,
            dates: DatePolicy::month_first(),
        }
    }

    /// Override the date reading convention.
    pub fn with_date_policy(mut self, dates: DatePolicy) -> Self {
        self.dates = dates;
        self
    }

    fn bind<'a>(&'a self, table: &RawTable) -> Result<Bindings<'a>> {
        if self.mapping.side != FieldSource::Derived {
            return Err(Error::config(format!(
                "signed-volume source '{}' must map side as derived",
                self.broker_code
            )));
        }
        let field = |f: CanonicalField| resolve(&self.mapping, f, table);

        Ok(Bindings {
            account_number: field(CanonicalField::AccountNumber)?,
            product_name: field(CanonicalField::ProductName)?,
            product_code: field(CanonicalField::ProductCode)?,
            trade_date: field(CanonicalField::TradeDate)?,
            delivery_date: field(CanonicalField::DeliveryDate)?,
            quantity: field(CanonicalField::Quantity)?,
            trade_price: field(CanonicalField::TradePrice)?,
            market_price: field(CanonicalField::MarketPrice)?,
            variation_margin: field(CanonicalField::VariationMargin)?,
            currency: field(CanonicalField::Currency)?,
            as_of_date: field(CanonicalField::AsOfDate)?,
        })
    }

    fn normalize_row(
        &self,
        b: &Bindings<'_>,
        table: &RawTable,
        row: usize,
        stats: &mut NormalizeStats,
    ) -> CanonicalTrade {
        let raw_volume = coerce(
            b.quantity.text(table, row),
            parse_decimal,
            &mut stats.unparsed_numbers,
        );
        let side = raw_volume.map(Side::from_signed).unwrap_or(Side::Buy);
        let date = |binding: &Binding<'_>, misses: &mut u64| {
            coerce(binding.text(table, row), |t| parse_date(t, &self.dates), misses)
        };

        CanonicalTrade {
            broker_code: self.broker_code.clone(),
            external_trade_id: row.to_string(),
            account_number: text_or_empty(b.account_number.text(table, row)),
            product_name: text_or_empty(b.product_name.text(table, row)),
            product_code: non_empty(b.product_code.text(table, row)),
            trade_date: date(&b.trade_date, &mut stats.unparsed_dates),
            delivery_month: date(&b.delivery_date, &mut stats.unparsed_delivery)
                .map(DeliveryMonth::from_date),
            side: Some(side),
            quantity: raw_volume.map(|v| signed_quantity(v, Some(side))),
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
            as_of_date: date(&b.as_of_date, &mut stats.unparsed_dates),
        }
    }
}

impl Normalize for SignedVolumeNormalizer {
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
            broker = %self.broker_code,
            rows = stats.rows,
            misses = stats.coercion_misses(),
            "normalized signed-volume batch"
        );

        Ok(NormalizedBatch { records, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    const HEADERS: [&str; 11] = [
        "Ledger Code", "Instrument Long Name", "Instrument Code", "Trade Date",
        "Delivery/Prompt date", "Volume", "Price", "Market Rate",
        "Variation Margin", "Currency Code", "Open position date",
    ];

    fn make_row(volume: &str, trade_date: &str, prompt: &str, as_of: &str) -> Vec<String> {
        [
            "LEDGER-9", "ICE Gasoil", "GO", trade_date, prompt, volume, "701.25",
            "705", "-752.5", " eur", as_of,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn make_table(rows: Vec<Vec<String>>) -> RawTable {
        RawTable::new(HEADERS, rows)
    }

    fn make_normalizer() -> SignedVolumeNormalizer {
        SignedVolumeNormalizer::new("BKB", FieldMapping::broker_b())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_negative_volume_is_sell() {
        let table = make_table(vec![make_row("-150.5", "04/03/2025", "06/01/2025", "04/30/2025")]);
        let batch = make_normalizer().normalize(&table).unwrap();

        let r = &batch.records[0];
        assert_eq!(r.side, Some(Side::Sell));
        assert_eq!(r.quantity, Some(dec!(-150.5)));
        assert_eq!(r.broker_code, "BKB");
        assert_eq!(r.currency_code, "EUR");
        assert_eq!(r.product_code.as_deref(), Some("GO"));
        assert_eq!(r.variation_margin, Some(dec!(-752.5)));
    }

    #[test]
    fn test_zero_and_positive_volume_are_buys() {
        let table = make_table(vec![
            make_row("0", "04/03/2025", "06/01/2025", "04/30/2025"),
            make_row("1,250", "04/03/2025", "06/01/2025", "04/30/2025"),
        ]);
        let batch = make_normalizer().normalize(&table).unwrap();

        assert_eq!(batch.records[0].side, Some(Side::Buy));
        assert_eq!(batch.records[0].quantity, Some(dec!(0)));
        assert_eq!(batch.records[1].side, Some(Side::Buy));
        assert_eq!(batch.records[1].quantity, Some(dec!(1250)));
    }

    #[test]
    fn test_unparseable_volume_keeps_buy_without_quantity() {
        let table = make_table(vec![make_row("n/a", "04/03/2025", "06/01/2025", "04/30/2025")]);
        let batch = make_normalizer().normalize(&table).unwrap();

        assert_eq!(batch.records[0].side, Some(Side::Buy));
        assert_eq!(batch.records[0].quantity, None);
        assert_eq!(batch.stats.unparsed_numbers, 1);
    }

    #[test]
    fn test_dates_fall_back_per_cell() {
        // Trade date only reads day-first; as-of date reads month-first.
        let table = make_table(vec![make_row("5", "25/03/2025", "06/01/2025", "04/30/2025")]);
        let batch = make_normalizer().normalize(&table).unwrap();

        let r = &batch.records[0];
        assert_eq!(r.trade_date, Some(date(2025, 3, 25)));
        assert_eq!(r.as_of_date, Some(date(2025, 4, 30)));
    }

    #[test]
    fn test_ambiguous_date_uses_primary_order() {
        let table = make_table(vec![make_row("5", "04/03/2025", "06/01/2025", "04/30/2025")]);
        let batch = make_normalizer().normalize(&table).unwrap();
        assert_eq!(batch.records[0].trade_date, Some(date(2025, 4, 3)));

        let day_first = make_normalizer().with_date_policy(DatePolicy::day_first());
        let batch = day_first.normalize(&table).unwrap();
        assert_eq!(batch.records[0].trade_date, Some(date(2025, 3, 4)));
    }

    #[test]
    fn test_delivery_month_from_prompt_date() {
        let table = make_table(vec![
            make_row("5", "04/03/2025", "06/01/2025", "04/30/2025"),
            make_row("5", "04/03/2025", "28/07/2025", "04/30/2025"),
            make_row("5", "04/03/2025", "2506", "04/30/2025"),
        ]);
        let batch = make_normalizer().normalize(&table).unwrap();

        let months: Vec<Option<String>> = batch
            .records
            .iter()
            .map(|r| r.delivery_month.map(|m| m.to_string()))
            .collect();
        assert_eq!(months, vec![Some("2025-06".to_string()), Some("2025-07".to_string()), None]);
        assert_eq!(batch.stats.unparsed_delivery, 1);
    }

    #[test]
    fn test_missing_required_column() {
        let headers: Vec<&str> = HEADERS.iter().copied().filter(|h| *h != "Volume").collect();
        let table = RawTable::new(headers, Vec::<Vec<String>>::new());

        let err = make_normalizer().normalize(&table).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "Volume"));
    }

    #[test]
    fn test_side_must_be_derived() {
        let table = make_table(vec![make_row("5", "04/03/2025", "06/01/2025", "04/30/2025")]);
        let normalizer = SignedVolumeNormalizer::new("BKB", FieldMapping::broker_a());
        assert!(normalizer.normalize(&table).unwrap_err().is_config());
    }

    #[test]
    fn test_broker_code_is_fixed() {
        let mut mapping = FieldMapping::broker_b();
        mapping.broker_code = FieldSource::column("Ledger Code");
        let table = make_table(vec![make_row("5", "04/03/2025", "06/01/2025", "04/30/2025")]);

        let batch = SignedVolumeNormalizer::new("BKB", mapping).normalize(&table).unwrap();
        assert_eq!(batch.records[0].broker_code, "BKB");
        assert_eq!(batch.stats.defaulted_broker_codes, 0);
    }
}
