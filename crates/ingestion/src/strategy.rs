//! Per-source normalization strategies.
//!
//! Every source produces the same canonical output; what differs is how the
//! fields are derived. Sources declare their strategy in configuration and
//! the loader picks the matching [`SourceNormalizer`].

use crate::normalizer::MappedNormalizer;
use crate::raw_table::RawTable;
use crate::signed_volume::SignedVolumeNormalizer;
use positions_core::{CanonicalTrade, Result, SourceConfig, StrategyKind};

/// Statistics about coercion quality for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    /// Rows normalized.
    pub rows: u64,
    /// Non-empty date cells that could not be read.
    pub unparsed_dates: u64,
    /// Non-empty numeric cells that could not be read.
    pub unparsed_numbers: u64,
    /// Non-empty delivery cells that could not be read.
    pub unparsed_delivery: u64,
    /// Non-empty side flags that were neither buy nor sell.
    pub unresolved_sides: u64,
    /// Rows that took the source's default broker code.
    pub defaulted_broker_codes: u64,
}

impl NormalizeStats {
    /// Total cells that fell back to absent.
    pub fn coercion_misses(&self) -> u64 {
        self.unparsed_dates + self.unparsed_numbers + self.unparsed_delivery + self.unresolved_sides
    }
}

/// Canonical records for one batch plus what was lost on the way.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Records in input row order.
    pub records: Vec<CanonicalTrade>,
    /// Coercion statistics.
    pub stats: NormalizeStats,
}

/// A way of turning a raw table into canonical records.
///
/// Implementations hold no state between calls: the same table always
/// yields the same records.
pub trait Normalize {
    /// Normalize a whole batch, or fail it on a configuration error.
    fn normalize(&self, table: &RawTable) -> Result<NormalizedBatch>;
}

/// Strategy selected for a configured source.
#[derive(Debug, Clone)]
pub enum SourceNormalizer {
    /// Mapping-table driven.
    Mapped(MappedNormalizer),
    /// Side from volume sign, delivery month from a real date.
    SignedVolume(SignedVolumeNormalizer),
}

impl SourceNormalizer {
    /// Build the strategy a source declares.
    pub fn for_source(source: &SourceConfig) -> Self {
        match source.strategy {
            StrategyKind::Mapped => SourceNormalizer::Mapped(
                MappedNormalizer::new(source.code.clone(), source.mapping.clone())
                    .with_date_policy(source.dates),
            ),
            StrategyKind::SignedVolume => SourceNormalizer::SignedVolume(
                SignedVolumeNormalizer::new(source.code.clone(), source.mapping.clone())
                    .with_date_policy(source.dates),
            ),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            SourceNormalizer::Mapped(_) => StrategyKind::Mapped,
            SourceNormalizer::SignedVolume(_) => StrategyKind::SignedVolume,
        }
    }
}

impl Normalize for SourceNormalizer {
    fn normalize(&self, table: &RawTable) -> Result<NormalizedBatch> {
        match self {
            SourceNormalizer::Mapped(n) => n.normalize(table),
            SourceNormalizer::SignedVolume(n) => n.normalize(table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use positions_core::Side;
    use rust_decimal_macros::dec;

    fn make_broker_a_table() -> RawTable {
        RawTable::new(
            [
                "Client Code", "Commodity Name", "Commodity Code", "Trade Date",
                "Delivery Month/Year", "Bought or Sold", "Quantity", "Trade Price",
                "Current Price", "Variation Margin Amount", "Transaction Currency",
                "Input Date", "Broker Code",
            ],
            vec![
                vec![
                    "ACC1", "Brent", "BRN", "03/04/2025", "2506", "S", "10", "70.5", "71", "-5",
                    "usd", "30/04/2025", "",
                ],
                vec![
                    "ACC2", "WTI", "CL", "04/04/2025", "2507", "B", "5", "68", "67.5", "2.5",
                    "usd", "30/04/2025", "BKX",
                ],
                vec![
                    "ACC3", "WTI", "CL", "04/04/2025", "2507", "S", "0", "68", "67.5", "0",
                    "usd", "30/04/2025", "BKX",
                ],
            ],
        )
    }

    fn make_broker_b_table() -> RawTable {
        RawTable::new(
            [
                "Ledger Code", "Instrument Long Name", "Instrument Code", "Trade Date",
                "Delivery/Prompt date", "Volume", "Price", "Market Rate",
                "Variation Margin", "Currency Code", "Open position date",
            ],
            vec![
                vec![
                    "L1", "Gasoil", "GO", "04/03/2025", "06/01/2025", "-150.5", "700", "705",
                    "-752.5", "usd", "04/30/2025",
                ],
                vec![
                    "L2", "Gasoil", "GO", "25/03/2025", "07/01/2025", "20", "690", "705", "300",
                    "eur", "30/04/2025",
                ],
                vec![
                    "L3", "Gasoil", "GO", "25/03/2025", "07/01/2025", "0", "690", "705", "0",
                    "eur", "30/04/2025",
                ],
            ],
        )
    }

    #[test]
    fn test_for_source_selects_strategy() {
        let a = SourceNormalizer::for_source(&SourceConfig::broker_a());
        let b = SourceNormalizer::for_source(&SourceConfig::broker_b());
        assert_eq!(a.kind(), StrategyKind::Mapped);
        assert_eq!(b.kind(), StrategyKind::SignedVolume);
    }

    #[test]
    fn test_side_invariant_across_strategies() {
        let a = SourceNormalizer::for_source(&SourceConfig::broker_a())
            .normalize(&make_broker_a_table())
            .unwrap();
        let b = SourceNormalizer::for_source(&SourceConfig::broker_b())
            .normalize(&make_broker_b_table())
            .unwrap();

        for record in a.records.iter().chain(b.records.iter()) {
            assert!(record.is_side_consistent(), "inconsistent record: {record:?}");
            let is_sell = record.side == Some(Side::Sell);
            let is_negative = record.quantity.map_or(false, |q| q < dec!(0));
            assert_eq!(is_sell, is_negative);
        }
    }

    #[test]
    fn test_broker_codes_per_strategy() {
        let a = SourceNormalizer::for_source(&SourceConfig::broker_a())
            .normalize(&make_broker_a_table())
            .unwrap();
        assert_eq!(a.records[0].broker_code, "BKA");
        assert_eq!(a.records[1].broker_code, "BKX");
        assert_eq!(a.stats.defaulted_broker_codes, 1);

        let b = SourceNormalizer::for_source(&SourceConfig::broker_b())
            .normalize(&make_broker_b_table())
            .unwrap();
        assert!(b.records.iter().all(|r| r.broker_code == "BKB"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = SourceNormalizer::for_source(&SourceConfig::broker_b());
        let table = make_broker_b_table();
        let first = normalizer.normalize(&table).unwrap();
        let second = normalizer.normalize(&table).unwrap();
        assert_eq!(first.records, second.records);
        assert_eq!(first.stats, second.stats);
    }
}
