//! Resolution of mapping entries against a concrete table.
//!
//! All bindings for a batch are resolved before any row is produced, so a
//! configuration error never leaves partial output behind.

use crate::raw_table::RawTable;
use positions_core::{CanonicalField, Error, FieldMapping, FieldSource, Result};
use tracing::warn;

/// A mapping entry resolved against the input columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Binding<'a> {
    Column(usize),
    Constant(&'a str),
    Absent,
}

impl<'a> Binding<'a> {
    /// Raw text for a row, or `None` when the field has no source.
    pub(crate) fn text<'s>(&'s self, table: &'s RawTable, row: usize) -> Option<&'s str> {
        match self {
            Binding::Column(idx) => Some(table.cell(row, *idx)),
            Binding::Constant(value) => Some(value.trim()),
            Binding::Absent => None,
        }
    }
}

/// Resolve one field of a mapping.
///
/// Required fields must point at an existing column or a constant. An
/// optional field whose column is missing from the input is treated as
/// absent for the whole batch.
pub(crate) fn resolve<'a>(
    mapping: &'a FieldMapping,
    field: CanonicalField,
    table: &RawTable,
) -> Result<Binding<'a>> {
    match mapping.get(field) {
        FieldSource::Column(name) if field.is_required() => {
            Ok(Binding::Column(table.require_column(field, name)?))
        }
        FieldSource::Column(name) => match table.column_index(name) {
            Some(idx) => Ok(Binding::Column(idx)),
            None => {
                warn!(
                    field = field.name(),
                    column = %name,
                    available = ?table.headers(),
                    "optional column missing from input, field will be absent"
                );
                Ok(Binding::Absent)
            }
        },
        FieldSource::Constant(value) => Ok(Binding::Constant(value)),
        FieldSource::Absent if field.is_required() => Err(Error::config(format!(
            "required field '{}' is mapped as absent",
            field.name()
        ))),
        FieldSource::Absent => Ok(Binding::Absent),
        FieldSource::Derived => Err(Error::config(format!(
            "field '{}' is derived and cannot be read from a column",
            field.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_table() -> RawTable {
        RawTable::new(["Client Code", "Quantity"], vec![vec!["ACC1", "10"]])
    }

    #[test]
    fn test_resolve_column_and_constant() {
        let table = make_table();
        let mut mapping = FieldMapping::broker_a();
        mapping.currency = FieldSource::constant(" usd ");

        let account = resolve(&mapping, CanonicalField::AccountNumber, &table).unwrap();
        assert_eq!(account, Binding::Column(0));
        assert_eq!(account.text(&table, 0), Some("ACC1"));

        let currency = resolve(&mapping, CanonicalField::Currency, &table).unwrap();
        assert_eq!(currency.text(&table, 0), Some("usd"));
    }

    #[test]
    fn test_missing_required_column() {
        let table = make_table();
        let mapping = FieldMapping::broker_a();
        let err = resolve(&mapping, CanonicalField::TradeDate, &table).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "Trade Date"));
    }

    #[test]
    fn test_missing_optional_column_is_absent() {
        let table = make_table();
        let mapping = FieldMapping::broker_a();
        let binding = resolve(&mapping, CanonicalField::MarketPrice, &table).unwrap();
        assert_eq!(binding, Binding::Absent);
        assert_eq!(binding.text(&table, 0), None);
    }

    #[test]
    fn test_required_absent_and_derived_rejected() {
        let table = make_table();
        let mut mapping = FieldMapping::broker_a();
        mapping.quantity = FieldSource::Absent;
        assert!(resolve(&mapping, CanonicalField::Quantity, &table).unwrap_err().is_config());

        let mapping = FieldMapping::broker_b();
        assert!(resolve(&mapping, CanonicalField::Side, &table).unwrap_err().is_config());
    }
}
