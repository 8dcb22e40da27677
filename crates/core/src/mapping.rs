//! Declarative per-broker field mapping.
//!
//! A [`FieldMapping`] binds each canonical field to where its value comes
//! from in a broker extract: a named column, a constant, nothing at all, or
//! a bespoke derivation the normalizer for that source performs itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The canonical fields a mapping must bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    AccountNumber,
    ProductName,
    ProductCode,
    TradeDate,
    DeliveryDate,
    Side,
    Quantity,
    TradePrice,
    MarketPrice,
    VariationMargin,
    Currency,
    AsOfDate,
    BrokerCode,
}

impl CanonicalField {
    /// Every canonical field, in declaration order.
    pub const ALL: [CanonicalField; 13] = [
        CanonicalField::AccountNumber,
        CanonicalField::ProductName,
        CanonicalField::ProductCode,
        CanonicalField::TradeDate,
        CanonicalField::DeliveryDate,
        CanonicalField::Side,
        CanonicalField::Quantity,
        CanonicalField::TradePrice,
        CanonicalField::MarketPrice,
        CanonicalField::VariationMargin,
        CanonicalField::Currency,
        CanonicalField::AsOfDate,
        CanonicalField::BrokerCode,
    ];

    /// Field name as used in mapping declarations.
    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::AccountNumber => "account_number",
            CanonicalField::ProductName => "product_name",
            CanonicalField::ProductCode => "product_code",
            CanonicalField::TradeDate => "trade_date",
            CanonicalField::DeliveryDate => "delivery_date",
            CanonicalField::Side => "side",
            CanonicalField::Quantity => "quantity",
            CanonicalField::TradePrice => "trade_price",
            CanonicalField::MarketPrice => "market_price",
            CanonicalField::VariationMargin => "variation_margin",
            CanonicalField::Currency => "currency",
            CanonicalField::AsOfDate => "as_of_date",
            CanonicalField::BrokerCode => "broker_code",
        }
    }

    /// Whether a load must fail when this field's source column is missing.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            CanonicalField::AccountNumber
                | CanonicalField::ProductName
                | CanonicalField::TradeDate
                | CanonicalField::Side
                | CanonicalField::Quantity
                | CanonicalField::Currency
                | CanonicalField::AsOfDate
        )
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a canonical field's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// Read from the named source column.
    Column(String),
    /// Same value for every row.
    Constant(String),
    /// The source has no such field.
    Absent,
    /// Computed by a source-specific procedure instead of a column lookup.
    Derived,
}

impl FieldSource {
    /// Shorthand for [`FieldSource::Column`].
    pub fn column(name: impl Into<String>) -> Self {
        FieldSource::Column(name.into())
    }

    /// Shorthand for [`FieldSource::Constant`].
    pub fn constant(value: impl Into<String>) -> Self {
        FieldSource::Constant(value.into())
    }

    /// Column name, if this source is a column.
    pub fn column_name(&self) -> Option<&str> {
        match self {
            FieldSource::Column(name) => Some(name),
            _ => None,
        }
    }
}

/// Binding of all 13 canonical fields for one broker source.
///
/// Every field must be declared; JSON declarations with missing or unknown
/// keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldMapping {
    pub account_number: FieldSource,
    pub product_name: FieldSource,
    pub product_code: FieldSource,
    pub trade_date: FieldSource,
    pub delivery_date: FieldSource,
    pub side: FieldSource,
    pub quantity: FieldSource,
    pub trade_price: FieldSource,
    pub market_price: FieldSource,
    pub variation_margin: FieldSource,
    pub currency: FieldSource,
    pub as_of_date: FieldSource,
    pub broker_code: FieldSource,
}

impl FieldMapping {
    /// Look up the binding for a field.
    pub fn get(&self, field: CanonicalField) -> &FieldSource {
        match field {
            CanonicalField::AccountNumber => &self.account_number,
            CanonicalField::ProductName => &self.product_name,
            CanonicalField::ProductCode => &self.product_code,
            CanonicalField::TradeDate => &self.trade_date,
            CanonicalField::DeliveryDate => &self.delivery_date,
            CanonicalField::Side => &self.side,
            CanonicalField::Quantity => &self.quantity,
            CanonicalField::TradePrice => &self.trade_price,
            CanonicalField::MarketPrice => &self.market_price,
            CanonicalField::VariationMargin => &self.variation_margin,
            CanonicalField::Currency => &self.currency,
            CanonicalField::AsOfDate => &self.as_of_date,
            CanonicalField::BrokerCode => &self.broker_code,
        }
    }

    /// Fields bound to [`FieldSource::Derived`].
    pub fn derived_fields(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|f| *self.get(*f) == FieldSource::Derived)
            .collect()
    }

    /// Broker A open-positions extract.
    ///
    /// Carries an explicit side flag, a broker code column and `YYMM`
    /// delivery codes.
    pub fn broker_a() -> Self {
        Self {
            account_number: FieldSource::column("Client Code"),
            product_name: FieldSource::column("Commodity Name"),
            product_code: FieldSource::column("Commodity Code"),
            trade_date: FieldSource::column("Trade Date"),
            delivery_date: FieldSource::column("Delivery Month/Year"),
            side: FieldSource::column("Bought or Sold"),
            quantity: FieldSource::column("Quantity"),
            trade_price: FieldSource::column("Trade Price"),
            market_price: FieldSource::column("Current Price"),
            variation_margin: FieldSource::column("Variation Margin Amount"),
            currency: FieldSource::column("Transaction Currency"),
            as_of_date: FieldSource::column("Input Date"),
            broker_code: FieldSource::column("Broker Code"),
        }
    }

    /// Broker B open-positions extract.
    ///
    /// No side column (the volume is signed) and no broker code column; the
    /// delivery column holds a full prompt date rather than a code.
    pub fn broker_b() -> Self {
        Self {
            account_number: FieldSource::column("Ledger Code"),
            product_name: FieldSource::column("Instrument Long Name"),
            product_code: FieldSource::column("Instrument Code"),
            trade_date: FieldSource::column("Trade Date"),
            delivery_date: FieldSource::column("Delivery/Prompt date"),
            side: FieldSource::Derived,
            quantity: FieldSource::column("Volume"),
            trade_price: FieldSource::column("Price"),
            market_price: FieldSource::column("Market Rate"),
            variation_margin: FieldSource::column("Variation Margin"),
            currency: FieldSource::column("Currency Code"),
            as_of_date: FieldSource::column("Open position date"),
            broker_code: FieldSource::constant("BKB"),
        }
    }
}
