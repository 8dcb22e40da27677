//! Configuration structures for the position loader.

use crate::error::{Error, Result};
use crate::mapping::{FieldMapping, FieldSource};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Main configuration: where to store and which sources to load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Broker sources, loaded in order.
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            sources: vec![SourceConfig::broker_a(), SourceConfig::broker_b()],
        }
    }
}

impl Config {
    /// Read a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Find a source by its broker code.
    pub fn source(&self, code: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.code == code)
    }

    /// Check source codes and strategy/mapping agreement.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !seen.insert(source.code.as_str()) {
                return Err(Error::config(format!("duplicate source code '{}'", source.code)));
            }
        }
        Ok(())
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db/etrm.sqlite"),
        }
    }
}

/// Order in which the first two numeric parts of a date are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    /// `25/04/2025`
    DayFirst,
    /// `04/25/2025`
    MonthFirst,
}

/// Per-source date reading convention.
///
/// Each cell is tried with `primary` first, then with `fallback` if that
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatePolicy {
    pub primary: DateOrder,
    #[serde(default)]
    pub fallback: Option<DateOrder>,
}

impl DatePolicy {
    /// Day-first with a month-first retry (mapped sources).
    pub fn day_first() -> Self {
        Self {
            primary: DateOrder::DayFirst,
            fallback: Some(DateOrder::MonthFirst),
        }
    }

    /// Month-first with a day-first retry (signed-volume sources).
    pub fn month_first() -> Self {
        Self {
            primary: DateOrder::MonthFirst,
            fallback: Some(DateOrder::DayFirst),
        }
    }

    /// Orders to attempt, in sequence.
    pub fn orders(&self) -> impl Iterator<Item = DateOrder> {
        std::iter::once(self.primary).chain(self.fallback.filter(|f| *f != self.primary))
    }
}

impl Default for DatePolicy {
    fn default() -> Self {
        Self::day_first()
    }
}

/// How a source's rows become canonical records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Driven entirely by the field mapping.
    Mapped,
    /// Side inferred from the sign of the quantity; delivery month from a
    /// real date; fixed broker code.
    SignedVolume,
}

/// One broker source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Broker code used as the default (mapped) or fixed (signed volume)
    /// broker natural key.
    pub code: String,
    /// Broker display name for the broker dimension row.
    pub name: String,
    /// Extract file to load.
    pub file: PathBuf,
    /// Normalization strategy.
    pub strategy: StrategyKind,
    /// Field mapping.
    pub mapping: FieldMapping,
    /// Date reading convention.
    #[serde(default)]
    pub dates: DatePolicy,
}

impl SourceConfig {
    /// Broker A: mapped, day-first dates.
    pub fn broker_a() -> Self {
        Self {
            code: "BKA".to_string(),
            name: "Broker A".to_string(),
            file: PathBuf::from("Broker A Open Positions.csv"),
            strategy: StrategyKind::Mapped,
            mapping: FieldMapping::broker_a(),
            dates: DatePolicy::day_first(),
        }
    }

    /// Broker B: signed volume, month-first dates with day-first retry.
    pub fn broker_b() -> Self {
        Self {
            code: "BKB".to_string(),
            name: "Broker B".to_string(),
            file: PathBuf::from("Broker B Open Positions.csv"),
            strategy: StrategyKind::SignedVolume,
            mapping: FieldMapping::broker_b(),
            dates: DatePolicy::month_first(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(Error::config(format!("source '{}' has an empty code", self.name)));
        }
        let derived = self.mapping.derived_fields();
        match self.strategy {
            StrategyKind::Mapped if !derived.is_empty() => Err(Error::config(format!(
                "source '{}' is mapped but derives {:?}; use a bespoke strategy",
                self.code,
                derived.iter().map(|f| f.name()).collect::<Vec<_>>()
            ))),
            StrategyKind::SignedVolume if self.mapping.side != FieldSource::Derived => {
                Err(Error::config(format!(
                    "source '{}' infers side from volume sign; map side as derived",
                    self.code
                )))
            }
            _ => Ok(()),
        }
    }
}
