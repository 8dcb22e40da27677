//! Core types and configuration for the broker position loader.
//!
//! This crate provides shared types used across all other crates:
//! - The canonical trade record and its side/quantity convention
//! - Per-broker field mapping declarations
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod mapping;
pub mod types;

pub use config::{Config, DateOrder, DatePolicy, SourceConfig, StrategyKind};
pub use error::{Error, Result};
pub use mapping::{CanonicalField, FieldMapping, FieldSource};
pub use types::*;
