//! Ingestion and normalization of broker position extracts.
//!
//! This crate handles:
//! - Reading text-typed extracts (trimmed headers and cells)
//! - Best-effort coercion of numbers, dates and delivery codes
//! - Mapping-driven normalization into canonical trade records
//! - Bespoke normalization for signed-volume sources

mod binding;
pub mod coerce;
pub mod normalizer;
pub mod raw_table;
pub mod signed_volume;
pub mod strategy;

pub use normalizer::{normalize, MappedNormalizer};
pub use raw_table::RawTable;
pub use signed_volume::SignedVolumeNormalizer;
pub use strategy::{Normalize, NormalizeStats, NormalizedBatch, SourceNormalizer};
