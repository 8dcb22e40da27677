//! Persistence for normalized broker positions.
//!
//! This crate provides:
//! - The SQLite schema (dimension tables plus an append-only trades table)
//! - Dimension upsert and surrogate key resolution by natural key
//! - All-or-nothing batch loads that refuse incomplete records

mod schema;
pub mod store;

pub use store::{LoadReport, PositionStore, StoredTrade};
