//! Text-typed tabular input.
//!
//! Broker extracts arrive as CSV with every cell treated as text. Headers
//! and cells are trimmed on construction, so nothing downstream has to care
//! about stray padding.

use positions_core::{CanonicalField, Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// A raw record set: trimmed headers plus rows of trimmed text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a table, trimming every header and cell.
    pub fn new<H, R, C>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let headers = headers.into_iter().map(|h| h.as_ref().trim().to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|c| c.as_ref().trim().to_string()).collect())
            .collect();
        Self { headers, rows }
    }

    /// Read CSV text with a header row.
    ///
    /// Rows may be shorter or longer than the header; missing cells read
    /// as empty text.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(|e| Error::data(format!("failed to read CSV header: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record
                .map_err(|e| Error::data(format!("failed to read CSV row {}: {e}", line + 1)))?;
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        Ok(Self::new(headers, rows))
    }

    /// Open and read a CSV file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(file).map_err(|e| match e {
            Error::Data(msg) => Error::data(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Column names, trimmed.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by exact (trimmed) name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers.iter().position(|h| h == name)
    }

    /// Index of a column a mapping requires, or a configuration error that
    /// names the column and lists what is available.
    pub fn require_column(&self, field: CanonicalField, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::missing_column(field.name(), name, &self.headers))
    }

    /// Cell text; empty when the row is short.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}
