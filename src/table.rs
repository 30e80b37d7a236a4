//! Rectangular string tables for inventory data.
//!
//! A [`Table`] keeps an ordered column list and one `Option<String>` cell
//! per column per row. Every mutation preserves the rectangular invariant:
//! each row has exactly one cell for each column, null-filled where a
//! source never supplied a value.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a header row. Duplicate headers (after trim,
    /// case-insensitive) are kept under the first occurrence's name.
    pub fn with_columns<S: Into<String>>(columns: Vec<S>) -> Self {
        let mut table = Self::new();
        for col in columns {
            table.ensure_column(&col.into());
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let needle = name.trim().to_lowercase();
        self.columns
            .iter()
            .position(|c| c.trim().to_lowercase() == needle)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Add a column if absent, null-filling existing rows. Returns its index.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.trim().to_string());
        for row in &mut self.rows {
            row.push(None);
        }
        self.columns.len() - 1
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    pub fn set(&mut self, row: usize, column: &str, value: impl Into<String>) {
        let idx = self.ensure_column(column);
        if let Some(r) = self.rows.get_mut(row) {
            r[idx] = Some(value.into());
        }
    }

    /// Append an empty row and return its index.
    pub fn push_empty_row(&mut self) -> usize {
        self.rows.push(vec![None; self.columns.len()]);
        self.rows.len() - 1
    }

    /// Append a row given as (column, value) pairs, adding unseen columns.
    pub fn push_row(&mut self, cells: Vec<(String, Option<String>)>) {
        let idx = self.push_empty_row();
        for (column, value) in cells {
            let col = self.ensure_column(&column);
            self.rows[idx][col] = value;
        }
    }

    /// Append every row of `other`, taking the outer union of columns.
    /// `self` keeps its column order; unseen columns from `other` are added
    /// on the right and null-filled for prior rows.
    pub fn append(&mut self, other: &Table) {
        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|c| self.ensure_column(c))
            .collect();
        for row in &other.rows {
            let idx = self.push_empty_row();
            for (src, &dst) in row.iter().zip(&mapping) {
                self.rows[idx][dst] = src.clone();
            }
        }
    }

    /// Count non-null values of a column, ordered by value for stable
    /// iteration.
    pub fn value_counts(&self, column: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        let Some(idx) = self.column_index(column) else {
            return counts;
        };
        for row in &self.rows {
            if let Some(Some(value)) = row.get(idx) {
                if !value.trim().is_empty() {
                    *counts.entry(value.trim().to_string()).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Parse the first table of a CSV stream. The first record is the
    /// header; duplicate normalized headers collapse into the first
    /// occurrence (later duplicates' cells are dropped).
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let mut table = Table::new();
        // Per-source-column destination; None marks a dropped duplicate.
        let mut mapping: Vec<Option<usize>> = Vec::with_capacity(headers.len());
        for header in headers.iter() {
            if table.column_index(header).is_some() {
                mapping.push(None);
            } else {
                mapping.push(Some(table.ensure_column(header)));
            }
        }

        for record in csv_reader.records() {
            let record = record?;
            let idx = table.push_empty_row();
            for (pos, cell) in record.iter().enumerate() {
                if let Some(Some(dst)) = mapping.get(pos) {
                    if !cell.is_empty() {
                        table.rows[idx][*dst] = Some(cell.to_string());
                    }
                }
            }
        }
        Ok(table)
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::ParseFailed {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_csv_reader(file)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_csv_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }

    /// Iterate rows as index + cell accessor closure input.
    pub fn rows(&self) -> impl Iterator<Item = &Vec<Option<String>>> {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
Device ID,Device Name,RAM (GB)
D-1,web01,32
D-2,db01,128
";

    #[test]
    fn parses_csv_with_headers() {
        let table = Table::from_csv_reader(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(table.columns(), &["Device ID", "Device Name", "RAM (GB)"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(0, "Device Name"), Some("web01"));
        assert_eq!(table.get(1, "ram (gb)"), Some("128"));
    }

    #[test]
    fn duplicate_headers_first_occurrence_wins() {
        let csv_data = "Name,name,Value\nalpha,beta,1\n";
        let table = Table::from_csv_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(table.columns(), &["Name", "Value"]);
        assert_eq!(table.get(0, "Name"), Some("alpha"));
    }

    #[test]
    fn append_unions_columns() {
        let mut base = Table::with_columns(vec!["A", "B"]);
        base.push_row(vec![
            ("A".to_string(), Some("1".to_string())),
            ("B".to_string(), Some("2".to_string())),
        ]);

        let mut incoming = Table::with_columns(vec!["B", "C"]);
        incoming.push_row(vec![
            ("B".to_string(), Some("3".to_string())),
            ("C".to_string(), Some("4".to_string())),
        ]);

        base.append(&incoming);
        assert_eq!(base.columns(), &["A", "B", "C"]);
        assert_eq!(base.row_count(), 2);
        // Prior row null-filled for the new column.
        assert_eq!(base.get(0, "C"), None);
        assert_eq!(base.get(1, "A"), None);
        assert_eq!(base.get(1, "C"), Some("4"));
    }

    #[test]
    fn ensure_column_null_fills_existing_rows() {
        let mut table = Table::from_csv_reader(SAMPLE_CSV.as_bytes()).unwrap();
        table.ensure_column("Tier");
        assert_eq!(table.get(0, "Tier"), None);
        table.set(0, "Tier", "Advanced");
        assert_eq!(table.get(0, "Tier"), Some("Advanced"));
    }

    #[test]
    fn value_counts_skips_nulls_and_blanks() {
        let csv_data = "Status\nActive\n\nActive\nRetired\n";
        let table = Table::from_csv_reader(csv_data.as_bytes()).unwrap();
        let counts = table.value_counts("Status");
        assert_eq!(counts.get("Active"), Some(&2));
        assert_eq!(counts.get("Retired"), Some(&1));
    }

    #[test]
    fn csv_round_trip_preserves_shape() {
        let table = Table::from_csv_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        let reparsed = Table::from_csv_reader(out.as_slice()).unwrap();
        assert_eq!(reparsed, table);
    }
}
