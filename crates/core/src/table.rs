//! Column-named string tables exchanged with the import and export layers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },
    #[error("Table '{table}' row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(name: &str, headers: Vec<String>) -> Self {
        Table {
            name: name.to_string(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Convenience constructor used by callers holding string literals.
    pub fn from_rows(name: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
        Table {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), TableError> {
        if row.len() != self.headers.len() {
            return Err(TableError::RaggedRow {
                table: self.name.clone(),
                row: self.rows.len(),
                expected: self.headers.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// A table with neither headers nor rows, as produced by an empty file.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column, matching headers after trimming whitespace and a
    /// UTF-8 byte-order mark.
    pub fn find_column(&self, column: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == column)
    }

    pub fn require_column(&self, column: &str) -> Result<usize, TableError> {
        self.find_column(column)
            .ok_or_else(|| TableError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Cell text, empty when the row is shorter than the header.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            "banco",
            &["\u{feff}Fecha", " Referencia ", "Abono"],
            &[&["10/06/2025", "000123", "150,00"]],
        )
    }

    #[test]
    fn finds_columns_ignoring_bom_and_padding() {
        let t = sample();
        assert_eq!(t.find_column("Fecha"), Some(0));
        assert_eq!(t.find_column("Referencia"), Some(1));
        assert_eq!(t.find_column("Cargo"), None);
    }

    #[test]
    fn missing_column_names_table_and_column() {
        let err = sample().require_column("Cargo").unwrap_err();
        assert_eq!(
            err,
            TableError::MissingColumn {
                table: "banco".to_string(),
                column: "Cargo".to_string()
            }
        );
        assert_eq!(err.to_string(), "Table 'banco' is missing required column 'Cargo'");
    }

    #[test]
    fn cell_out_of_range_is_empty() {
        let t = sample();
        assert_eq!(t.cell(0, 2), "150,00");
        assert_eq!(t.cell(0, 9), "");
        assert_eq!(t.cell(5, 0), "");
    }

    #[test]
    fn push_row_rejects_wrong_width() {
        let mut t = Table::new("ventas", vec!["a".into(), "b".into()]);
        assert!(t.push_row(vec!["1".into(), "2".into()]).is_ok());
        assert!(matches!(
            t.push_row(vec!["1".into()]),
            Err(TableError::RaggedRow { row: 1, expected: 2, found: 1, .. })
        ));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn empty_table_detection() {
        assert!(Table::default().is_empty());
        assert!(!Table::new("x", vec!["Fecha".into()]).is_empty());
    }
}
