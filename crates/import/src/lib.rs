//! CSV boundary for the reconciliation engine: reads the three input tables
//! and writes the reconciliation table.

pub mod csv;

pub use crate::csv::{read_table, read_table_file, write_table, write_table_file, CsvError, CsvProfile};
