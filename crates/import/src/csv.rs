use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

use conciliar_core::{Table, TableError};

const BOM: char = '\u{feff}';

/// How one input or output table is laid out on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvProfile {
    pub name: String,
    pub delimiter: String,
    /// Prefix written files with a UTF-8 byte-order mark, as spreadsheet
    /// tools expect for accented headers.
    pub write_bom: bool,
}

impl Default for CsvProfile {
    fn default() -> Self {
        Self {
            name: "tabla".to_string(),
            delimiter: ",".to_string(),
            write_bom: true,
        }
    }
}

impl CsvProfile {
    pub fn new(name: &str, delimiter: &str) -> Self {
        Self {
            name: name.to_string(),
            delimiter: delimiter.to_string(),
            ..Self::default()
        }
    }

    pub fn bank_statement() -> Self {
        Self::new("estado_cuenta", ",")
    }

    pub fn sales_book() -> Self {
        Self::new("libro_ventas", ";")
    }

    pub fn expense_registry() -> Self {
        Self::new("registro_egresos", ",")
    }

    pub fn reconciliation() -> Self {
        Self::new("conciliacion", ";")
    }

    fn delimiter_byte(&self) -> Result<u8, CsvError> {
        match self.delimiter.as_bytes() {
            [b] => Ok(*b),
            _ => Err(CsvError::InvalidDelimiter(self.delimiter.clone())),
        }
    }
}

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("Delimiter must be a single byte, got {0:?}")]
    InvalidDelimiter(String),
}

/// Reads a headed CSV into a `Table`.
///
/// Short rows are padded with empty cells; blank lines are skipped. An input
/// with no header line yields an empty table.
pub fn read_table<R: Read>(data: R, profile: &CsvProfile) -> Result<Table, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(profile.delimiter_byte()?)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches(BOM) } else { h };
            h.trim().to_string()
        })
        .collect();
    let width = headers.len();
    let mut table = Table::new(&profile.name, headers);

    for result in reader.records() {
        let record = result?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        if row.len() < width {
            row.resize(width, String::new());
        }
        table.push_row(row)?;
    }
    Ok(table)
}

pub fn read_table_file(path: &Path, profile: &CsvProfile) -> Result<Table, CsvError> {
    read_table(File::open(path)?, profile)
}

pub fn write_table<W: Write>(table: &Table, mut out: W, profile: &CsvProfile) -> Result<(), CsvError> {
    if profile.write_bom {
        write!(out, "{BOM}")?;
    }
    let mut writer = csv::WriterBuilder::new()
        .delimiter(profile.delimiter_byte()?)
        .from_writer(out);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_table_file(table: &Table, path: &Path, profile: &CsvProfile) -> Result<(), CsvError> {
    write_table(table, BufWriter::new(File::create(path)?), profile)
}
