//! Column contracts of the three input tables and their conversion into
//! typed records.
//!
//! A missing required column aborts the run; malformed cells do not.

use tracing::debug;

use conciliar_core::{
    normalize_amount, parse_date, try_parse_amount, ExpenseEntry, Money, NoteType, PaymentLeg,
    SalesEntry, Table, TableError,
};

use crate::config::Markers;

pub const BANK_COLUMNS: [&str; 8] = [
    "Fecha",
    "Oficina",
    "Referencia",
    "Tipo",
    "Descripción",
    "Cargo",
    "Abono",
    "Saldo",
];

pub const SALES_COLUMNS: [&str; 8] = [
    "Nro_Control",
    "Monto_Total",
    "Forma_Pago_1",
    "Fecha_Pago_1",
    "Referencia_1",
    "Forma_Pago_2",
    "Fecha_Pago_2",
    "Referencia_2",
];

/// Counterpart bank per leg; optional in the sales book.
pub const SALES_BANK_COLUMNS: [&str; 2] = ["Banco_1", "Banco_2"];

pub const EXPENSE_COLUMNS: [&str; 4] = ["TIPO_NOTA", "REFERENCIA", "NOMBRE", "MONTO"];

/// A statement line exactly as extracted, before noise filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBankRow {
    pub date: String,
    pub office: String,
    pub reference: String,
    pub kind: String,
    pub description: String,
    pub charge: String,
    pub credit: String,
    pub balance: String,
}

/// Resolves every column in `names`, failing on the first one absent.
fn resolve<const N: usize>(table: &Table, names: &[&str; N]) -> Result<[usize; N], TableError> {
    let mut indices = [0usize; N];
    for (slot, name) in indices.iter_mut().zip(names.iter()) {
        *slot = table.require_column(name)?;
    }
    Ok(indices)
}

pub fn read_bank_rows(table: &Table) -> Result<Vec<RawBankRow>, TableError> {
    if table.is_empty() {
        return Ok(Vec::new());
    }
    let [date, office, reference, kind, description, charge, credit, balance] =
        resolve(table, &BANK_COLUMNS)?;

    Ok((0..table.len())
        .map(|row| RawBankRow {
            date: table.cell(row, date).to_string(),
            office: table.cell(row, office).to_string(),
            reference: table.cell(row, reference).to_string(),
            kind: table.cell(row, kind).to_string(),
            description: table.cell(row, description).to_string(),
            charge: table.cell(row, charge).to_string(),
            credit: table.cell(row, credit).to_string(),
            balance: table.cell(row, balance).to_string(),
        })
        .collect())
}

/// Amount of a cell, logging when non-empty text had to be read as zero.
pub(crate) fn amount_cell(table: &str, column: &str, raw: &str) -> Money {
    if !raw.trim().is_empty() && try_parse_amount(raw).is_none() {
        debug!(table, column, raw, "unparseable amount read as zero");
    }
    normalize_amount(raw)
}

pub fn read_sales_entries(table: &Table) -> Result<Vec<SalesEntry>, TableError> {
    if table.is_empty() {
        return Ok(Vec::new());
    }
    let [control, total, method_1, date_1, reference_1, method_2, date_2, reference_2] =
        resolve(table, &SALES_COLUMNS)?;
    let bank_1 = table.find_column(SALES_BANK_COLUMNS[0]);
    let bank_2 = table.find_column(SALES_BANK_COLUMNS[1]);

    let leg = |row: usize, method: usize, date: usize, reference: usize, bank: Option<usize>| {
        let raw_date = table.cell(row, date);
        let parsed = parse_date(raw_date);
        if parsed.is_none() && !raw_date.trim().is_empty() {
            debug!(table = %table.name, row, raw_date, "unparseable payment date");
        }
        PaymentLeg {
            method: table.cell(row, method).trim().to_string(),
            date: parsed,
            reference: table.cell(row, reference).trim().to_string(),
            bank: bank
                .map(|col| table.cell(row, col).trim().to_string())
                .unwrap_or_default(),
        }
    };

    Ok((0..table.len())
        .map(|row| SalesEntry {
            control: table.cell(row, control).trim().to_string(),
            total: amount_cell(&table.name, "Monto_Total", table.cell(row, total)),
            legs: [
                leg(row, method_1, date_1, reference_1, bank_1),
                leg(row, method_2, date_2, reference_2, bank_2),
            ]
            .into_iter()
            .filter(|l| !l.is_blank())
            .collect(),
        })
        .collect())
}

pub fn read_expense_entries(table: &Table, markers: &Markers) -> Result<Vec<ExpenseEntry>, TableError> {
    if table.is_empty() {
        return Ok(Vec::new());
    }
    let [note, reference, name, amount] = resolve(table, &EXPENSE_COLUMNS)?;

    Ok((0..table.len())
        .map(|row| {
            let note_text = table.cell(row, note);
            let reference_text = table.cell(row, reference).trim();
            let name_text = table.cell(row, name).trim();

            let note_type = if markers.registry_commission.is_match(note_text)
                || markers.registry_commission.is_match(name_text)
            {
                NoteType::BankCommission
            } else if markers.is_unidentified_reference(reference_text) {
                NoteType::UnidentifiedPayment
            } else {
                NoteType::Ordinary
            };

            ExpenseEntry {
                reference: reference_text.to_string(),
                counterparty: name_text.to_string(),
                note_type,
                amount: amount_cell(&table.name, "MONTO", table.cell(row, amount)),
            }
        })
        .collect())
}

/// Keeps only invoices settled through `bank`. Books that do not carry the
/// counterpart bank are left untouched.
pub fn filter_sales_by_bank(entries: Vec<SalesEntry>, bank: &str) -> Vec<SalesEntry> {
    let carries_bank = entries
        .iter()
        .flat_map(|e| e.legs.iter())
        .any(|leg| !leg.bank.is_empty());
    if !carries_bank {
        return entries;
    }
    let needle = bank.to_uppercase();
    entries
        .into_iter()
        .filter(|e| e.legs.iter().any(|leg| leg.bank.to_uppercase().contains(&needle)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkerConfig;
    use chrono::NaiveDate;

    fn markers() -> Markers {
        Markers::compile(&MarkerConfig::default()).unwrap()
    }

    fn sales_table(rows: &[&[&str]]) -> Table {
        Table::from_rows("ventas", &SALES_COLUMNS, rows)
    }

    #[test]
    fn bank_rows_follow_column_names_not_positions() {
        let table = Table::from_rows(
            "banco",
            &["Saldo", "Abono", "Cargo", "Descripción", "Tipo", "Referencia", "Oficina", "Fecha"],
            &[&["1.000,00", "150,00", "", "PAGO MOVIL", "NC", "000123456789", "001", "10/06/2025"]],
        );
        let rows = read_bank_rows(&table).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "10/06/2025");
        assert_eq!(rows[0].credit, "150,00");
        assert_eq!(rows[0].balance, "1.000,00");
        assert_eq!(rows[0].kind, "NC");
    }

    #[test]
    fn missing_bank_column_is_fatal() {
        let table = Table::from_rows("banco", &["Fecha", "Referencia"], &[]);
        let err = read_bank_rows(&table).unwrap_err();
        assert_eq!(
            err,
            TableError::MissingColumn {
                table: "banco".to_string(),
                column: "Oficina".to_string()
            }
        );
    }

    #[test]
    fn empty_table_yields_no_rows() {
        assert!(read_bank_rows(&Table::default()).unwrap().is_empty());
        assert!(read_sales_entries(&Table::default()).unwrap().is_empty());
        assert!(read_expense_entries(&Table::default(), &markers()).unwrap().is_empty());
    }

    #[test]
    fn header_only_table_still_validates_columns() {
        let table = Table::from_rows("ventas", &["Nro_Control"], &[]);
        assert!(matches!(
            read_sales_entries(&table),
            Err(TableError::MissingColumn { .. })
        ));
    }

    #[test]
    fn sales_entry_with_two_legs() {
        let table = sales_table(&[&[
            "F-001", "1.500,00", "OTR", "10/06/2025", "456789", "TJD", "11/06/2025", "",
        ]]);
        let entries = read_sales_entries(&table).unwrap();
        assert_eq!(entries[0].control, "F-001");
        assert_eq!(entries[0].total, Money::from_cents(150_000));
        assert_eq!(entries[0].legs.len(), 2);
        assert_eq!(entries[0].legs[0].date, NaiveDate::from_ymd_opt(2025, 6, 10));
        assert_eq!(entries[0].legs[1].method, "TJD");
    }

    #[test]
    fn blank_second_leg_is_dropped_and_bad_date_is_unknown() {
        let table = sales_table(&[&["F-002", "10", "TRA", "ayer", "99", "", "", ""]]);
        let entries = read_sales_entries(&table).unwrap();
        assert_eq!(entries[0].legs.len(), 1);
        assert_eq!(entries[0].legs[0].date, None);
    }

    #[test]
    fn expense_note_types() {
        let table = Table::from_rows(
            "saint",
            &EXPENSE_COLUMNS,
            &[
                &["ND", "4455", "PROVEEDOR X", "200,00"],
                &["ND", "0", "COMISIONES BANCARIAS", "12,50"],
                &["GASTOS BANCARIOS", "", "BANCO", "3,00"],
                &["ND", "PAGO NO IDENTIFICADO", "ALQUILER", "900"],
            ],
        );
        let entries = read_expense_entries(&table, &markers()).unwrap();
        let types: Vec<NoteType> = entries.iter().map(|e| e.note_type).collect();
        assert_eq!(
            types,
            vec![
                NoteType::Ordinary,
                NoteType::BankCommission,
                NoteType::BankCommission,
                NoteType::UnidentifiedPayment
            ]
        );
        assert_eq!(entries[1].amount, Money::from_cents(1250));
    }

    #[test]
    fn bank_filter_keeps_matching_invoices() {
        let mut table = Table::from_rows(
            "ventas",
            &[
                "Nro_Control", "Monto_Total", "Forma_Pago_1", "Fecha_Pago_1", "Referencia_1",
                "Banco_1", "Forma_Pago_2", "Fecha_Pago_2", "Referencia_2", "Banco_2",
            ],
            &[],
        );
        table.rows.push(
            ["A", "1", "OTR", "10/06/2025", "1", "Bancaribe", "", "", "", ""]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        table.rows.push(
            ["B", "1", "OTR", "10/06/2025", "2", "Banesco", "", "", "", ""]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        let entries = read_sales_entries(&table).unwrap();
        let kept = filter_sales_by_bank(entries, "bancaribe");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].control, "A");
    }

    #[test]
    fn bank_filter_ignored_without_bank_columns() {
        let table = sales_table(&[&["A", "1", "OTR", "10/06/2025", "1", "", "", ""]]);
        let entries = read_sales_entries(&table).unwrap();
        assert_eq!(filter_sales_by_bank(entries, "bancaribe").len(), 1);
    }
}
