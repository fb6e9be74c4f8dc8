use std::collections::BTreeMap;

use serde::Serialize;

use conciliar_core::{Money, ReconciliationRecord, Table, OUTPUT_COLUMNS};

/// Name given to the rendered output table.
pub const OUTPUT_TABLE: &str = "conciliacion";

/// The assembled output: every phase's records in final order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationTable {
    pub records: Vec<ReconciliationRecord>,
}

impl ReconciliationTable {
    /// Concatenates phase outputs in phase order, then stable-sorts by date,
    /// group and internal order.
    pub fn assemble<I>(phases: I) -> Self
    where
        I: IntoIterator<Item = Vec<ReconciliationRecord>>,
    {
        let mut records: Vec<ReconciliationRecord> = phases.into_iter().flatten().collect();
        records.sort_by(|a, b| a.output_order(b));
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(
            OUTPUT_TABLE,
            OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        );
        table.rows = self.records.iter().map(|r| r.to_cells()).collect();
        table
    }

    pub fn summary(&self) -> ReconciliationSummary {
        let mut summary = ReconciliationSummary::default();
        for record in &self.records {
            let matched = record.state.is_matched();
            if record.credit.is_positive() {
                summary.credits.add(record.credit, matched);
            }
            if record.debit.is_positive() {
                summary.debits.add(record.debit, matched);
            }
            if record.state.needs_review() {
                summary.needs_review += 1;
            }
            *summary.by_state.entry(record.state.to_string()).or_insert(0) += 1;
        }
        summary
    }
}

/// Count and sum of bank rows on one side of the statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SideTotals {
    pub reconciled_count: usize,
    pub reconciled_amount: Money,
    pub pending_count: usize,
    pub pending_amount: Money,
}

impl SideTotals {
    fn add(&mut self, amount: Money, reconciled: bool) {
        if reconciled {
            self.reconciled_count += 1;
            self.reconciled_amount = self.reconciled_amount + amount;
        } else {
            self.pending_count += 1;
            self.pending_amount = self.pending_amount + amount;
        }
    }

    pub fn total_amount(&self) -> Money {
        self.reconciled_amount + self.pending_amount
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    /// Rows with an `Abono`.
    pub credits: SideTotals,
    /// Rows with a `Cargo`.
    pub debits: SideTotals,
    /// Rows in any `Requiere Revisión` state.
    pub needs_review: usize,
    /// Row count per output state label.
    pub by_state: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use conciliar_core::{Phase, ReconState, ReviewReason};

    fn record(day: Option<u32>, group: &str, order: u32) -> ReconciliationRecord {
        ReconciliationRecord::new(Phase::Mobile, ReconState::Matched, group)
            .dated(day.and_then(|d| NaiveDate::from_ymd_opt(2025, 6, d)))
            .ordered(order)
    }

    #[test]
    fn assemble_sorts_across_phases() {
        let table = ReconciliationTable::assemble(vec![
            vec![record(Some(12), "B", 1), record(None, "A", 1)],
            vec![record(Some(10), "Z", 1), record(Some(12), "A", 2), record(Some(12), "A", 1)],
        ]);
        let keys: Vec<(Option<u32>, &str, u32)> = table
            .records
            .iter()
            .map(|r| (r.date.map(|d| chrono::Datelike::day(&d)), r.group.as_str(), r.order))
            .collect();
        assert_eq!(
            keys,
            vec![
                (Some(10), "Z", 1),
                (Some(12), "A", 1),
                (Some(12), "A", 2),
                (Some(12), "B", 1),
                (None, "A", 1),
            ]
        );
    }

    #[test]
    fn to_table_uses_output_columns() {
        let table = ReconciliationTable::assemble(vec![vec![record(Some(3), "F-1", 1)
            .bank_credit(Money::from_cents(15000))
            .expected_in_ledger(Money::from_cents(15000))]])
        .to_table();
        assert_eq!(table.headers.len(), OUTPUT_COLUMNS.len());
        assert_eq!(table.rows[0][0], "03/06/2025");
        assert_eq!(table.rows[0][4], "150.00");
        assert_eq!(table.rows[0][7], "Conciliado");
    }

    #[test]
    fn summary_splits_reconciled_from_pending() {
        let table = ReconciliationTable::assemble(vec![vec![
            record(Some(1), "a", 1).bank_credit(Money::from_cents(1000)),
            ReconciliationRecord::new(Phase::ResidualSweep, ReconState::PendingInLedger, "-")
                .bank_credit(Money::from_cents(500)),
            ReconciliationRecord::new(Phase::ResidualSweep, ReconState::PendingInRegistry, "-")
                .bank_debit(Money::from_cents(250)),
            ReconciliationRecord::new(
                Phase::Expense,
                ReconState::NeedsReview(ReviewReason::VerifyReference),
                "SAINT",
            )
            .bank_debit(Money::from_cents(400)),
        ]]);
        let summary = table.summary();
        assert_eq!(summary.credits.reconciled_count, 1);
        assert_eq!(summary.credits.pending_amount, Money::from_cents(500));
        assert_eq!(summary.credits.total_amount(), Money::from_cents(1500));
        assert_eq!(summary.debits.pending_count, 2);
        assert_eq!(summary.needs_review, 1);
        assert_eq!(summary.by_state["Pendiente en Libro"], 1);
        assert_eq!(summary.by_state["Conciliado"], 1);
    }
}
