use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::warn;

use conciliar_core::{BankRowId, Phase};

use crate::claims::ClaimSet;
use crate::prepare::PreparedLedger;
use crate::report::ReconciliationTable;

/// Row accounting for one run: every bank movement that moves money must be
/// reported exactly once, alongside the ledger and registry rows that have
/// no bank movement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub bank_rows: usize,
    pub noise_rows: usize,
    pub claimed_by_phase: BTreeMap<Phase, usize>,
    pub residual_rows: usize,
    /// Output rows without a bank movement.
    pub synthetic_rows: usize,
    /// Ledger and registry entries still waiting for their bank movement.
    pub unbanked_rows: usize,
    pub output_rows: usize,
    /// Movements with an amount that no output row accounts for.
    pub missing: Vec<BankRowId>,
    /// Movements reported by more than one output row.
    pub duplicated: Vec<BankRowId>,
}

impl AuditReport {
    pub fn build(ledger: &PreparedLedger, claims: &ClaimSet, table: &ReconciliationTable) -> Self {
        let mut seen = BTreeSet::new();
        let mut duplicated = Vec::new();
        let mut synthetic_rows = 0;
        let mut unbanked_rows = 0;
        for record in &table.records {
            if record.state.is_unbanked() {
                unbanked_rows += 1;
            }
            match record.bank_row {
                Some(row) => {
                    if !seen.insert(row) {
                        duplicated.push(row);
                    }
                }
                None => synthetic_rows += 1,
            }
        }
        let missing = ledger
            .movements
            .iter()
            .filter(|m| m.has_amount() && !seen.contains(&m.id))
            .map(|m| m.id)
            .collect();
        let claimed_by_phase = Phase::ALL
            .iter()
            .map(|phase| (*phase, claims.count_for(*phase)))
            .collect();

        let report = Self {
            bank_rows: ledger.movements.len(),
            noise_rows: ledger.noise_rows,
            claimed_by_phase,
            residual_rows: claims.count_for(Phase::ResidualSweep),
            synthetic_rows,
            unbanked_rows,
            output_rows: table.len(),
            missing,
            duplicated,
        };
        if !report.is_consistent() {
            warn!(
                missing = ?report.missing,
                duplicated = ?report.duplicated,
                output_rows = report.output_rows,
                "bank rows not reported exactly once"
            );
        }
        report
    }

    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.duplicated.is_empty()
    }

    pub fn bank_backed_rows(&self) -> usize {
        self.output_rows - self.synthetic_rows
    }
}
