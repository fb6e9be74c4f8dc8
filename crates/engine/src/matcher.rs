use conciliar_core::{
    clean_description, BankRowId, ExpenseEntry, Phase, ReconState, ReconciliationRecord,
    SalesEntry,
};

use crate::claims::ClaimSet;
use crate::config::{EngineConfig, Markers};
use crate::prepare::PreparedLedger;

/// Read-only inputs shared by every phase of a run.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub ledger: &'a PreparedLedger,
    pub sales: &'a [SalesEntry],
    pub expenses: &'a [ExpenseEntry],
    pub config: &'a EngineConfig,
    pub markers: &'a Markers,
}

/// One reconciliation phase: selects its candidates, searches for
/// counterparts among unclaimed bank rows and reports every candidate.
pub trait Matcher {
    fn phase(&self) -> Phase;

    fn run(&self, ctx: &MatchContext<'_>, claims: &mut ClaimSet) -> Vec<ReconciliationRecord>;
}

/// Claims the row right after `parent` when it is a commission charged for
/// that movement, returning its output row. Credit rows are never linked.
pub(crate) fn link_trailing_commission(
    ctx: &MatchContext<'_>,
    claims: &mut ClaimSet,
    phase: Phase,
    parent: BankRowId,
    group: &str,
    order: u32,
) -> Option<ReconciliationRecord> {
    let row = ctx.ledger.get(parent.next())?;
    if !row.is_debit_note() || !ctx.markers.linked_commission.is_match(&row.description) {
        return None;
    }
    if !claims.claim(row.id, phase) {
        return None;
    }
    Some(
        ReconciliationRecord::new(phase, ReconState::Matched, group)
            .dated(row.date)
            .with_reference(row.reference.clone())
            .with_description(clean_description(&row.description))
            .bank_debit(row.charge)
            .ordered(order)
            .for_row(row.id),
    )
}
