use conciliar_core::{clean_description, Phase, ReconState, ReconciliationRecord};

use crate::claims::ClaimSet;
use crate::matcher::{MatchContext, Matcher};

const RESIDUAL_GROUP: &str = "-";

/// Disposes of every bank row no earlier phase claimed: outflows are missing
/// from the expense registry, inflows from the sales ledger. Rows without an
/// amount are left out.
#[derive(Debug, Clone, Default)]
pub struct ResidualSweep;

impl ResidualSweep {
    pub fn new() -> Self {
        Self
    }
}

impl Matcher for ResidualSweep {
    fn phase(&self) -> Phase {
        Phase::ResidualSweep
    }

    fn run(&self, ctx: &MatchContext<'_>, claims: &mut ClaimSet) -> Vec<ReconciliationRecord> {
        let mut records = Vec::new();
        for row in &ctx.ledger.movements {
            if !row.has_amount() || !claims.claim(row.id, Phase::ResidualSweep) {
                continue;
            }
            let record = if !row.charge.is_zero() {
                ReconciliationRecord::new(Phase::ResidualSweep, ReconState::PendingInRegistry, RESIDUAL_GROUP)
                    .bank_debit(row.charge)
            } else {
                ReconciliationRecord::new(Phase::ResidualSweep, ReconState::PendingInLedger, RESIDUAL_GROUP)
                    .bank_credit(row.credit)
            };
            records.push(
                record
                    .dated(row.date)
                    .with_reference(row.reference.clone())
                    .with_description(clean_description(&row.description))
                    .for_row(row.id),
            );
        }
        records
    }
}
