use std::collections::BTreeMap;

use conciliar_core::{BankRowId, Phase};

/// The bank rows already accounted for during one reconciliation run.
///
/// Owned by a single run and threaded by `&mut` through the phases. A row is
/// claimed at most once and a claim is never released.
#[derive(Debug, Default)]
pub struct ClaimSet {
    claims: BTreeMap<BankRowId, Phase>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `row` for `phase`. Returns `false`, leaving the existing claim
    /// untouched, when the row was already taken.
    pub fn claim(&mut self, row: BankRowId, phase: Phase) -> bool {
        if self.claims.contains_key(&row) {
            return false;
        }
        self.claims.insert(row, phase);
        true
    }

    pub fn is_claimed(&self, row: BankRowId) -> bool {
        self.claims.contains_key(&row)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn count_for(&self, phase: Phase) -> usize {
        self.claims.values().filter(|p| **p == phase).count()
    }
}
