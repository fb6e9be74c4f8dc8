use tracing::debug;

use conciliar_core::{
    clean_description, normalize_reference, BankMovement, ExpenseEntry, Money, NoteType, Phase,
    ReconState, ReconciliationRecord, ReviewReason, UNRESOLVED_REFERENCE,
};

use crate::claims::ClaimSet;
use crate::matcher::{MatchContext, Matcher};

const REGISTRY_GROUP: &str = "SAINT";
const COMMISSION_GROUP: &str = "COMISIONES";

/// Registry references of two characters or fewer never count as agreement.
const MIN_REGISTRY_REFERENCE_LEN: usize = 3;

/// True when the bank reference ends with the registry reference.
pub fn references_agree(bank: &str, registry: &str) -> bool {
    registry.chars().count() >= MIN_REGISTRY_REFERENCE_LEN && bank.ends_with(registry)
}

/// Outcome of the fee aggregate comparison, shared by every fee row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeAggregate {
    pub bank_total: Money,
    pub registry_total: Money,
    pub agrees: bool,
}

impl FeeAggregate {
    fn state(&self) -> ReconState {
        if self.agrees {
            ReconState::Matched
        } else {
            ReconState::NeedsReview(ReviewReason::CommissionDifference)
        }
    }

    fn note(&self) -> String {
        if self.agrees {
            "Cuadre Global".to_string()
        } else {
            format!("Dif: {}", self.bank_total - self.registry_total)
        }
    }
}

enum Counterpart<'a> {
    Exact(&'a BankMovement),
    AmountOnly(&'a BankMovement),
}

/// Reconciles bank debit notes against the expense registry.
///
/// Bank fees are compared as one aggregate against the registry's fee
/// postings, since the registry usually books several fee lines as a single
/// figure. Every other registry row is matched line by line.
#[derive(Debug, Clone, Default)]
pub struct ExpenseMatcher;

impl ExpenseMatcher {
    pub fn new() -> Self {
        Self
    }

    fn find_counterpart<'l>(
        ctx: &MatchContext<'l>,
        claims: &ClaimSet,
        candidates: &[&'l BankMovement],
        entry: &ExpenseEntry,
    ) -> Option<Counterpart<'l>> {
        let config = ctx.config;
        let registry_reference = normalize_reference(&entry.reference, config.reference_tail_len);
        let mut by_amount = None;
        for row in candidates.iter().copied() {
            if claims.is_claimed(row.id) || !row.charge.within(entry.amount, config.amount_tolerance) {
                continue;
            }
            let bank_reference = normalize_reference(&row.reference, config.reference_tail_len);
            if entry.note_type == NoteType::UnidentifiedPayment
                || references_agree(&bank_reference, &registry_reference)
            {
                return Some(Counterpart::Exact(row));
            }
            by_amount.get_or_insert(row);
        }
        by_amount.map(Counterpart::AmountOnly)
    }
}

impl Matcher for ExpenseMatcher {
    fn phase(&self) -> Phase {
        Phase::Expense
    }

    fn run(&self, ctx: &MatchContext<'_>, claims: &mut ClaimSet) -> Vec<ReconciliationRecord> {
        let markers = ctx.markers;
        let (fee_rows, ordinary_rows): (Vec<&BankMovement>, Vec<&BankMovement>) = ctx
            .ledger
            .movements
            .iter()
            .filter(|row| row.is_debit_note())
            .partition(|row| markers.bank_fee.is_match(&row.description));

        let bank_total: Money = fee_rows.iter().map(|row| row.charge).sum();
        let registry_total: Money = ctx
            .expenses
            .iter()
            .filter(|entry| entry.is_commission())
            .map(|entry| entry.amount)
            .sum();
        let fees = FeeAggregate {
            bank_total,
            registry_total,
            agrees: bank_total.within(registry_total, ctx.config.commission_tolerance),
        };
        debug!(
            bank = %fees.bank_total,
            registry = %fees.registry_total,
            agrees = fees.agrees,
            "bank fee aggregate"
        );

        let mut records = Vec::new();
        for entry in ctx.expenses.iter().filter(|entry| !entry.is_commission()) {
            if entry.amount.is_zero() {
                continue;
            }
            match Self::find_counterpart(ctx, claims, &ordinary_rows, entry) {
                Some(Counterpart::Exact(row)) => {
                    claims.claim(row.id, Phase::Expense);
                    debug!(row = %row.id, reference = %entry.reference, "expense match");
                    records.push(
                        ReconciliationRecord::new(Phase::Expense, ReconState::Matched, REGISTRY_GROUP)
                            .dated(row.date)
                            .with_reference(row.reference.clone())
                            .with_description(format!(
                                "{}, {}",
                                clean_description(&row.description),
                                entry.counterparty
                            ))
                            .bank_debit(row.charge)
                            .expected_in_registry(entry.amount)
                            .for_row(row.id),
                    );
                }
                Some(Counterpart::AmountOnly(row)) => {
                    let record = ReconciliationRecord::new(
                        Phase::Expense,
                        ReconState::NeedsReview(ReviewReason::VerifyReference),
                        REGISTRY_GROUP,
                    )
                    .with_reference(UNRESOLVED_REFERENCE)
                    .with_description(format!(
                        "{}, {} [⚠️ Ref_Banco: {} / Ref_SAINT: {}]",
                        clean_description(&row.description),
                        entry.counterparty,
                        row.reference,
                        entry.reference
                    ))
                    .expected_in_registry(entry.amount);
                    if ctx.config.claim_ambiguous_expenses {
                        claims.claim(row.id, Phase::Expense);
                        records.push(record.dated(row.date).bank_debit(row.charge).for_row(row.id));
                    } else {
                        records.push(record);
                    }
                }
                None => records.push(
                    ReconciliationRecord::new(Phase::Expense, ReconState::PendingInBank, REGISTRY_GROUP)
                        .with_reference(entry.reference.clone())
                        .with_description(format!("Egreso: {}", entry.counterparty))
                        .expected_in_registry(entry.amount),
                ),
            }
        }

        for row in fee_rows {
            if !claims.claim(row.id, Phase::Expense) {
                continue;
            }
            records.push(
                ReconciliationRecord::new(Phase::Expense, fees.state(), COMMISSION_GROUP)
                    .dated(row.date)
                    .with_reference(row.reference.clone())
                    .with_description(format!(
                        "{} ({})",
                        clean_description(&row.description),
                        fees.note()
                    ))
                    .bank_debit(row.charge)
                    .for_row(row.id),
            );
        }
        records
    }
}
