//! Batch matching of card-terminal closings against bank settlements.
//!
//! Sales are pooled per closing date and bank credits per settlement date.
//! Every pair inside the business-day window becomes a candidate; candidates
//! are then assigned greedily, nearest and best-balanced first, so that each
//! sales batch and each bank batch is used at most once.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use conciliar_core::{
    business_days_between, clean_description, format_date, BankRowId, Money, Phase,
    ReconState, ReconciliationRecord, ReviewReason, UNRESOLVED_REFERENCE,
};

use crate::claims::ClaimSet;
use crate::config::SettlementConfig;
use crate::matcher::{link_trailing_commission, MatchContext, Matcher};

/// Card sales closed on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesBatch {
    pub date: NaiveDate,
    pub total: Money,
    pub controls: Vec<String>,
}

impl SalesBatch {
    fn control_range(&self) -> String {
        let first = self.controls.iter().min().map(String::as_str).unwrap_or_default();
        let last = self.controls.iter().max().map(String::as_str).unwrap_or_default();
        format!("Ctls: {first} al {last}")
    }
}

/// Card settlement credits booked on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct BankBatch {
    pub date: NaiveDate,
    pub total: Money,
    pub rows: Vec<BankRowId>,
}

/// A sales batch paired with a bank batch settled `business_days` later.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchCandidate {
    pub sales: usize,
    pub bank: usize,
    pub business_days: u32,
    /// Percentage of the sales total missing from the bank total.
    pub variance: Decimal,
}

impl BatchCandidate {
    pub fn within_expected_discount(&self, config: &SettlementConfig) -> bool {
        self.variance >= config.variance_min && self.variance <= config.variance_max
    }
}

/// `(sales - bank) / sales * 100`, or zero for an empty sales batch.
///
/// A result outside the `Decimal` range saturates to `Decimal::MAX` or
/// `Decimal::MIN` with the sign of the true value, so it still lands in a
/// review bucket.
pub fn variance_percent(sales: Money, bank: Money) -> Decimal {
    let (sales, bank) = (sales.amount(), bank.amount());
    if sales.is_zero() {
        return Decimal::ZERO;
    }
    // Only opposite signs overflow here, and the quotient is then positive.
    let Some(diff) = sales.checked_sub(bank) else {
        return Decimal::MAX;
    };
    match diff
        .checked_div(sales)
        .and_then(|share| share.checked_mul(Decimal::ONE_HUNDRED))
    {
        Some(variance) => variance,
        None if diff.is_sign_negative() != sales.is_sign_negative() => Decimal::MIN,
        None => Decimal::MAX,
    }
}

pub fn classify_variance(variance: Decimal, config: &SettlementConfig) -> (ReconState, String) {
    if variance >= config.variance_min && variance <= config.variance_max {
        (ReconState::Matched, format!("Lote TDD (Com: {variance:.2}%)"))
    } else if variance > config.variance_max && variance <= config.review_ceiling {
        (
            ReconState::NeedsReview(ReviewReason::HighDifference),
            format!("Lote TDD [Falta {variance:.2}%]"),
        )
    } else if variance < config.variance_min {
        (
            ReconState::NeedsReview(ReviewReason::BankExceedsExpected),
            format!("Diferencia: {variance:.2}%"),
        )
    } else {
        (
            ReconState::NeedsReview(ReviewReason::ExcessiveDifference),
            format!("Diferencia: {variance:.2}% (>{}%)", config.review_ceiling),
        )
    }
}

/// Every (sales, bank) pair whose bank date lies inside the business-day
/// window, in sales-date then bank-date order.
pub fn candidate_pairs(
    sales: &[SalesBatch],
    bank: &[BankBatch],
    config: &SettlementConfig,
) -> Vec<BatchCandidate> {
    let mut candidates = Vec::new();
    for (si, s) in sales.iter().enumerate() {
        for (bi, b) in bank.iter().enumerate() {
            let Some(days) = business_days_between(s.date, b.date) else {
                continue;
            };
            if days < config.min_business_days || days > config.max_business_days {
                continue;
            }
            candidates.push(BatchCandidate {
                sales: si,
                bank: bi,
                business_days: days,
                variance: variance_percent(s.total, b.total),
            });
        }
    }
    candidates
}

/// Greedy assignment: candidates within the expected discount are placed
/// first, the rest only fill what remains. Within each pass the nearest
/// settlement wins, then the smallest absolute variance.
///
/// Returns the chosen candidate per sales batch.
pub fn assign(
    mut candidates: Vec<BatchCandidate>,
    bank: &[BankBatch],
    claims: &ClaimSet,
    config: &SettlementConfig,
) -> BTreeMap<usize, BatchCandidate> {
    candidates.sort_by(|a, b| {
        a.business_days
            .cmp(&b.business_days)
            .then_with(|| a.variance.abs().cmp(&b.variance.abs()))
    });

    let mut chosen: BTreeMap<usize, BatchCandidate> = BTreeMap::new();
    let mut used_bank = vec![false; bank.len()];
    for valid_pass in [true, false] {
        for candidate in &candidates {
            if candidate.within_expected_discount(config) != valid_pass {
                continue;
            }
            if chosen.contains_key(&candidate.sales) || used_bank[candidate.bank] {
                continue;
            }
            if bank[candidate.bank].rows.iter().any(|row| claims.is_claimed(*row)) {
                continue;
            }
            used_bank[candidate.bank] = true;
            chosen.insert(candidate.sales, candidate.clone());
        }
    }
    chosen
}

#[derive(Debug, Clone, Default)]
pub struct SettlementMatcher;

impl SettlementMatcher {
    pub fn new() -> Self {
        Self
    }

    fn emit_assigned(
        ctx: &MatchContext<'_>,
        claims: &mut ClaimSet,
        sales: &SalesBatch,
        bank: &BankBatch,
        variance: Decimal,
        records: &mut Vec<ReconciliationRecord>,
    ) {
        let (state, note) = classify_variance(variance, &ctx.config.settlement);
        let group = format!("Lote {}", format_date(sales.date));
        let mut expected = Some(sales.total);

        for (i, row_id) in bank.rows.iter().enumerate() {
            let Some(row) = ctx.ledger.get(*row_id) else {
                continue;
            };
            if !claims.claim(row.id, Phase::CardSettlement) {
                continue;
            }
            let order = 2 * i as u32 + 1;
            records.push(
                ReconciliationRecord::new(Phase::CardSettlement, state, group.clone())
                    .dated(row.date)
                    .with_reference(row.reference.clone())
                    .with_description(format!(
                        "{} (Ventas del {} - {note})",
                        clean_description(&row.description),
                        format_date(sales.date)
                    ))
                    .bank_credit(row.credit)
                    .expected_in_ledger(expected.take().unwrap_or_default())
                    .ordered(order)
                    .for_row(row.id),
            );
            records.extend(link_trailing_commission(
                ctx,
                claims,
                Phase::CardSettlement,
                row.id,
                &group,
                order + 1,
            ));
        }
    }

    fn emit_unassigned(
        ctx: &MatchContext<'_>,
        sales: &SalesBatch,
        records: &mut Vec<ReconciliationRecord>,
    ) {
        let in_transit = ctx.ledger.cutoff.is_some_and(|cutoff| {
            let lag = (cutoff - sales.date).num_days();
            (0..=ctx.config.settlement.in_transit_days).contains(&lag)
        });
        let (state, note) = if in_transit {
            (
                ReconState::PendingInTransit,
                "Cierre de Lote en tránsito (Fin de Mes)",
            )
        } else {
            (ReconState::PendingInBank, "No aparece en banco")
        };
        records.push(
            ReconciliationRecord::new(Phase::CardSettlement, state, sales.control_range())
                .dated(Some(sales.date))
                .with_reference(UNRESOLVED_REFERENCE)
                .with_description(format!("CIERRE TDD - {note}"))
                .expected_in_ledger(sales.total),
        );
    }
}

impl Matcher for SettlementMatcher {
    fn phase(&self) -> Phase {
        Phase::CardSettlement
    }

    fn run(&self, ctx: &MatchContext<'_>, claims: &mut ClaimSet) -> Vec<ReconciliationRecord> {
        let markers = ctx.markers;
        let mut records = Vec::new();

        let mut sales_by_date: BTreeMap<NaiveDate, SalesBatch> = BTreeMap::new();
        for entry in ctx.sales {
            let Some(leg) = entry.first_leg(|leg| markers.card_method.is_match(&leg.method)) else {
                continue;
            };
            let pending = |state| {
                ReconciliationRecord::new(Phase::CardSettlement, state, entry.control.clone())
                    .dated(leg.date)
                    .with_reference(UNRESOLVED_REFERENCE)
                    .with_description(format!("TDD (Ref Libro: {})", entry.control))
                    .expected_in_ledger(entry.total)
            };
            match leg.date {
                None => records.push(pending(ReconState::PendingInBank)),
                Some(date) if ctx.ledger.is_prior_month(date) => {
                    records.push(pending(ReconState::PendingPriorMonth))
                }
                Some(date) => {
                    let batch = sales_by_date.entry(date).or_insert_with(|| SalesBatch {
                        date,
                        total: Money::zero(),
                        controls: Vec::new(),
                    });
                    batch.total = batch.total + entry.total;
                    batch.controls.push(entry.control.clone());
                }
            }
        }

        let mut bank_by_date: BTreeMap<NaiveDate, BankBatch> = BTreeMap::new();
        for row in &ctx.ledger.movements {
            if !row.is_credit_note() || !markers.card_description.is_match(&row.description) {
                continue;
            }
            let Some(date) = row.date else {
                continue;
            };
            let batch = bank_by_date.entry(date).or_insert_with(|| BankBatch {
                date,
                total: Money::zero(),
                rows: Vec::new(),
            });
            batch.total = batch.total + row.credit;
            batch.rows.push(row.id);
        }

        let sales: Vec<SalesBatch> = sales_by_date.into_values().collect();
        let bank: Vec<BankBatch> = bank_by_date.into_values().collect();
        let candidates = candidate_pairs(&sales, &bank, &ctx.config.settlement);
        debug!(
            sales_batches = sales.len(),
            bank_batches = bank.len(),
            candidates = candidates.len(),
            "settlement candidates"
        );
        let chosen = assign(candidates, &bank, claims, &ctx.config.settlement);

        for (si, batch) in sales.iter().enumerate() {
            match chosen.get(&si) {
                Some(candidate) => {
                    debug!(
                        sales_date = %batch.date,
                        bank_date = %bank[candidate.bank].date,
                        variance = %candidate.variance,
                        "settlement assigned"
                    );
                    Self::emit_assigned(
                        ctx,
                        claims,
                        batch,
                        &bank[candidate.bank],
                        candidate.variance,
                        &mut records,
                    )
                }
                None => Self::emit_unassigned(ctx, batch, &mut records),
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn money(s: &str) -> Money {
        Money::new(dec(s))
    }

    fn sales_batch(date: &str, total: &str) -> SalesBatch {
        SalesBatch {
            date: d(date),
            total: money(total),
            controls: vec!["C1".to_string()],
        }
    }

    fn bank_batch(date: &str, total: &str, first_row: usize) -> BankBatch {
        BankBatch {
            date: d(date),
            total: money(total),
            rows: vec![BankRowId(first_row)],
        }
    }

    // ── variance ──

    #[test]
    fn variance_is_share_of_sales_missing() {
        assert_eq!(variance_percent(money("1000"), money("980")), dec("2"));
        assert_eq!(variance_percent(money("1000"), money("1010")), dec("-1"));
        assert_eq!(variance_percent(Money::zero(), money("50")), Decimal::ZERO);
    }

    #[test]
    fn out_of_range_variance_saturates_with_its_sign() {
        let tiny = money("0.0000000001");
        assert_eq!(variance_percent(tiny, money("100000000000000000000")), Decimal::MIN);
        assert_eq!(variance_percent(tiny, money("-100000000000000000000")), Decimal::MAX);
        assert_eq!(
            variance_percent(Money::new(Decimal::MAX), Money::new(Decimal::MIN)),
            Decimal::MAX
        );

        let config = SettlementConfig::default();
        assert_eq!(
            classify_variance(Decimal::MAX, &config).0,
            ReconState::NeedsReview(ReviewReason::ExcessiveDifference)
        );
        assert_eq!(
            classify_variance(Decimal::MIN, &config).0,
            ReconState::NeedsReview(ReviewReason::BankExceedsExpected)
        );
    }

    #[test]
    fn classification_boundaries_are_inclusive() {
        let config = SettlementConfig::default();
        assert!(classify_variance(dec("3.5"), &config).0.is_matched());
        assert!(classify_variance(dec("-1"), &config).0.is_matched());
        assert_eq!(
            classify_variance(dec("3.50001"), &config).0,
            ReconState::NeedsReview(ReviewReason::HighDifference)
        );
        assert_eq!(
            classify_variance(dec("25"), &config).0,
            ReconState::NeedsReview(ReviewReason::HighDifference)
        );
        assert_eq!(
            classify_variance(dec("25.01"), &config).0,
            ReconState::NeedsReview(ReviewReason::ExcessiveDifference)
        );
        assert_eq!(
            classify_variance(dec("-1.00001"), &config).0,
            ReconState::NeedsReview(ReviewReason::BankExceedsExpected)
        );
    }

    #[test]
    fn notes_carry_two_decimals() {
        let config = SettlementConfig::default();
        assert_eq!(classify_variance(dec("2"), &config).1, "Lote TDD (Com: 2.00%)");
        assert_eq!(classify_variance(dec("10"), &config).1, "Lote TDD [Falta 10.00%]");
    }

    // ── candidates ──

    #[test]
    fn same_day_settlement_is_outside_the_window() {
        let config = SettlementConfig::default();
        let sales = vec![sales_batch("2025-06-10", "100")];
        let bank = vec![bank_batch("2025-06-10", "100", 0)];
        assert!(candidate_pairs(&sales, &bank, &config).is_empty());
    }

    #[test]
    fn window_counts_business_days_only() {
        let config = SettlementConfig::default();
        // Friday closing, Monday settlement: one business day.
        let sales = vec![sales_batch("2025-06-13", "100")];
        let bank = vec![
            bank_batch("2025-06-16", "98", 0),
            bank_batch("2025-06-24", "98", 1),
        ];
        let candidates = candidate_pairs(&sales, &bank, &config);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].business_days, 1);
        assert_eq!(candidates[0].bank, 0);
    }

    // ── assignment ──

    #[test]
    fn nearest_settlement_wins() {
        let config = SettlementConfig::default();
        let sales = vec![sales_batch("2025-06-10", "100")];
        let bank = vec![
            bank_batch("2025-06-11", "98", 0),
            bank_batch("2025-06-12", "99", 1),
        ];
        let chosen = assign(
            candidate_pairs(&sales, &bank, &config),
            &bank,
            &ClaimSet::new(),
            &config,
        );
        assert_eq!(chosen[&0].bank, 0);
    }

    #[test]
    fn valid_pairs_are_placed_before_invalid_ones() {
        let config = SettlementConfig::default();
        let sales = vec![sales_batch("2025-06-10", "100")];
        // Nearer bank batch is off by 40%; the later one is a normal discount.
        let bank = vec![
            bank_batch("2025-06-11", "60", 0),
            bank_batch("2025-06-12", "98", 1),
        ];
        let chosen = assign(
            candidate_pairs(&sales, &bank, &config),
            &bank,
            &ClaimSet::new(),
            &config,
        );
        assert_eq!(chosen[&0].bank, 1);
    }

    #[test]
    fn each_bank_batch_is_used_once() {
        let config = SettlementConfig::default();
        let sales = vec![
            sales_batch("2025-06-10", "100"),
            sales_batch("2025-06-11", "100"),
        ];
        let bank = vec![bank_batch("2025-06-12", "98", 0)];
        let chosen = assign(
            candidate_pairs(&sales, &bank, &config),
            &bank,
            &ClaimSet::new(),
            &config,
        );
        assert_eq!(chosen.len(), 1);
        // One business day beats two.
        assert!(chosen.contains_key(&1));
    }

    #[test]
    fn partially_claimed_bank_batch_is_skipped() {
        let config = SettlementConfig::default();
        let sales = vec![sales_batch("2025-06-10", "100")];
        let bank = vec![bank_batch("2025-06-11", "98", 4)];
        let mut claims = ClaimSet::new();
        claims.claim(BankRowId(4), Phase::Mobile);
        let chosen = assign(candidate_pairs(&sales, &bank, &config), &bank, &claims, &config);
        assert!(chosen.is_empty());
    }
}
