//! Invoice-by-invoice matching for the mobile-payment and transfer channels.
//!
//! Both channels share one algorithm and differ only in how references are
//! compared and whether a trailing commission line is linked.

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use conciliar_core::{
    clean_description, format_date, normalize_reference, tail, BankMovement, PaymentLeg, Phase,
    ReconState, ReconciliationRecord, SalesEntry, UNRESOLVED_REFERENCE,
};

use crate::claims::ClaimSet;
use crate::config::{EngineConfig, Markers};
use crate::matcher::{link_trailing_commission, MatchContext, Matcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceRule {
    /// One normalized reference contains the other.
    Contains,
    /// The last `n` characters agree exactly.
    SameTail(usize),
}

impl ReferenceRule {
    pub fn agrees(self, sales: &str, bank: &str) -> bool {
        if sales.is_empty() || bank.is_empty() {
            return false;
        }
        match self {
            ReferenceRule::Contains => sales.contains(bank) || bank.contains(sales),
            ReferenceRule::SameTail(n) => {
                sales.chars().count() >= n && bank.chars().count() >= n && tail(sales, n) == tail(bank, n)
            }
        }
    }
}

/// Where the bank date falls relative to the book's payment date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFit {
    SameDay,
    BankLags(i64),
    BankLeads(i64),
}

impl DateFit {
    /// `None` when the bank date is outside the accepted window.
    pub fn classify(sales: NaiveDate, bank: NaiveDate, config: &EngineConfig) -> Option<DateFit> {
        let diff = (bank - sales).num_days();
        if diff < -config.max_bank_lead_days || diff > config.max_bank_lag_days {
            return None;
        }
        Some(match diff {
            0 => DateFit::SameDay,
            d if d > 0 => DateFit::BankLags(d),
            d => DateFit::BankLeads(-d),
        })
    }

    fn annotate(self, description: String, sales_date: NaiveDate) -> String {
        match self {
            DateFit::SameDay => description,
            DateFit::BankLags(_) => format!("{description} (Realizado el {})", format_date(sales_date)),
            DateFit::BankLeads(days) => {
                format!("{description} [BANCO {days} DÍA ADELANTADO - Verificar fecha SAE]")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelMatcher {
    phase: Phase,
    label: &'static str,
    rule: ReferenceRule,
    link_commission: bool,
}

impl ChannelMatcher {
    pub fn mobile() -> Self {
        Self {
            phase: Phase::Mobile,
            label: "Pago Móvil",
            rule: ReferenceRule::Contains,
            link_commission: true,
        }
    }

    pub fn transfer(config: &EngineConfig) -> Self {
        Self {
            phase: Phase::Transfer,
            label: "Transferencia",
            rule: ReferenceRule::SameTail(config.transfer_tail_len),
            link_commission: false,
        }
    }

    fn method_marker<'m>(&self, markers: &'m Markers) -> &'m Regex {
        match self.phase {
            Phase::Mobile => &markers.mobile_method,
            _ => &markers.transfer_method,
        }
    }

    fn accepts_bank_row(&self, row: &BankMovement, markers: &Markers) -> bool {
        if !row.is_credit_note() {
            return false;
        }
        match self.phase {
            Phase::Mobile => markers.mobile_description.is_match(&row.description),
            _ => {
                markers.transfer_description.is_match(&row.description)
                    && !markers.mobile_description.is_match(&row.description)
            }
        }
    }

    /// First unclaimed bank row, in ledger order, that agrees on reference,
    /// amount and date window.
    fn find_counterpart<'l>(
        &self,
        ctx: &MatchContext<'l>,
        claims: &ClaimSet,
        bank_rows: &[&'l BankMovement],
        entry: &SalesEntry,
        leg: &PaymentLeg,
        reference: &str,
    ) -> Option<(&'l BankMovement, DateFit, NaiveDate)> {
        let sales_date = leg.date?;
        bank_rows.iter().copied().find_map(|row| {
            if claims.is_claimed(row.id) {
                return None;
            }
            let bank_reference = normalize_reference(&row.reference, ctx.config.reference_tail_len);
            if !self.rule.agrees(reference, &bank_reference) {
                return None;
            }
            if !row.credit.within(entry.total, ctx.config.amount_tolerance) {
                return None;
            }
            let fit = DateFit::classify(sales_date, row.date?, ctx.config)?;
            Some((row, fit, sales_date))
        })
    }
}

impl Matcher for ChannelMatcher {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn run(&self, ctx: &MatchContext<'_>, claims: &mut ClaimSet) -> Vec<ReconciliationRecord> {
        let method = self.method_marker(ctx.markers);
        let bank_rows: Vec<&BankMovement> = ctx
            .ledger
            .movements
            .iter()
            .filter(|row| self.accepts_bank_row(row, ctx.markers))
            .collect();

        let mut records = Vec::new();
        for entry in ctx.sales {
            let Some(leg) = entry.first_leg(|leg| method.is_match(&leg.method)) else {
                continue;
            };
            let reference = normalize_reference(&leg.reference, ctx.config.reference_tail_len);
            let unresolved = |state: ReconState| {
                ReconciliationRecord::new(self.phase, state, entry.control.clone())
                    .dated(leg.date)
                    .with_reference(UNRESOLVED_REFERENCE)
                    .with_description(format!("{} (Ref: {reference})", self.label))
                    .expected_in_ledger(entry.total)
            };

            if leg.date.is_some_and(|date| ctx.ledger.is_prior_month(date)) {
                records.push(unresolved(ReconState::PendingPriorMonth));
                continue;
            }

            let Some((row, fit, sales_date)) =
                self.find_counterpart(ctx, claims, &bank_rows, entry, leg, &reference)
            else {
                records.push(unresolved(ReconState::PendingInBank));
                continue;
            };
            claims.claim(row.id, self.phase);
            debug!(
                phase = %self.phase,
                control = %entry.control,
                row = %row.id,
                fit = ?fit,
                "channel match"
            );

            records.push(
                ReconciliationRecord::new(self.phase, ReconState::Matched, entry.control.clone())
                    .dated(row.date)
                    .with_reference(row.reference.clone())
                    .with_description(fit.annotate(clean_description(&row.description), sales_date))
                    .bank_credit(row.credit)
                    .expected_in_ledger(entry.total)
                    .ordered(1)
                    .for_row(row.id),
            );

            if self.link_commission {
                records.extend(link_trailing_commission(
                    ctx,
                    claims,
                    self.phase,
                    row.id,
                    &entry.control,
                    2,
                ));
            }
        }
        records
    }
}
