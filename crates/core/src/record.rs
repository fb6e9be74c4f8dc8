use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::bank::BankRowId;
use crate::money::Money;
use crate::period::format_date;

/// Header of the unified output table, in column order.
pub const OUTPUT_COLUMNS: [&str; 9] = [
    "Fecha",
    "Referencia",
    "Descripción",
    "Cargo",
    "Abono",
    "SAE (Debe)",
    "SAINT (Haber)",
    "Estado",
    "Nro_Control",
];

/// Placeholder shown when no bank reference backs a row.
pub const UNRESOLVED_REFERENCE: &str = "[NO ENCONTRADA]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Mobile,
    Transfer,
    CardSettlement,
    Expense,
    ResidualSweep,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Mobile,
        Phase::Transfer,
        Phase::CardSettlement,
        Phase::Expense,
        Phase::ResidualSweep,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Mobile => write!(f, "mobile"),
            Phase::Transfer => write!(f, "transfer"),
            Phase::CardSettlement => write!(f, "card_settlement"),
            Phase::Expense => write!(f, "expense"),
            Phase::ResidualSweep => write!(f, "residual_sweep"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// Settlement variance above the merchant-discount range.
    HighDifference,
    /// Settlement credited more than the sales book expected.
    BankExceedsExpected,
    /// Settlement variance beyond any plausible discount.
    ExcessiveDifference,
    /// Aggregate bank fees disagree with the registry's fee postings.
    CommissionDifference,
    /// Amount agrees but the references do not.
    VerifyReference,
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewReason::HighDifference => write!(f, "Diferencia Alta"),
            ReviewReason::BankExceedsExpected => write!(f, "Monto Mayor en Banco"),
            ReviewReason::ExcessiveDifference => write!(f, "Diferencia Excesiva"),
            ReviewReason::CommissionDifference => write!(f, "Diferencia Comisiones"),
            ReviewReason::VerifyReference => write!(f, "Verificar Referencia"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconState {
    Matched,
    /// Booked internally, not (yet) seen on the statement.
    PendingInBank,
    /// Booked in a month before the statement's.
    PendingPriorMonth,
    /// Card batch close near the cutoff, expected on the next statement.
    PendingInTransit,
    /// Bank credit with no sales-book counterpart.
    PendingInLedger,
    /// Bank debit with no expense-registry counterpart.
    PendingInRegistry,
    NeedsReview(ReviewReason),
}

impl ReconState {
    pub fn is_matched(self) -> bool {
        self == ReconState::Matched
    }

    pub fn needs_review(self) -> bool {
        matches!(self, ReconState::NeedsReview(_))
    }

    /// Internal entries with no bank movement behind them.
    pub fn is_unbanked(self) -> bool {
        matches!(
            self,
            ReconState::PendingInBank | ReconState::PendingPriorMonth | ReconState::PendingInTransit
        )
    }
}

impl fmt::Display for ReconState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconState::Matched => write!(f, "Conciliado"),
            ReconState::PendingInBank => write!(f, "Pendiente en Banco"),
            ReconState::PendingPriorMonth => write!(f, "Pendiente - Mes Anterior"),
            ReconState::PendingInTransit => write!(f, "Pendiente - Pago en Transcurso"),
            ReconState::PendingInLedger => write!(f, "Pendiente en Libro"),
            ReconState::PendingInRegistry => write!(f, "Pendiente en SAINT"),
            ReconState::NeedsReview(reason) => write!(f, "Requiere Revisión - {reason}"),
        }
    }
}

/// One row of the unified output table. Built once by a matcher or the
/// residual sweep and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub date: Option<NaiveDate>,
    pub reference: String,
    pub description: String,
    /// `Cargo`: bank outflow.
    pub debit: Money,
    /// `Abono`: bank inflow.
    pub credit: Money,
    /// `SAE (Debe)`: amount the sales book expects.
    pub ledger_debit: Money,
    /// `SAINT (Haber)`: amount the expense registry expects.
    pub registry_credit: Money,
    pub state: ReconState,
    /// Control number or batch label.
    pub group: String,
    /// Keeps an auto-linked commission directly after its parent.
    pub order: u32,
    pub phase: Phase,
    /// Bank movement this row accounts for, if any.
    pub bank_row: Option<BankRowId>,
}

impl ReconciliationRecord {
    pub fn new(phase: Phase, state: ReconState, group: impl Into<String>) -> Self {
        ReconciliationRecord {
            date: None,
            reference: String::new(),
            description: String::new(),
            debit: Money::zero(),
            credit: Money::zero(),
            ledger_debit: Money::zero(),
            registry_credit: Money::zero(),
            state,
            group: group.into(),
            order: 0,
            phase,
            bank_row: None,
        }
    }

    pub fn dated(mut self, date: Option<NaiveDate>) -> Self {
        self.date = date;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn bank_debit(mut self, amount: Money) -> Self {
        self.debit = amount;
        self
    }

    pub fn bank_credit(mut self, amount: Money) -> Self {
        self.credit = amount;
        self
    }

    pub fn expected_in_ledger(mut self, amount: Money) -> Self {
        self.ledger_debit = amount;
        self
    }

    pub fn expected_in_registry(mut self, amount: Money) -> Self {
        self.registry_credit = amount;
        self
    }

    pub fn ordered(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn for_row(mut self, row: BankRowId) -> Self {
        self.bank_row = Some(row);
        self
    }

    /// Final table order: date (unknown dates last), then group, then the
    /// internal order key.
    pub fn output_order(&self, other: &Self) -> Ordering {
        self.date
            .is_none()
            .cmp(&other.date.is_none())
            .then_with(|| self.date.cmp(&other.date))
            .then_with(|| self.group.cmp(&other.group))
            .then_with(|| self.order.cmp(&other.order))
    }

    /// Cells in `OUTPUT_COLUMNS` order.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.date.map(format_date).unwrap_or_default(),
            self.reference.clone(),
            self.description.clone(),
            self.debit.to_string(),
            self.credit.to_string(),
            self.ledger_debit.to_string(),
            self.registry_credit.to_string(),
            self.state.to_string(),
            self.group.clone(),
        ]
    }
}
