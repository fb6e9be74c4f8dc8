use tracing::{info, info_span};

use conciliar_core::{ExpenseEntry, SalesEntry, Table};

use crate::audit::AuditReport;
use crate::channel::ChannelMatcher;
use crate::claims::ClaimSet;
use crate::config::{EngineConfig, Markers};
use crate::error::ReconcileError;
use crate::expense::ExpenseMatcher;
use crate::input::{filter_sales_by_bank, read_bank_rows, read_expense_entries, read_sales_entries};
use crate::matcher::{MatchContext, Matcher};
use crate::prepare::{prepare, PreparedLedger};
use crate::report::ReconciliationTable;
use crate::settlement::SettlementMatcher;
use crate::sweep::ResidualSweep;

/// Result of one run.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub table: ReconciliationTable,
    pub audit: AuditReport,
    pub ledger: PreparedLedger,
}

/// Runs the phases in their fixed order over one set of inputs.
///
/// Holds no per-run state: every call builds its own `ClaimSet`, so one
/// `Reconciler` may serve any number of runs.
pub struct Reconciler {
    config: EngineConfig,
    markers: Markers,
    phases: Vec<Box<dyn Matcher + Send + Sync>>,
}

impl Reconciler {
    pub fn new(config: EngineConfig) -> Result<Self, ReconcileError> {
        config.validate()?;
        let markers = Markers::compile(&config.markers)?;
        let phases: Vec<Box<dyn Matcher + Send + Sync>> = vec![
            Box::new(ChannelMatcher::mobile()),
            Box::new(ChannelMatcher::transfer(&config)),
            Box::new(SettlementMatcher::new()),
            Box::new(ExpenseMatcher::new()),
            Box::new(ResidualSweep::new()),
        ];
        Ok(Self {
            config,
            markers,
            phases,
        })
    }

    /// Validates all three tables before any matching starts, so a missing
    /// column fails the run without partial output.
    pub fn run(
        &self,
        bank: &Table,
        sales: &Table,
        expenses: &Table,
    ) -> Result<Reconciliation, ReconcileError> {
        let bank_rows = read_bank_rows(bank)?;
        let mut sales = read_sales_entries(sales)?;
        let expenses = read_expense_entries(expenses, &self.markers)?;
        if let Some(filter) = &self.config.sales_bank_filter {
            sales = filter_sales_by_bank(sales, filter);
        }
        let ledger = prepare(bank_rows, &self.markers);
        Ok(self.run_prepared(ledger, &sales, &expenses))
    }

    pub fn run_prepared(
        &self,
        ledger: PreparedLedger,
        sales: &[SalesEntry],
        expenses: &[ExpenseEntry],
    ) -> Reconciliation {
        let ctx = MatchContext {
            ledger: &ledger,
            sales,
            expenses,
            config: &self.config,
            markers: &self.markers,
        };
        let mut claims = ClaimSet::new();
        let mut outputs = Vec::with_capacity(self.phases.len());
        for phase in &self.phases {
            let _span = info_span!("phase", name = %phase.phase()).entered();
            let claimed_before = claims.len();
            let records = phase.run(&ctx, &mut claims);
            info!(
                records = records.len(),
                claimed = claims.len() - claimed_before,
                "phase complete"
            );
            outputs.push(records);
        }

        let table = ReconciliationTable::assemble(outputs);
        let audit = AuditReport::build(&ledger, &claims, &table);
        info!(
            rows = table.len(),
            bank_rows = audit.bank_rows,
            consistent = audit.is_consistent(),
            "reconciliation complete"
        );
        Reconciliation {
            table,
            audit,
            ledger,
        }
    }
}

/// One-shot run with a fresh `Reconciler`.
pub fn reconcile(
    bank: &Table,
    sales: &Table,
    expenses: &Table,
    config: &EngineConfig,
) -> Result<Reconciliation, ReconcileError> {
    Reconciler::new(config.clone())?.run(bank, sales, expenses)
}
