//! Three-way reconciliation of a bank statement against a sales book and an
//! expense registry.
//!
//! Bank rows are matched in fixed phases (mobile payments, transfers, card
//! settlements, expenses) and whatever remains is swept into pending
//! states. A row claimed by one phase is never revisited by a later one.

pub mod audit;
pub mod channel;
pub mod claims;
pub mod config;
pub mod engine;
pub mod error;
pub mod expense;
pub mod input;
pub mod matcher;
pub mod prepare;
pub mod report;
pub mod settlement;
pub mod sweep;

pub use audit::AuditReport;
pub use claims::ClaimSet;
pub use config::{ConfigError, EngineConfig, MarkerConfig, Markers, SettlementConfig};
pub use engine::{reconcile, Reconciler, Reconciliation};
pub use error::ReconcileError;
pub use matcher::{MatchContext, Matcher};
pub use prepare::PreparedLedger;
pub use report::{ReconciliationSummary, ReconciliationTable, SideTotals};
