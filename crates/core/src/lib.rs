pub mod bank;
pub mod expense;
pub mod money;
pub mod normalize;
pub mod period;
pub mod record;
pub mod sales;
pub mod table;

pub use bank::{BankMovement, BankRowId, MovementKind};
pub use expense::{ExpenseEntry, NoteType};
pub use money::Money;
pub use normalize::{
    clean_description, normalize_amount, normalize_reference, parse_date, tail, try_parse_amount,
    REFERENCE_TAIL_LEN,
};
pub use period::{business_days_between, format_date, is_business_day, DateRange, YearMonth};
pub use record::{
    Phase, ReconState, ReconciliationRecord, ReviewReason, OUTPUT_COLUMNS, UNRESOLVED_REFERENCE,
};
pub use sales::{PaymentLeg, SalesEntry};
pub use table::{Table, TableError};
