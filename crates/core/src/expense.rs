use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteType {
    Ordinary,
    /// A posting that rolls up bank fees; compared in aggregate.
    BankCommission,
    /// A payment booked without a usable reference.
    UnidentifiedPayment,
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteType::Ordinary => write!(f, "ordinary"),
            NoteType::BankCommission => write!(f, "bank_commission"),
            NoteType::UnidentifiedPayment => write!(f, "unidentified_payment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub reference: String,
    pub counterparty: String,
    pub note_type: NoteType,
    pub amount: Money,
}

impl ExpenseEntry {
    pub fn is_commission(&self) -> bool {
        self.note_type == NoteType::BankCommission
    }
}
