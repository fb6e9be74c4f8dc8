use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

/// Position of a movement in the prepared bank ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BankRowId(pub usize);

impl fmt::Display for BankRowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl BankRowId {
    pub fn next(self) -> BankRowId {
        BankRowId(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    /// `NC`: money entering the account.
    CreditNote,
    /// `ND`: money leaving the account.
    DebitNote,
    Other(String),
}

impl MovementKind {
    pub fn parse(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "NC" => MovementKind::CreditNote,
            "ND" => MovementKind::DebitNote,
            _ => MovementKind::Other(code.trim().to_string()),
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementKind::CreditNote => write!(f, "NC"),
            MovementKind::DebitNote => write!(f, "ND"),
            MovementKind::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankMovement {
    pub id: BankRowId,
    pub date: Option<NaiveDate>,
    pub office: String,
    pub reference: String,
    pub kind: MovementKind,
    pub description: String,
    pub charge: Money,
    pub credit: Money,
    pub balance: Money,
}

impl BankMovement {
    pub fn is_credit_note(&self) -> bool {
        self.kind == MovementKind::CreditNote
    }

    pub fn is_debit_note(&self) -> bool {
        self.kind == MovementKind::DebitNote
    }

    /// True when the row moves money at all; balance-only rows do not.
    pub fn has_amount(&self) -> bool {
        !self.charge.is_zero() || !self.credit.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_kind_parse() {
        assert_eq!(MovementKind::parse("NC"), MovementKind::CreditNote);
        assert_eq!(MovementKind::parse(" nd "), MovementKind::DebitNote);
        assert_eq!(MovementKind::parse("XX"), MovementKind::Other("XX".to_string()));
        assert_eq!(MovementKind::parse("ND").to_string(), "ND");
    }

    #[test]
    fn has_amount_requires_a_nonzero_side() {
        let mut mv = BankMovement {
            id: BankRowId(0),
            date: None,
            office: String::new(),
            reference: String::new(),
            kind: MovementKind::CreditNote,
            description: String::new(),
            charge: Money::zero(),
            credit: Money::zero(),
            balance: Money::from_cents(100),
        };
        assert!(!mv.has_amount());
        mv.credit = Money::from_cents(1);
        assert!(mv.has_amount());
    }

    #[test]
    fn row_id_next() {
        assert_eq!(BankRowId(4).next(), BankRowId(5));
        assert_eq!(BankRowId(4).to_string(), "#4");
    }
}
