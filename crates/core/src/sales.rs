use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// One settlement instrument of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLeg {
    /// Method code as printed in the sales book (`OTR`, `TRA`, `TJD`, ...).
    pub method: String,
    pub date: Option<NaiveDate>,
    pub reference: String,
    /// Counterpart bank name; empty when the book does not carry it.
    pub bank: String,
}

impl PaymentLeg {
    pub fn is_blank(&self) -> bool {
        self.method.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesEntry {
    pub control: String,
    pub total: Money,
    /// At most two legs, in book order.
    pub legs: Vec<PaymentLeg>,
}

impl SalesEntry {
    /// First leg satisfying `pred`; an invoice contributes one candidate per
    /// channel.
    pub fn first_leg<P>(&self, pred: P) -> Option<&PaymentLeg>
    where
        P: Fn(&PaymentLeg) -> bool,
    {
        self.legs.iter().find(|leg| pred(leg))
    }
}
