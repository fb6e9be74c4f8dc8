use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

use conciliar_core::{
    parse_date, BankMovement, BankRowId, DateRange, MovementKind, YearMonth,
};

use crate::config::Markers;
use crate::input::{amount_cell, RawBankRow};

/// The bank statement after noise removal, with its reference dates.
#[derive(Debug, Clone, Default)]
pub struct PreparedLedger {
    pub movements: Vec<BankMovement>,
    /// Latest dated movement on the statement.
    pub cutoff: Option<NaiveDate>,
    /// Most frequent (year, month) among dated movements.
    pub dominant_month: Option<YearMonth>,
    /// Rows dropped as administrative noise.
    pub noise_rows: usize,
}

impl PreparedLedger {
    pub fn get(&self, id: BankRowId) -> Option<&BankMovement> {
        self.movements.get(id.0)
    }

    pub fn period(&self) -> Option<DateRange> {
        DateRange::spanning(self.movements.iter().filter_map(|m| m.date))
    }

    /// True when `date` belongs to a month before the statement's own.
    pub fn is_prior_month(&self, date: NaiveDate) -> bool {
        self.dominant_month
            .is_some_and(|month| month.follows_month_of(date))
    }
}

fn is_noise(row: &RawBankRow, markers: &Markers) -> bool {
    markers.is_noise_reference(&row.reference)
        || markers.noise_amount_text.is_match(&row.charge)
        || markers.noise_amount_text.is_match(&row.credit)
}

/// Strips administrative rows and computes the statement's cutoff date and
/// dominant month.
///
/// The dominant month is the mode rather than the cutoff's month so that a
/// few movements from an adjacent month at the statement edges do not move
/// the window. Ties resolve to the earliest month.
pub fn prepare(rows: Vec<RawBankRow>, markers: &Markers) -> PreparedLedger {
    let total = rows.len();
    let movements: Vec<BankMovement> = rows
        .into_iter()
        .filter(|row| !is_noise(row, markers))
        .enumerate()
        .map(|(idx, row)| {
            let date = parse_date(&row.date);
            if date.is_none() {
                debug!(row = idx, raw = %row.date, "bank movement without a usable date");
            }
            BankMovement {
                id: BankRowId(idx),
                date,
                office: row.office.trim().to_string(),
                reference: row.reference.trim().to_string(),
                kind: MovementKind::parse(&row.kind),
                description: row.description,
                charge: amount_cell("banco", "Cargo", &row.charge),
                credit: amount_cell("banco", "Abono", &row.credit),
                balance: amount_cell("banco", "Saldo", &row.balance),
            }
        })
        .collect();

    let cutoff = movements.iter().filter_map(|m| m.date).max();

    let mut month_counts: BTreeMap<YearMonth, usize> = BTreeMap::new();
    for date in movements.iter().filter_map(|m| m.date) {
        *month_counts.entry(YearMonth::of(date)).or_default() += 1;
    }
    // Iteration is ascending, so keeping only strictly greater counts picks
    // the earliest month on ties.
    let dominant_month = month_counts
        .into_iter()
        .fold(None, |best: Option<(YearMonth, usize)>, (month, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((month, count)),
        })
        .map(|(month, _)| month);

    PreparedLedger {
        noise_rows: total - movements.len(),
        movements,
        cutoff,
        dominant_month,
    }
}
