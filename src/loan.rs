use log::trace;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::format::round;

const MONTHS_PER_YEAR: f64 = 12.;

/// One period of an amortization schedule.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScheduleRow {
    pub month: u32,
    pub payment: f64,
    pub principal: f64,
    pub interest: f64,
    pub balance: f64,
}

impl ScheduleRow {
    pub fn new(month: u32, payment: f64, principal: f64, interest: f64, balance: f64) -> Self {
        Self {
            month,
            payment,
            principal,
            interest,
            balance,
        }
    }

    /// Copy of the row rounded for display. Never feed the result back into the recurrence.
    pub fn rounded(&self, dec_places: u32) -> Self {
        Self {
            month: self.month,
            payment: round(self.payment, dec_places),
            principal: round(self.principal, dec_places),
            interest: round(self.interest, dec_places),
            balance: round(self.balance, dec_places),
        }
    }
}

impl fmt::Display for ScheduleRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "month {}, payment ${:.2}, principal ${:.2}, interest ${:.2}, ending balance ${:.2}",
            self.month, self.payment, self.principal, self.interest, self.balance
        )
    }
}

/// Monthly periodic rate for a nominal APR given in percent (e.g. 6.0 for 6%).
pub fn monthly_rate(apr_percent: f64) -> f64 {
    apr_percent / 100. / MONTHS_PER_YEAR
}

/// Fixed payment that retires `principal` over `months` equal monthly payments.
///
/// A zero rate takes the straight-line branch; the annuity form is evaluated as
/// `P * r / (1 - (1 + r)^-n)` through `ln_1p`/`exp_m1`, which keeps full precision
/// when `r` is tiny.
pub fn compute_monthly_payment(principal: f64, apr_percent: f64, months: u32) -> f64 {
    if months == 0 {
        return 0.;
    }

    let rate = monthly_rate(apr_percent);
    if rate == 0. {
        return principal / f64::from(months);
    }

    // 1 - (1 + r)^-n
    let discount = -(-f64::from(months) * rate.ln_1p()).exp_m1();
    principal * rate / discount
}

/// Month-by-month breakdown of a fixed-payment loan.
///
/// The payment is computed once and held for the whole term. The last month pays off
/// exactly the remaining balance, so accumulated floating point drift never leaves a
/// residual.
pub fn build_amortization_schedule(
    principal: f64,
    apr_percent: f64,
    months: u32,
) -> Vec<ScheduleRow> {
    // also rejects NaN
    if months == 0 || !(principal > 0.) {
        return Vec::new();
    }

    let rate = monthly_rate(apr_percent);
    let pmt_amount = compute_monthly_payment(principal, apr_percent, months);

    let mut schedule = Vec::with_capacity(months as usize);
    let mut balance = principal;

    for month in 1..=months {
        let interest = balance * rate;
        let mut payment = pmt_amount;
        let mut principal_paid = payment - interest;

        if month == months {
            principal_paid = balance;
            payment = principal_paid + interest;
        }

        balance = (balance - principal_paid).max(0.);
        trace!(
            "month {}, payment {}, principal {}, interest {}, end bal {}",
            month,
            payment,
            principal_paid,
            interest,
            balance
        );

        schedule.push(ScheduleRow::new(month, payment, principal_paid, interest, balance));
    }
    schedule
}
