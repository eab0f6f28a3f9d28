use log::{debug, warn};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, ValidationError};
use crate::format::{format_usd, round};
use crate::loan::{build_amortization_schedule, compute_monthly_payment, ScheduleRow};

/// Longest term accepted, in months.
pub const MAX_TERM_MONTHS: i64 = 600;

/// Largest dollar amount accepted for any single field. Keeps every derived amount finite.
pub const MAX_AMOUNT: f64 = 1e12;

/// Loan parameters as submitted by a caller. Amounts are in dollars, `apr` is a
/// percentage and `tax_rate` a fraction.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoanRequest {
    pub vehicle_price: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub down_payment: f64,
    pub apr: f64,
    pub term_months: i64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tax_rate: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub fees: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub trade_in_value: f64,
}

impl LoanRequest {
    /// Request with no down payment, fees, trade-in or tax.
    pub fn new(vehicle_price: f64, apr: f64, term_months: i64) -> Self {
        Self {
            vehicle_price,
            down_payment: 0.,
            apr,
            term_months,
            tax_rate: 0.,
            fees: 0.,
            trade_in_value: 0.,
        }
    }

    pub fn with_down_payment(mut self, down_payment: f64) -> Self {
        self.down_payment = down_payment;
        self
    }

    pub fn with_fees(mut self, fees: f64) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_trade_in(mut self, trade_in_value: f64) -> Self {
        self.trade_in_value = trade_in_value;
        self
    }

    pub fn with_tax_rate(mut self, tax_rate: f64) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    /// Checks every field and collects all violations.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if !self.vehicle_price.is_finite() {
            errors.push(FieldError::new("vehicle_price", "Vehicle price must be a finite number"));
        } else if self.vehicle_price <= 0. {
            errors.push(FieldError::new("vehicle_price", "Vehicle price must be greater than 0"));
        } else if self.vehicle_price > MAX_AMOUNT {
            errors.push(FieldError::new("vehicle_price", too_large("Vehicle price")));
        }

        check_non_negative(&mut errors, "down_payment", "Down payment", self.down_payment);

        if !(0. ..=100.).contains(&self.apr) {
            errors.push(FieldError::new("apr", "Interest rate must be between 0 and 100"));
        }

        if self.term_months <= 0 {
            errors.push(FieldError::new("term_months", "Loan term must be greater than 0"));
        } else if self.term_months > MAX_TERM_MONTHS {
            errors.push(FieldError::new(
                "term_months",
                format!("Loan term cannot exceed {} months", MAX_TERM_MONTHS),
            ));
        }

        if !(0. ..=1.).contains(&self.tax_rate) {
            errors.push(FieldError::new("tax_rate", "Tax rate must be between 0 and 1"));
        }

        check_non_negative(&mut errors, "fees", "Additional fees", self.fees);
        check_non_negative(&mut errors, "trade_in_value", "Trade-in value", self.trade_in_value);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors })
        }
    }

    /// Sales tax on the price net of trade-in.
    pub fn sales_tax(&self) -> f64 {
        (self.vehicle_price - self.trade_in_value).max(0.) * self.tax_rate
    }

    /// Principal left to finance after tax, fees, down payment and trade-in. Never negative.
    pub fn amount_financed(&self) -> f64 {
        (self.vehicle_price + self.sales_tax() + self.fees - self.down_payment - self.trade_in_value)
            .max(0.)
    }
}

// NaN fails the range check as well
fn check_non_negative(errors: &mut Vec<FieldError>, field: &'static str, label: &str, value: f64) {
    if !value.is_finite() {
        errors.push(FieldError::new(field, format!("{} must be a finite number", label)));
    } else if value < 0. {
        errors.push(FieldError::new(field, format!("{} cannot be negative", label)));
    } else if value > MAX_AMOUNT {
        errors.push(FieldError::new(field, too_large(label)));
    }
}

fn too_large(label: &str) -> String {
    format!("{} cannot exceed {}", label, format_usd(MAX_AMOUNT))
}

#[cfg(feature = "serde")]
impl LoanRequest {
    /// Decodes a request from JSON field by field. Missing or mistyped fields are
    /// reported as validation errors rather than parse failures; integral floats and
    /// numeric strings are accepted. Range checks are left to [`LoanRequest::validate`].
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ValidationError> {
        let Some(fields) = value.as_object() else {
            return Err(ValidationError {
                errors: vec![FieldError::new("request", "Request must be a JSON object")],
            });
        };

        let mut errors = Vec::new();
        let mut number = |field: &'static str, required: bool| match fields.get(field) {
            None if required => {
                errors.push(FieldError::new(field, "Field required"));
                0.
            }
            None => 0.,
            Some(v) => json_f64(v).unwrap_or_else(|| {
                errors.push(FieldError::new(field, "Input should be a valid number"));
                0.
            }),
        };

        let vehicle_price = number("vehicle_price", true);
        let down_payment = number("down_payment", false);
        let apr = number("apr", true);
        let tax_rate = number("tax_rate", false);
        let fees = number("fees", false);
        let trade_in_value = number("trade_in_value", false);

        let term_months = match fields.get("term_months") {
            None => {
                errors.push(FieldError::new("term_months", "Field required"));
                0
            }
            Some(v) => json_i64(v).unwrap_or_else(|| {
                errors.push(FieldError::new("term_months", "Input should be a valid integer"));
                0
            }),
        };

        if !errors.is_empty() {
            return Err(ValidationError { errors });
        }

        Ok(Self {
            vehicle_price,
            down_payment,
            apr,
            term_months,
            tax_rate,
            fees,
            trade_in_value,
        })
    }
}

#[cfg(feature = "serde")]
fn json_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(feature = "serde")]
fn json_i64(value: &serde_json::Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = json_f64(value)?;
    // whole numbers only, e.g. 60.0
    if f.fract() == 0. && f.abs() <= i64::MAX as f64 / 2. {
        Some(f as i64)
    } else {
        None
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Quote {
    pub amount_financed: f64,
    pub monthly_payment: f64,
    pub total_interest: f64,
    pub total_cost: f64,
    pub schedule: Vec<ScheduleRow>,
}

impl Quote {
    /// Copy of the quote with every amount rounded for display.
    pub fn rounded(&self, dec_places: u32) -> Self {
        Self {
            amount_financed: round(self.amount_financed, dec_places),
            monthly_payment: round(self.monthly_payment, dec_places),
            total_interest: round(self.total_interest, dec_places),
            total_cost: round(self.total_cost, dec_places),
            schedule: self.schedule.iter().map(|row| row.rounded(dec_places)).collect(),
        }
    }

    pub fn term_months(&self) -> usize {
        self.schedule.len()
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Amount financed: {}", format_usd(self.amount_financed))?;
        writeln!(f, "Monthly payment: {}", format_usd(self.monthly_payment))?;
        writeln!(f, "Total interest:  {}", format_usd(self.total_interest))?;
        write!(f, "Total cost:      {}", format_usd(self.total_cost))
    }
}

/// Prices a loan request. Fails only on invalid input; a fully offset loan yields an
/// all-zero quote with an empty schedule.
pub fn compute_quote(request: &LoanRequest) -> Result<Quote, ValidationError> {
    if let Err(e) = request.validate() {
        warn!("rejected loan request: {}", e);
        return Err(e);
    }

    let amount_financed = request.amount_financed();
    debug!(
        "sales tax {}, amount financed {}",
        request.sales_tax(),
        amount_financed
    );

    if amount_financed <= 0. {
        return Ok(Quote::default());
    }

    // validated to 1..=MAX_TERM_MONTHS
    let months = request.term_months as u32;
    let schedule = build_amortization_schedule(amount_financed, request.apr, months);
    let total_interest: f64 = schedule.iter().map(|row| row.interest).sum();

    Ok(Quote {
        amount_financed,
        monthly_payment: compute_monthly_payment(amount_financed, request.apr, months),
        total_interest,
        total_cost: amount_financed + total_interest,
        schedule,
    })
}

#[cfg(test)]
mod tests {
    use super::{compute_quote, LoanRequest, Quote, MAX_AMOUNT, MAX_TERM_MONTHS};
    use crate::format::round;
    use approx::assert_abs_diff_eq;
    use test_log::test;

    fn dealer_example() -> LoanRequest {
        LoanRequest::new(30000., 6., 60)
            .with_fees(500.)
            .with_down_payment(5000.)
    }

    #[test]
    fn test_amount_financed() {
        assert_eq!(dealer_example().amount_financed(), 25500.);

        let taxed = LoanRequest::new(20000., 3., 60)
            .with_down_payment(2000.)
            .with_fees(500.)
            .with_tax_rate(0.07);
        assert_abs_diff_eq!(taxed.sales_tax(), 1400., epsilon = 1e-9);
        assert_abs_diff_eq!(taxed.amount_financed(), 19900., epsilon = 1e-9);

        // tax applies to price net of trade-in only
        let traded = LoanRequest::new(20000., 3., 60)
            .with_trade_in(5000.)
            .with_tax_rate(0.1);
        assert_abs_diff_eq!(traded.sales_tax(), 1500., epsilon = 1e-9);
        assert_abs_diff_eq!(traded.amount_financed(), 16500., epsilon = 1e-9);

        let offset = LoanRequest::new(10000., 5., 60).with_trade_in(15000.).with_tax_rate(0.07);
        assert_eq!(offset.sales_tax(), 0.);
        assert_eq!(offset.amount_financed(), 0.);
    }

    #[test]
    fn test_dealer_example_quote() {
        let quote = compute_quote(&dealer_example()).unwrap();

        assert_eq!(quote.amount_financed, 25500.);
        assert_eq!(round(quote.monthly_payment, 2), 492.99);
        assert_eq!(round(quote.total_interest, 2), 4079.19);
        assert_eq!(round(quote.total_cost, 2), 29579.19);
        assert_eq!(quote.schedule.len(), 60);
        assert_abs_diff_eq!(quote.schedule[0].interest, 127.5, epsilon = 1e-9);
        assert_eq!(quote.schedule[59].balance, 0.);
    }

    #[test]
    fn test_taxed_quote() {
        let request = LoanRequest::new(20000., 3., 60)
            .with_down_payment(2000.)
            .with_fees(500.)
            .with_tax_rate(0.07);
        let quote = compute_quote(&request).unwrap().rounded(2);

        assert_eq!(quote.amount_financed, 19900.);
        assert_eq!(quote.monthly_payment, 357.58);
        assert_eq!(quote.total_interest, 1554.62);
        assert_eq!(quote.total_cost, 21454.62);

        let first = quote.schedule[0];
        assert_eq!(first.month, 1);
        assert_eq!(first.payment, quote.monthly_payment);
        assert_eq!(first.principal, 307.83);
        assert_eq!(first.interest, 49.75);
        assert_eq!(first.balance, 19592.17);
        assert_eq!(quote.schedule[59].month, 60);
        assert_eq!(quote.schedule[59].balance, 0.);
    }

    #[test]
    fn test_quote_totals_match_schedule() {
        let requests = [
            dealer_example(),
            LoanRequest::new(45999.99, 17.25, 84).with_tax_rate(0.0825).with_fees(899.),
            LoanRequest::new(120000., 8., 180).with_down_payment(20000.).with_trade_in(15000.),
            LoanRequest::new(2500., 100., 12),
            LoanRequest::new(60000., 4.5, MAX_TERM_MONTHS),
        ];

        for request in &requests {
            let quote = compute_quote(request).unwrap();
            let months = request.term_months as usize;
            assert_eq!(quote.schedule.len(), months);
            assert_abs_diff_eq!(quote.schedule[months - 1].balance, 0., epsilon = 1e-6);

            let principal_sum: f64 = quote.schedule.iter().map(|row| row.principal).sum();
            let interest_sum: f64 = quote.schedule.iter().map(|row| row.interest).sum();
            assert_abs_diff_eq!(principal_sum, quote.amount_financed, epsilon = 0.01 * months as f64);
            assert_eq!(interest_sum, quote.total_interest);
            assert_eq!(quote.total_cost, quote.amount_financed + quote.total_interest);
        }
    }

    #[test]
    fn test_zero_apr_quote() {
        let quote = compute_quote(&LoanRequest::new(10000., 0., 10)).unwrap();

        assert_eq!(quote.amount_financed, 10000.);
        assert_eq!(quote.monthly_payment, 1000.);
        assert_eq!(quote.total_interest, 0.);
        assert_eq!(quote.total_cost, 10000.);
        assert_eq!(quote.schedule.len(), 10);
        assert!(quote.schedule.iter().all(|row| row.interest == 0.));
        assert_eq!(quote.schedule[9].balance, 0.);
    }

    #[test]
    fn test_fully_offset_loan_is_empty_quote() {
        let by_trade_in = LoanRequest::new(10000., 5., 60).with_trade_in(15000.);
        let by_down_payment = LoanRequest::new(10000., 5., 60).with_fees(250.).with_down_payment(10250.);

        for request in &[by_trade_in, by_down_payment] {
            let quote = compute_quote(request).unwrap();
            assert_eq!(quote, Quote::default());
            assert!(quote.schedule.is_empty());
            assert_eq!(quote.term_months(), 0);
        }
    }

    #[test]
    fn test_apr_out_of_range() {
        let err = compute_quote(&LoanRequest::new(10000., 150., 60)).unwrap_err();
        assert_eq!(err.fields(), vec!["apr"]);
        assert_eq!(err.errors[0].message, "Interest rate must be between 0 and 100");

        let err = compute_quote(&LoanRequest::new(10000., -1., 60)).unwrap_err();
        assert!(err.has_field("apr"));

        assert!(compute_quote(&LoanRequest::new(10000., 100., 60)).is_ok());
        assert!(compute_quote(&LoanRequest::new(10000., f64::NAN, 60)).is_err());
    }

    #[test]
    fn test_term_validation() {
        let err = compute_quote(&LoanRequest::new(10000., 5., 0)).unwrap_err();
        assert_eq!(err.fields(), vec!["term_months"]);

        let err = compute_quote(&LoanRequest::new(10000., 5., -12)).unwrap_err();
        assert_eq!(err.fields(), vec!["term_months"]);

        let err = compute_quote(&LoanRequest::new(10000., 5., MAX_TERM_MONTHS + 1)).unwrap_err();
        assert_eq!(err.errors[0].message, "Loan term cannot exceed 600 months");
    }

    #[test]
    fn test_reports_every_violation() {
        let request = LoanRequest {
            vehicle_price: 0.,
            down_payment: -1.,
            apr: 101.,
            term_months: 0,
            tax_rate: 1.5,
            fees: -20.,
            trade_in_value: f64::INFINITY,
        };
        let err = compute_quote(&request).unwrap_err();

        assert_eq!(
            err.fields(),
            vec![
                "vehicle_price",
                "down_payment",
                "apr",
                "term_months",
                "tax_rate",
                "fees",
                "trade_in_value"
            ]
        );
        assert_eq!(err.errors[6].message, "Trade-in value must be a finite number");
        assert!(err
            .to_string()
            .starts_with("invalid loan request: vehicle_price: Vehicle price must be greater than 0; "));
    }

    #[test]
    fn test_boundary_values_are_valid() {
        let request = LoanRequest::new(0.01, 0., 1).with_tax_rate(1.);
        let quote = compute_quote(&request).unwrap();
        assert_eq!(quote.schedule.len(), 1);
        assert_abs_diff_eq!(quote.schedule[0].payment, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_compute_quote_is_idempotent() {
        let request = LoanRequest::new(45999.99, 17.25, 84).with_tax_rate(0.0825).with_fees(899.);
        let first = compute_quote(&request).unwrap();
        let second = compute_quote(&request).unwrap();

        assert_eq!(first, second);
        for (a, b) in first.schedule.iter().zip(&second.schedule) {
            assert_eq!(a.balance.to_bits(), b.balance.to_bits());
            assert_eq!(a.payment.to_bits(), b.payment.to_bits());
        }
    }

    #[test]
    fn test_quote_display() {
        let quote = compute_quote(&dealer_example()).unwrap();
        assert_eq!(
            quote.to_string(),
            "Amount financed: $25,500.00\n\
             Monthly payment: $492.99\n\
             Total interest:  $4,079.19\n\
             Total cost:      $29,579.19"
        );
    }

    #[test]
    fn test_oversized_amounts_are_rejected() {
        let err = compute_quote(&LoanRequest::new(1.5e308, 6., 60).with_tax_rate(0.5)).unwrap_err();
        assert_eq!(err.fields(), vec!["vehicle_price"]);
        assert_eq!(
            err.errors[0].message,
            "Vehicle price cannot exceed $1,000,000,000,000.00"
        );

        let err = compute_quote(&LoanRequest::new(30000., 6., 60).with_fees(1e300)).unwrap_err();
        assert_eq!(err.fields(), vec!["fees"]);
    }

    #[test]
    fn test_largest_amounts_stay_finite() {
        let request = LoanRequest::new(MAX_AMOUNT, 100., 1)
            .with_fees(MAX_AMOUNT)
            .with_tax_rate(1.);
        let quote = compute_quote(&request).unwrap();

        assert!(quote.amount_financed.is_finite());
        assert!(quote.total_cost.is_finite());
        assert!(quote.schedule.iter().all(|row| row.payment.is_finite()
            && row.principal.is_finite()
            && row.interest.is_finite()));
        assert_eq!(quote.schedule[0].balance, 0.);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_request_from_json() {
        let value = serde_json::json!({
            "vehicle_price": 20000,
            "down_payment": "2000",
            "apr": 3.0,
            "term_months": 60.0,
            "tax_rate": 0.07
        });
        let request = LoanRequest::from_json(&value).unwrap();

        assert_eq!(
            request,
            LoanRequest::new(20000., 3., 60)
                .with_down_payment(2000.)
                .with_tax_rate(0.07)
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_request_from_json_reports_missing_and_mistyped_fields() {
        let err = LoanRequest::from_json(&serde_json::json!({
            "vehicle_price": 20000,
            "term_months": 60
        }))
        .unwrap_err();
        assert_eq!(err.fields(), vec!["apr"]);
        assert_eq!(err.errors[0].message, "Field required");

        let err = LoanRequest::from_json(&serde_json::json!({
            "vehicle_price": "twenty thousand",
            "apr": 5,
            "term_months": 60.5,
            "fees": null
        }))
        .unwrap_err();
        assert_eq!(err.fields(), vec!["vehicle_price", "fees", "term_months"]);
        assert_eq!(err.errors[2].message, "Input should be a valid integer");

        let err = LoanRequest::from_json(&serde_json::json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.fields(), vec!["request"]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_request_defaults_from_json() {
        let request: LoanRequest =
            serde_json::from_str(r#"{"vehicle_price": 20000, "down_payment": 2000, "apr": 3.0, "term_months": 60}"#)
                .unwrap();
        assert_eq!(request, LoanRequest::new(20000., 3., 60).with_down_payment(2000.));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_validation_error_payload() {
        let err = compute_quote(&LoanRequest::new(10000., 150., 60)).unwrap_err();
        let payload = serde_json::to_value(&err).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({
                "errors": [{"field": "apr", "message": "Interest rate must be between 0 and 100"}]
            })
        );
    }
}
