pub mod error;
pub mod format;
pub mod health;
pub mod loan;
pub mod presets;
pub mod quote;

pub use error::{FieldError, ValidationError};
pub use loan::{build_amortization_schedule, compute_monthly_payment, ScheduleRow};
pub use quote::{compute_quote, LoanRequest, Quote};
