//! Presentation helpers. Nothing in here is used between recurrence steps.

/// Currency units shown to callers.
pub const CENTS: u32 = 2;

/// Rounds half away from zero to `dec` decimal places.
pub fn round(amt: f64, dec: u32) -> f64 {
    if amt == 0. {
        // normalizes -0.0
        0.
    } else {
        let scale = 10_f64.powi(dec as i32);
        (amt * scale).round() / scale
    }
}

/// Formats an amount as US dollars with thousands separators, e.g. `$25,500.00`.
pub fn format_usd(amount: f64) -> String {
    let cents = round(amount, CENTS);
    let sign = if cents < 0. { "-" } else { "" };
    let fixed = format!("{:.2}", cents.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}${}.{}", sign, grouped, frac)
}
