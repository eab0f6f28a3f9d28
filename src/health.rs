use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Liveness report with the server's clock, used by callers to date-stamp quotes.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct HealthReport {
    pub ok: bool,
    /// RFC 2822, as sent in an HTTP `Date` header.
    pub server_time: String,
    /// Short display form, e.g. `Oct 18, 2026`.
    pub server_date: String,
}

impl HealthReport {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            ok: true,
            server_time: now.to_rfc2822(),
            server_date: now.format("%b %-d, %Y").to_string(),
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}
