use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default financing terms offered for a kind of vehicle.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Preset {
    pub apr: f64,
    pub term_years: u32,
}

impl Preset {
    pub fn term_months(&self) -> i64 {
        TermUnit::Years.to_months(i64::from(self.term_years))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VehicleType {
    Auto,
    Rv,
    Moto,
    Ski,
}

impl VehicleType {
    pub const ALL: [VehicleType; 4] = [
        VehicleType::Auto,
        VehicleType::Rv,
        VehicleType::Moto,
        VehicleType::Ski,
    ];

    pub fn preset(&self) -> Preset {
        match self {
            VehicleType::Auto => Preset { apr: 10., term_years: 5 },
            VehicleType::Rv => Preset { apr: 8., term_years: 15 },
            VehicleType::Moto => Preset { apr: 12., term_years: 5 },
            VehicleType::Ski => Preset { apr: 9., term_years: 3 },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VehicleType::Auto => "auto",
            VehicleType::Rv => "rv",
            VehicleType::Moto => "moto",
            VehicleType::Ski => "ski",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VehicleType::ALL
            .iter()
            .copied()
            .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown vehicle type '{}'", s))
    }
}

/// Unit a loan term was entered in.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TermUnit {
    #[default]
    Months,
    Years,
}

impl TermUnit {
    pub fn to_months(&self, term: i64) -> i64 {
        match self {
            TermUnit::Months => term,
            TermUnit::Years => term.saturating_mul(12),
        }
    }
}

impl FromStr for TermUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "months" | "month" | "m" => Ok(TermUnit::Months),
            "years" | "year" | "y" => Ok(TermUnit::Years),
            _ => Err(format!("unknown term unit '{}'", s)),
        }
    }
}
