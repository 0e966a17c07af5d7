//! Physical units attached to streams and parameters.
//!
//! A `Unit` is an immutable tag. Values stay in the unit's base quantity
//! (volts, hertz, femtoseconds, ...) and are only scaled for display.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical quantity a value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Time, stored in femtoseconds.
    Femtoseconds,
    Hertz,
    Volts,
    Amps,
    Watts,
    Ohms,
    Microvolts,
    Microamps,
    /// Dimensionless integer count.
    Counts,
    /// Dimensionless count printed in scientific notation.
    CountsSci,
    SampleDepth,
    SampleRate,
    BitRate,
    Decibels,
    Dbm,
    Degrees,
    Celsius,
    /// Fraction, printed as percent.
    Percent,
    /// Unit intervals (fraction of a symbol period).
    UnitInterval,
    HexNumber,
    /// Spectral irradiance.
    WattsPerSquareMeterPerNanometer,
}

/// SI prefixes from femto to tera, paired with their scale.
const SI_PREFIXES: &[(f64, &str)] = &[
    (1e12, "T"),
    (1e9, "G"),
    (1e6, "M"),
    (1e3, "k"),
    (1.0, ""),
    (1e-3, "m"),
    (1e-6, "µ"),
    (1e-9, "n"),
    (1e-12, "p"),
    (1e-15, "f"),
];

impl Unit {
    /// Stable name used in persisted configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Unit::Femtoseconds => "fs",
            Unit::Hertz => "Hz",
            Unit::Volts => "V",
            Unit::Amps => "A",
            Unit::Watts => "W",
            Unit::Ohms => "Ω",
            Unit::Microvolts => "µV",
            Unit::Microamps => "µA",
            Unit::Counts => "counts",
            Unit::CountsSci => "counts_sci",
            Unit::SampleDepth => "pts",
            Unit::SampleRate => "S/s",
            Unit::BitRate => "b/s",
            Unit::Decibels => "dB",
            Unit::Dbm => "dBm",
            Unit::Degrees => "°",
            Unit::Celsius => "°C",
            Unit::Percent => "%",
            Unit::UnitInterval => "UI",
            Unit::HexNumber => "hex",
            Unit::WattsPerSquareMeterPerNanometer => "W/m²/nm",
        }
    }

    /// Inverse of [`Unit::name`].
    pub fn from_name(name: &str) -> Option<Unit> {
        Self::all().iter().copied().find(|u| u.name() == name)
    }

    pub fn all() -> &'static [Unit] {
        &[
            Unit::Femtoseconds,
            Unit::Hertz,
            Unit::Volts,
            Unit::Amps,
            Unit::Watts,
            Unit::Ohms,
            Unit::Microvolts,
            Unit::Microamps,
            Unit::Counts,
            Unit::CountsSci,
            Unit::SampleDepth,
            Unit::SampleRate,
            Unit::BitRate,
            Unit::Decibels,
            Unit::Dbm,
            Unit::Degrees,
            Unit::Celsius,
            Unit::Percent,
            Unit::UnitInterval,
            Unit::HexNumber,
            Unit::WattsPerSquareMeterPerNanometer,
        ]
    }

    /// Render a value with an SI prefix where the quantity takes one.
    pub fn pretty_print(&self, value: f64) -> String {
        match self {
            Unit::Femtoseconds => si_format(value * 1e-15, "s"),
            Unit::Microvolts => si_format(value * 1e-6, "V"),
            Unit::Microamps => si_format(value * 1e-6, "A"),
            Unit::Hertz
            | Unit::Volts
            | Unit::Amps
            | Unit::Watts
            | Unit::Ohms
            | Unit::SampleRate
            | Unit::BitRate
            | Unit::WattsPerSquareMeterPerNanometer => si_format(value, self.name()),
            Unit::SampleDepth => si_format(value, "pts"),
            Unit::Counts => {
                if value.fract() == 0.0 {
                    format!("{}", value as i64)
                } else {
                    trim_decimals(value)
                }
            }
            Unit::CountsSci => format!("{:.4e}", value),
            Unit::HexNumber => format!("0x{:x}", value as i64),
            Unit::Percent => format!("{} %", trim_decimals(value * 100.0)),
            Unit::Decibels | Unit::Dbm => format!("{:.2} {}", value, self.name()),
            Unit::Degrees | Unit::Celsius => format!("{}{}", trim_decimals(value), self.name()),
            Unit::UnitInterval => format!("{:.3} UI", value),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn si_format(value: f64, suffix: &str) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{} {}", value, suffix);
    }
    let magnitude = value.abs();
    let (scale, prefix) = SI_PREFIXES
        .iter()
        .copied()
        .find(|(scale, _)| magnitude >= *scale * 0.9999)
        .unwrap_or((1e-15, "f"));
    format!("{} {}{}", trim_decimals(value / scale), prefix, suffix)
}

/// Up to three decimals, trailing zeros removed.
fn trim_decimals(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
