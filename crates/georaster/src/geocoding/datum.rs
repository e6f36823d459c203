//! Geodetic reference datums.
use std::borrow::Cow;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A named reference ellipsoid against which geographic positions are expressed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Datum {
    name: Cow<'static, str>,
    /// Semi-major axis in metres.
    semi_major: f64,
    /// Inverse flattening `1/f`.
    inverse_flattening: f64,
}

impl Datum {
    pub const WGS84: Datum = Datum {
        name: Cow::Borrowed("WGS84"),
        semi_major: 6_378_137.0,
        inverse_flattening: 298.257_223_563,
    };

    pub const WGS72: Datum = Datum {
        name: Cow::Borrowed("WGS72"),
        semi_major: 6_378_135.0,
        inverse_flattening: 298.26,
    };

    pub fn new(name: impl Into<Cow<'static, str>>, semi_major: f64, inverse_flattening: f64) -> Self {
        Self {
            name: name.into(),
            semi_major,
            inverse_flattening,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn semi_major(&self) -> f64 {
        self.semi_major
    }

    pub fn inverse_flattening(&self) -> f64 {
        self.inverse_flattening
    }

    /// Semi-minor axis in metres.
    pub fn semi_minor(&self) -> f64 {
        self.semi_major * (1.0 - 1.0 / self.inverse_flattening)
    }
}

impl Default for Datum {
    fn default() -> Self {
        Datum::WGS84
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
