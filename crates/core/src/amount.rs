use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::InvalidAmountError;

/// Largest amount a float input may carry while still naming an exact integer.
pub const MAX_SAFE_AMOUNT: i64 = 9_007_199_254_740_991;

/// Currencies in use have at most four minor-unit digits.
pub const MAX_MINOR_UNIT_EXPONENT: u32 = 4;

/// A validated, non-negative amount in the currency's minor unit (e.g. cents).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct MinorUnits(i64);

impl MinorUnits {
    pub const ZERO: Self = Self(0);

    pub fn new(value: i64) -> Result<Self, InvalidAmountError> {
        if value < 0 {
            return Err(InvalidAmountError::Negative { value: value.to_string() });
        }
        Ok(Self(value))
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Converts a decimal amount in major units (`"1000.00"` dollars) into
    /// minor units for a currency with `exponent` decimal places.
    pub fn from_major(value: Decimal, exponent: u32) -> Result<Self, InvalidAmountError> {
        if value < Decimal::ZERO {
            return Err(InvalidAmountError::Negative { value: value.to_string() });
        }
        if exponent > MAX_MINOR_UNIT_EXPONENT {
            return Err(InvalidAmountError::OutOfRange { value: value.to_string() });
        }

        let scale = Decimal::from(10_i64.pow(exponent));
        let scaled = value
            .checked_mul(scale)
            .ok_or_else(|| InvalidAmountError::OutOfRange { value: value.to_string() })?;
        if !scaled.fract().is_zero() {
            return Err(InvalidAmountError::PrecisionExceedsMinorUnit {
                value: value.to_string(),
                exponent,
            });
        }

        let minor = scaled
            .trunc()
            .to_i64()
            .ok_or_else(|| InvalidAmountError::OutOfRange { value: value.to_string() })?;
        Self::new(minor)
    }

    pub fn to_major(self, exponent: u32) -> Decimal {
        Decimal::new(self.0, exponent.min(MAX_MINOR_UNIT_EXPONENT))
    }
}

impl fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for MinorUnits {
    type Error = InvalidAmountError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MinorUnits> for i64 {
    fn from(value: MinorUnits) -> Self {
        value.0
    }
}

/// Raw host inputs accepted wherever the engine takes an amount.
pub trait IntoMinorUnits {
    fn into_minor_units(self) -> Result<MinorUnits, InvalidAmountError>;
}

impl IntoMinorUnits for MinorUnits {
    fn into_minor_units(self) -> Result<MinorUnits, InvalidAmountError> {
        Ok(self)
    }
}

impl IntoMinorUnits for i64 {
    fn into_minor_units(self) -> Result<MinorUnits, InvalidAmountError> {
        MinorUnits::new(self)
    }
}

impl IntoMinorUnits for i32 {
    fn into_minor_units(self) -> Result<MinorUnits, InvalidAmountError> {
        MinorUnits::new(i64::from(self))
    }
}

impl IntoMinorUnits for u32 {
    fn into_minor_units(self) -> Result<MinorUnits, InvalidAmountError> {
        MinorUnits::new(i64::from(self))
    }
}

impl IntoMinorUnits for u64 {
    fn into_minor_units(self) -> Result<MinorUnits, InvalidAmountError> {
        let value = i64::try_from(self)
            .map_err(|_| InvalidAmountError::OutOfRange { value: self.to_string() })?;
        MinorUnits::new(value)
    }
}

impl IntoMinorUnits for f64 {
    fn into_minor_units(self) -> Result<MinorUnits, InvalidAmountError> {
        if !self.is_finite() {
            return Err(InvalidAmountError::NotFinite);
        }
        if self < 0.0 {
            return Err(InvalidAmountError::Negative { value: self.to_string() });
        }
        if self.fract() != 0.0 {
            return Err(InvalidAmountError::Fractional { value: self.to_string() });
        }
        if self > MAX_SAFE_AMOUNT as f64 {
            return Err(InvalidAmountError::OutOfRange { value: self.to_string() });
        }
        MinorUnits::new(self as i64)
    }
}
