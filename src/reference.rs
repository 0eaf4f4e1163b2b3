//! The trusted value the computed digits are checked against.

use std::path::Path;

use rug::{float::Constant, Float};
use tracing::debug;

use crate::error::{Error, Result};
use crate::pi::BITS_PER_DIGIT;

/// Digits beyond the request carried by [`Reference::mpfr`], so the reference
/// is never the limiting factor of the error bound.
const GUARD_DIGITS: u64 = 20;

#[derive(Debug, Clone)]
pub struct Reference {
    value: Float,
    digits: u64,
}

impl Reference {
    /// MPFR's own π, independent of the series evaluated here.
    pub fn mpfr(digits: u64) -> Self {
        let digits = digits + GUARD_DIGITS;
        let prec = (digits as f64 * BITS_PER_DIGIT + 16.) as u32;
        Self {
            value: Float::with_val(prec, Constant::Pi),
            digits,
        }
    }

    /// Parses decimal text such as `3.14159...`; leading and trailing
    /// whitespace of every line is dropped before the lines are joined.
    pub fn parse(text: &str) -> Result<Self> {
        let s: String = text.lines().map(str::trim).collect();
        if s.is_empty() {
            return Err(Error::ReferenceUnavailable("empty reference".into()));
        }
        let digits = s.chars().filter(char::is_ascii_digit).count() as u64;
        let prec = (s.len() as f64 * BITS_PER_DIGIT + 16.) as u32;
        let parsed = Float::parse(&s).map_err(|e| Error::ReferenceUnavailable(e.to_string()))?;
        let value = Float::with_val(prec, parsed);
        if !value.is_finite() {
            return Err(Error::ReferenceUnavailable(format!("not a finite number: {s}")));
        }
        debug!(digits, prec, "reference parsed");

        Ok(Self { value, digits })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ReferenceUnavailable(format!("{}: {e}", path.display())))?;
        Self::parse(&text)
    }

    pub fn value(&self) -> &Float {
        &self.value
    }

    /// Decimal digits the reference can vouch for.
    pub fn digits(&self) -> u64 {
        self.digits
    }
}
