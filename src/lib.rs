//! π to any number of digits with Chudnovsky's series, evaluated by binary
//! splitting on top of GMP/MPFR through `rug`.

pub mod error;
pub mod factor;
pub mod pi;
pub mod reference;
pub mod sieve;
pub mod split;
pub mod sqrt;
pub mod task;

pub use error::{ArithmeticFault, Error, Result};
pub use pi::{compute, PiDigits, DEFAULT_DIGITS};
pub use reference::Reference;
pub use task::{Calculator, Event, Handle, Outcome};

/// Bitmask of extra logging for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics(u32);

impl Diagnostics {
    pub const NONE: Self = Self(0);
    /// Log √C, the computed value and the error bound.
    pub const SHOW_VALUES: Self = Self(1);
    /// Dump the sieve and every node's factorizations.
    pub const TRACE_SPLIT: Self = Self(2);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::SHOW_VALUES
    }
}
