use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rug::{Float, Integer};
use tracing::{info, info_span, warn};

use crate::error::{ArithmeticFault, Error, Result};
use crate::reference::Reference;
use crate::sieve::Sieve;
use crate::split::{depth_for, Splitter, PQG};
use crate::sqrt::SqrtScratch;
use crate::Diagnostics;

pub const A: u32 = 13591409;
pub const B: u32 = 545140134;
pub const C: u32 = 640320;
pub const D: u32 = 12;

pub const DIGITS_PER_TERM: f64 = 14.1816474627254776555;
pub const BITS_PER_DIGIT: f64 = 3.32192809488736234787;

pub const DEFAULT_DIGITS: u64 = 100;

/// Decimal digits of π with the distance to the reference value.
///
/// The value is `0.<mantissa> * 10^exponent`, and the reference differs from
/// it by less than `10^error_exponent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiDigits {
    pub digits: u64,
    pub mantissa: String,
    pub exponent: i32,
    pub error_exponent: i32,
}

impl PiDigits {
    /// Positional notation truncated to the requested number of decimals.
    pub fn to_decimal(&self) -> String {
        let mut s = if self.exponent > 0 {
            let (int, frac) = self
                .mantissa
                .split_at((self.exponent as usize).min(self.mantissa.len()));
            format!("{int}.{frac}")
        } else {
            format!("0.{}{}", "0".repeat(self.exponent.unsigned_abs() as usize), self.mantissa)
        };
        let point = s.find('.').unwrap_or(s.len());
        s.truncate(point + 1 + self.digits as usize); // remove possibly inaccurate numbers
        s
    }
}

impl fmt::Display for PiDigits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0.{}E{}\n\nError < 1E{}",
            self.mantissa, self.exponent, self.error_exponent
        )
    }
}

/// Number of series terms for `digits` decimal digits.
pub fn terms_for(digits: u64) -> u64 {
    (digits as f64 / DIGITS_PER_TERM) as u64
}

/// Float precision in bits for `digits` decimal digits.
pub fn precision_for(digits: u64) -> Result<u32> {
    let bits = digits as f64 * BITS_PER_DIGIT + 16.;
    if bits > f64::from(rug::float::prec_max()) {
        return Err(ArithmeticFault::InvalidPrecision {
            bits: bits as u64,
        }
        .into());
    }
    Ok(bits as u32)
}

/// Runs the binary splitting phase over `[0, terms)`.
///
/// With no terms the series is empty and the result is the identity triple.
pub fn split_series(
    terms: u64,
    cancel: &AtomicBool,
    on_progress: impl FnMut(u8),
    diagnostics: Diagnostics,
) -> Result<PQG> {
    if terms == 0 {
        return Ok((Integer::from(1), Integer::new(), Integer::from(1)));
    }

    let bound = terms.saturating_mul(6);
    if bound > u64::from(u32::MAX) {
        return Err(ArithmeticFault::SieveOverflow(bound).into());
    }

    let begin = Instant::now();
    let sieve = info_span!("sieve").in_scope(|| Sieve::for_terms(terms as u32));
    if diagnostics.contains(Diagnostics::TRACE_SPLIT) {
        sieve.dump();
    }
    info!(elapsed_ms = begin.elapsed().as_millis(), bound = sieve.bound(), "sieve built");

    let begin = Instant::now();
    let pqg = info_span!("bs", terms).in_scope(|| {
        Splitter::new(&sieve, terms, cancel, on_progress, diagnostics).binary_split(0, terms)
    })?;
    info!(elapsed_ms = begin.elapsed().as_millis(), "binary splitting done");

    // the sieve goes before the float phase starts
    drop(sieve);

    Ok(pqg)
}

/// Computes `digits` decimal digits of π and compares them with `reference`.
pub fn compute(
    digits: u64,
    diagnostics: Diagnostics,
    reference: &Reference,
    cancel: &AtomicBool,
    on_progress: impl FnMut(u8),
) -> Result<PiDigits> {
    if digits == 0 {
        return Err(Error::InvalidDigits);
    }
    let prec = precision_for(digits)?;
    let terms = terms_for(digits);
    info!(terms, depth = depth_for(terms), prec, "sizing");

    if digits >= reference.digits() {
        warn!(
            digits,
            reference_digits = reference.digits(),
            "requested digits exceed the reference, \
             the error bound is only as good as the reference"
        );
    }

    let start = Instant::now();
    let (mut p, mut q, _) = split_series(terms, cancel, on_progress, diagnostics)?;
    check_cancel(cancel)?;

    /*
         p*(C/D)*sqrt(C)
    pi = -----------------
            (q+A*p)
    */
    let begin = Instant::now();
    let psize = decimal_size(&p);
    let qsize = decimal_size(&q);

    q += &p * A;
    p *= C / D;

    let p_float = Float::with_val(prec, p);
    let mut q_float = Float::with_val(prec, q);
    info!(elapsed_ms = begin.elapsed().as_millis(), "init done");

    let begin = Instant::now();
    if q_float.is_zero() {
        return Err(ArithmeticFault::DivisionByZero.into());
    }
    q_float = &p_float / q_float;
    info!(elapsed_ms = begin.elapsed().as_millis(), "div done");
    check_cancel(cancel)?;

    let begin = Instant::now();
    let mut sqrt_c = p_float;
    info_span!("sqrt").in_scope(|| SqrtScratch::new().sqrt_u(&mut sqrt_c, C));
    info!(elapsed_ms = begin.elapsed().as_millis(), "sqrt done");
    if diagnostics.contains(Diagnostics::SHOW_VALUES) {
        let (_, s, exp) = sqrt_c.to_sign_string_exp(10, Some(digits as usize + 2));
        info!("sqrt(C)=0.{s}E{}", exp.unwrap_or(0));
    }
    check_cancel(cancel)?;

    let begin = Instant::now();
    q_float *= sqrt_c;
    info!(elapsed_ms = begin.elapsed().as_millis(), "mul done");
    check_cancel(cancel)?;

    info!(
        "P size={psize} digits ({:.6})   Q size={qsize} digits ({:.6})",
        psize as f64 / digits as f64,
        qsize as f64 / digits as f64
    );

    let begin = Instant::now();
    let (_, mantissa, exponent) = q_float.to_sign_string_exp(10, Some(digits as usize + 2));
    let exponent = exponent.unwrap_or(0);
    info!(elapsed_ms = begin.elapsed().as_millis(), "convert done");
    info!(elapsed_ms = start.elapsed().as_millis(), "total");

    let error_exponent = error_exponent(reference.value(), &q_float, digits);
    if diagnostics.contains(Diagnostics::SHOW_VALUES) {
        info!("pi(0,{terms})=0.{mantissa}E{exponent}");
        info!("|ref value - computed value| < 1E{error_exponent}");
    }

    Ok(PiDigits {
        digits,
        mantissa,
        exponent,
        error_exponent,
    })
}

/// Decimal exponent of `|reference - value|`, i.e. the smallest `e` with the
/// difference below `10^e` at the resolution of `digits + 2` digits.
///
/// An exact match carries no magnitude of its own; it is reported one step
/// below the last formatted digit. A NaN or infinite difference bounds
/// nothing and is reported as `i32::MAX`.
pub fn error_exponent(reference: &Float, value: &Float, digits: u64) -> i32 {
    let prec = value.prec().max(reference.prec());
    let mut diff = Float::with_val(prec, reference - value);
    diff.abs_mut();

    if diff.is_zero() {
        return -i32::try_from(digits + 2).unwrap_or(i32::MAX);
    }
    if !diff.is_finite() {
        return i32::MAX;
    }
    let (_, _, exp) = diff.to_sign_string_exp(10, Some(digits as usize + 2));
    exp.unwrap_or(i32::MAX)
}

fn check_cancel(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Approximate number of decimal digits of `n`, at most one too large.
fn decimal_size(n: &Integer) -> u64 {
    (f64::from(n.significant_bits()) * std::f64::consts::LOG10_2) as u64 + 1
}
