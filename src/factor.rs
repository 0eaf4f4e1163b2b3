//! Sparse factorizations used to cancel common factors between split results
//! without computing GCDs of large integers.

use std::fmt;

use rug::{Assign, Integer};

use crate::error::{ArithmeticFault, Result};
use crate::sieve::Sieve;

/// Below this many entries a factorization is materialized by repeated
/// single-limb multiplication.
const SEQUENTIAL_FACTORS: usize = 32;

const INIT_FACTORS: usize = 32;

/// A positive integer stored as `(prime, exponent)` pairs, primes strictly
/// increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Factorization {
    factors: Vec<(u32, u32)>,
}

/// Buffers reused by the accumulator operations of one run.
#[derive(Debug, Default)]
pub struct Scratch {
    tmp: Factorization,
    mul: Factorization,
    gcd: Integer,
}

impl Factorization {
    pub fn new() -> Self {
        Self::with_capacity(INIT_FACTORS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            factors: Vec::with_capacity(capacity.max(INIT_FACTORS)),
        }
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn factors(&self) -> &[(u32, u32)] {
        &self.factors
    }

    fn reserve_total(&mut self, total: usize) {
        if self.factors.capacity() < total {
            self.factors.reserve(total - self.factors.len());
        }
    }

    /// self = base^exp, `base` odd and within the sieve.
    pub fn set_prime_power(&mut self, sieve: &Sieve, base: u32, exp: u32) {
        self.factors.clear();
        self.factors
            .extend(sieve.factors(base).map(|(p, e)| (p, e * exp)));
    }

    /// out = f * g
    pub fn multiply(out: &mut Self, f: &Self, g: &Self) {
        out.factors.clear();
        out.reserve_total(f.len() + g.len());

        let (f, g) = (&f.factors, &g.factors);
        let (mut i, mut j) = (0, 0);
        while i < f.len() && j < g.len() {
            let (fp, fe) = f[i];
            let (gp, ge) = g[j];
            if fp == gp {
                out.factors.push((fp, fe + ge));
                i += 1;
                j += 1;
            } else if fp < gp {
                out.factors.push((fp, fe));
                i += 1;
            } else {
                out.factors.push((gp, ge));
                j += 1;
            }
        }
        out.factors.extend_from_slice(&f[i..]);
        out.factors.extend_from_slice(&g[j..]);
    }

    /// self *= g, merging into the scratch buffer and swapping it in.
    pub fn mul_assign(&mut self, g: &Self, scratch: &mut Scratch) {
        Self::multiply(&mut scratch.mul, self, g);
        std::mem::swap(self, &mut scratch.mul);
    }

    /// self *= base^exp
    pub fn mul_prime_power(&mut self, sieve: &Sieve, base: u32, exp: u32, scratch: &mut Scratch) {
        scratch.tmp.set_prime_power(sieve, base, exp);
        Self::multiply(&mut scratch.mul, self, &scratch.tmp);
        std::mem::swap(self, &mut scratch.mul);
    }

    /// Removes factors with exponent 0.
    pub fn compact(&mut self) {
        self.factors.retain(|&(_, e)| e > 0);
    }

    /// Lowers the exponent of the smallest prime by one.
    pub(crate) fn drop_smallest(&mut self) {
        if let Some((_, e)) = self.factors.first_mut() {
            *e -= 1;
        }
    }

    pub fn materialize(&self, r: &mut Integer) {
        product(&self.factors, r);
    }

    pub fn to_integer(&self) -> Integer {
        let mut r = Integer::new();
        self.materialize(&mut r);
        r
    }

    /// Divides `p` and `g` by the common part of `fp` and `fg`, leaving the two
    /// factorizations coprime.
    pub fn remove_common(
        p: &mut Integer,
        fp: &mut Self,
        g: &mut Integer,
        fg: &mut Self,
        scratch: &mut Scratch,
    ) -> Result<()> {
        let common = &mut scratch.mul;
        common.factors.clear();
        common.reserve_total(fp.len().min(fg.len()));

        let (mut i, mut j) = (0, 0);
        while i < fp.len() && j < fg.len() {
            let (pp, pe) = fp.factors[i];
            let (gp, ge) = fg.factors[j];
            if pp == gp {
                let c = pe.min(ge);
                fp.factors[i].1 -= c;
                fg.factors[j].1 -= c;
                common.factors.push((pp, c));
                i += 1;
                j += 1;
            } else if pp < gp {
                i += 1;
            } else {
                j += 1;
            }
        }

        if common.is_empty() {
            return Ok(());
        }

        common.materialize(&mut scratch.gcd);
        if scratch.gcd.is_zero() {
            return Err(ArithmeticFault::DivisionByZero.into());
        }
        p.div_exact_mut(&scratch.gcd);
        g.div_exact_mut(&scratch.gcd);
        fp.compact();
        fg.compact();
        Ok(())
    }
}

fn product(factors: &[(u32, u32)], r: &mut Integer) {
    if factors.len() <= SEQUENTIAL_FACTORS {
        r.assign(1);
        for &(p, e) in factors {
            for _ in 0..e {
                *r *= p;
            }
        }
    } else {
        let (lo, hi) = factors.split_at(factors.len() / 2);
        let mut r2 = Integer::new();
        product(lo, &mut r2);
        product(hi, r);
        *r *= &r2;
    }
}

impl fmt::Display for Factorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &(p, e) in &self.factors {
            if e == 1 {
                write!(f, "{p} ")?;
            } else {
                write!(f, "{p}^{e} ")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sieve::MIN_BOUND;

    fn of(sieve: &Sieve, n: u32) -> Factorization {
        let mut f = Factorization::new();
        f.set_prime_power(sieve, n, 1);
        f
    }

    #[test]
    fn prime_power_materializes() {
        let sieve = Sieve::new(MIN_BOUND);
        let mut f = Factorization::new();
        f.set_prime_power(&sieve, 45, 3);
        assert_eq!(f.factors(), &[(3, 6), (5, 3)]);
        assert_eq!(f.to_integer(), 45u32 * 45 * 45);

        f.set_prime_power(&sieve, 1, 7);
        assert!(f.is_empty());
        assert_eq!(f.to_integer(), 1);
    }

    #[test]
    fn multiply_matches_integer_product() {
        let sieve = Sieve::new(MIN_BOUND);
        let mut buf = Factorization::new();
        for (a, b) in [(9, 15), (10005, 7), (1, 33), (4999, 4999), (2187, 6561)] {
            let (f, g) = (of(&sieve, a), of(&sieve, b));
            Factorization::multiply(&mut buf, &f, &g);
            assert_eq!(buf.to_integer(), Integer::from(a) * b);

            let mut h = g.clone();
            h.mul_assign(&f, &mut Scratch::default());
            assert_eq!(h, buf, "{a} * {b} is not commutative");
        }
    }

    #[test]
    fn multiply_is_associative() {
        let sieve = Sieve::new(MIN_BOUND);
        let (f, g, h) = (of(&sieve, 135), of(&sieve, 77), of(&sieve, 3 * 7 * 11 * 13));
        let mut scratch = Scratch::default();

        let mut left = f.clone();
        left.mul_assign(&g, &mut scratch);
        left.mul_assign(&h, &mut scratch);

        let mut right = g.clone();
        right.mul_assign(&h, &mut scratch);
        let mut out = Factorization::new();
        Factorization::multiply(&mut out, &f, &right);

        assert_eq!(left, out);
    }

    #[test]
    fn balanced_materialize_of_many_primes() {
        let sieve = Sieve::new(MIN_BOUND);
        let mut scratch = Scratch::default();
        let mut f = Factorization::new();
        let mut expected = Integer::from(1);
        let primes = (3..400u32).step_by(2).filter(|&n| sieve.entry(n).factor == n);
        for p in primes {
            f.mul_prime_power(&sieve, p, 2, &mut scratch);
            expected *= p * p;
        }
        assert!(f.len() > SEQUENTIAL_FACTORS);
        assert_eq!(f.to_integer(), expected);
    }

    #[test]
    fn remove_common_leaves_coprime() {
        let sieve = Sieve::new(MIN_BOUND);
        let mut scratch = Scratch::default();

        let mut fp = of(&sieve, 3 * 3 * 5 * 7);
        fp.mul_prime_power(&sieve, 11, 2, &mut scratch);
        let mut fg = of(&sieve, 3 * 5 * 5 * 13);
        let mut p = fp.to_integer() * 4u32;
        let mut g = fg.to_integer();

        Factorization::remove_common(&mut p, &mut fp, &mut g, &mut fg, &mut scratch).unwrap();

        assert_eq!(p, Integer::from(3 * 7 * 121 * 4));
        assert_eq!(g, 5 * 13);
        assert_eq!(fp.factors(), &[(3, 1), (7, 1), (11, 2)]);
        assert_eq!(fg.factors(), &[(5, 1), (13, 1)]);
        assert_eq!(fp.to_integer().gcd(&fg.to_integer()), 1);
    }

    #[test]
    fn remove_common_without_overlap_is_noop() {
        let sieve = Sieve::new(MIN_BOUND);
        let mut scratch = Scratch::default();
        let (mut fp, mut fg) = (of(&sieve, 9), of(&sieve, 35));
        let (mut p, mut g) = (Integer::from(18), Integer::from(35));
        Factorization::remove_common(&mut p, &mut fp, &mut g, &mut fg, &mut scratch).unwrap();
        assert_eq!((p, g), (Integer::from(18), Integer::from(35)));
        assert_eq!(fp.factors(), &[(3, 2)]);
    }

    #[test]
    fn display_lists_powers() {
        let sieve = Sieve::new(MIN_BOUND);
        assert_eq!(of(&sieve, 3 * 3 * 5).to_string(), "3^2 5 ");
    }
}
