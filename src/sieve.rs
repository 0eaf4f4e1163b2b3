//! Smallest-prime-factor sieve over odd integers.
//!
//! Entry `n / 2` describes the odd number `n`: its smallest prime factor, the
//! power of that factor in `n`, and the index of the cofactor that remains
//! once that prime power is divided out. Following `next` until it reaches 0
//! (the entry for 1) yields the full factorization in increasing prime order.

use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SieveEntry {
    pub factor: u32,
    pub power: u32,
    pub next: u32,
}

pub struct Sieve {
    entries: Vec<SieveEntry>,
    bound: u32,
}

/// Smallest bound that still covers 3, 5, 23 and 29, the odd primes of C.
pub const MIN_BOUND: u32 = 3 * 5 * 23 * 29 + 1;

impl Sieve {
    pub fn new(bound: u32) -> Self {
        let n = bound as u64;
        let m = (n as f64).sqrt() as u64;
        let mut s = vec![SieveEntry::default(); (n / 2 + 1) as usize];

        s[0] = SieveEntry {
            factor: 1,
            power: 1,
            next: 0,
        };

        for i in (3..=n).step_by(2) {
            if s[(i / 2) as usize].factor != 0 {
                continue;
            }
            s[(i / 2) as usize].factor = i as u32;
            s[(i / 2) as usize].power = 1;

            if i > m {
                continue;
            }

            // k tracks the entry of the cofactor j / i
            let mut k = (i / 2) as usize;
            let mut j = i * i;
            while j <= n {
                let idx = (j / 2) as usize;
                if s[idx].factor == 0 {
                    s[idx].factor = i as u32;
                    if s[k].factor == i as u32 {
                        s[idx].power = s[k].power + 1;
                        s[idx].next = s[k].next;
                    } else {
                        s[idx].power = 1;
                        s[idx].next = k as u32;
                    }
                }
                j += 2 * i;
                k += 1;
            }
        }

        Self { entries: s, bound }
    }

    /// Sieve large enough for every odd factor met while splitting `terms` terms.
    pub fn for_terms(terms: u32) -> Self {
        Self::new(MIN_BOUND.max(terms * 6))
    }

    pub fn bound(&self) -> u32 {
        self.bound
    }

    pub fn entry(&self, n: u32) -> SieveEntry {
        self.entries[(n / 2) as usize]
    }

    /// Prime factorization of the odd number `n`, smallest prime first.
    pub fn factors(&self, n: u32) -> Factors<'_> {
        debug_assert!(n % 2 == 1 && n <= self.bound);
        Factors {
            entries: &self.entries,
            index: n / 2,
        }
    }

    pub fn dump(&self) {
        debug!("----- sieve -------");
        for (i, e) in self.entries.iter().enumerate() {
            debug!("{i}: {}, {}, {}", e.factor, e.power, e.next);
        }
        debug!("-------------------");
    }
}

pub struct Factors<'a> {
    entries: &'a [SieveEntry],
    index: u32,
}

impl Iterator for Factors<'_> {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index == 0 {
            return None;
        }
        let e = self.entries[self.index as usize];
        self.index = e.next;
        Some((e.factor, e.power))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_multiplies_back_to_n() {
        let sieve = Sieve::new(MIN_BOUND);
        for n in (1..=sieve.bound()).step_by(2) {
            let mut product = 1u64;
            let mut last = 0;
            for (p, e) in sieve.factors(n) {
                assert!(p > last, "primes of {n} are not increasing");
                last = p;
                product *= (p as u64).pow(e);
            }
            assert_eq!(product, n as u64);
        }
    }

    #[test]
    fn records_smallest_factor_and_power() {
        let sieve = Sieve::new(200);
        assert_eq!(sieve.entry(3).factor, 3);
        assert_eq!(sieve.entry(97).factor, 97);
        let e = sieve.entry(135); // 3^3 * 5
        assert_eq!((e.factor, e.power), (3, 3));
        assert_eq!(sieve.entry(e.next * 2 + 1).factor, 5);
        assert_eq!(sieve.factors(1).count(), 0);

        let sieve = Sieve::new(MIN_BOUND);
        assert_eq!(
            sieve.factors(10005).collect::<Vec<_>>(),
            [(3, 1), (5, 1), (23, 1), (29, 1)]
        );
    }

    #[test]
    fn sized_from_terms() {
        assert_eq!(Sieve::for_terms(1).bound(), MIN_BOUND);
        assert_eq!(Sieve::for_terms(10_000).bound(), 60_000);
    }
}
