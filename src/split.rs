use std::sync::atomic::{AtomicBool, Ordering};

use rug::{
    ops::{NegAssign, PowAssign},
    Assign, Integer,
};
use tracing::debug;

use crate::error::{Error, Result};
use crate::factor::{Factorization, Scratch};
use crate::pi::{A, B, C};
use crate::sieve::Sieve;
use crate::Diagnostics;

/// Share of the range handed to the left subtree. Leaves get more expensive
/// as b grows, so the split leans right.
const SPLIT_RATIO: f64 = 0.5224;

/// Shallowest level at which common factors are removed before combining.
const GCD_LEVEL: usize = 4;

pub type PQG = (Integer, Integer, Integer);

/// Working state of one recursion level.
#[derive(Default)]
struct Slot {
    p: Integer,
    q: Integer,
    g: Integer,
    fp: Factorization,
    fg: Factorization,
}

/// Turns leaf indices into deduplicated whole percentages.
#[derive(Debug, Clone)]
pub struct Progress {
    terms: u64,
    last_leaf: u64,
    last_pct: u8,
}

impl Progress {
    pub fn new(terms: u64) -> Self {
        Self {
            terms,
            last_leaf: 0,
            last_pct: 0,
        }
    }

    /// Percentage to publish after finishing leaf `b`, if it moved.
    pub fn observe(&mut self, b: u64) -> Option<u8> {
        if b <= self.last_leaf || self.terms == 0 {
            return None;
        }
        self.last_leaf = b;
        let pct = (b.min(self.terms) * 100 / self.terms) as u8;
        if pct > self.last_pct {
            self.last_pct = pct;
            Some(pct)
        } else {
            None
        }
    }
}

/// Depth-indexed arena for one binary splitting run.
pub struct Splitter<'a, F> {
    sieve: &'a Sieve,
    slots: Vec<Slot>,
    scratch: Scratch,
    progress: Progress,
    cancel: &'a AtomicBool,
    on_progress: F,
    diagnostics: Diagnostics,
}

/// Number of slots needed to split `terms` terms.
pub fn depth_for(terms: u64) -> usize {
    let mut depth = 0;
    while (1u64 << depth) < terms {
        depth += 1;
    }
    depth + 2
}

impl<'a, F: FnMut(u8)> Splitter<'a, F> {
    pub fn new(
        sieve: &'a Sieve,
        terms: u64,
        cancel: &'a AtomicBool,
        on_progress: F,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            sieve,
            slots: (0..depth_for(terms)).map(|_| Slot::default()).collect(),
            scratch: Scratch::default(),
            progress: Progress::new(terms),
            cancel,
            on_progress,
            diagnostics,
        }
    }

    /// Evaluates the series over `[from, to)`. Consumes the splitter so the
    /// stacks are released as soon as the root result is taken out.
    pub fn binary_split(mut self, from: u64, to: u64) -> Result<PQG> {
        debug_assert!(to > from, "empty range {from}..{to}");
        self._bs(from, to, false, 0, 0)?;
        let root = self.slots.swap_remove(0);

        Ok((root.p, root.q, root.g))
    }

    fn _bs(&mut self, a: u64, b: u64, gflag: bool, level: usize, top: usize) -> Result<()> {
        if b - a == 1 {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            self.leaf(b, top);
        } else {
            let m = (a as f64 + (b - a) as f64 * SPLIT_RATIO) as u64; // tuning parameter

            self._bs(a, m, true, level + 1, top)?;

            self._bs(m, b, gflag, level + 1, top + 1)?;

            #[rustfmt::skip]
            let [left, right] = &mut self.slots[top..=top + 1] else { unreachable!() };

            let root = level == 0 && self.diagnostics.contains(Diagnostics::TRACE_SPLIT);
            if root {
                log_sizes("before gcd", left, right);
            }

            if level >= GCD_LEVEL {
                Factorization::remove_common(
                    &mut right.p,
                    &mut right.fp,
                    &mut left.g,
                    &mut left.fg,
                    &mut self.scratch,
                )?;
            }

            /*
            p(a,b) = p(a,m) * p(m,b)
            q(a,b) = q(a,m) * p(m,b) + q(m,b) * g(a,m)
            g(a,b) = g(a,m) * g(m,b)
            */
            left.p *= &right.p;

            left.q *= &right.p;
            right.q *= &left.g;
            left.q += &right.q;

            left.fp.mul_assign(&right.fp, &mut self.scratch);

            if gflag {
                left.g *= &right.g;
                left.fg.mul_assign(&right.fg, &mut self.scratch);
            }

            if root {
                log_sizes("after combine", left, right);
            }
        }

        if self.diagnostics.contains(Diagnostics::TRACE_SPLIT) {
            let slot = &self.slots[top];
            debug!("p({a}, {b})={}", slot.fp);
            if gflag {
                debug!("g({a}, {b})={}", slot.fg);
            }
        }

        Ok(())
    }

    fn leaf(&mut self, b: u64, top: usize) {
        /*
          g(b-1,b) = (6b-5)(2b-1)(6b-1)
          p(b-1,b) = b^3 * C^3 / 24
          q(b-1,b) = (-1)^b*g(b-1,b)*(A+Bb).
        */
        let slot = &mut self.slots[top];

        slot.p.assign(b);
        slot.p.pow_assign(3);
        slot.p *= (C / 24) * (C / 24);
        slot.p *= C * 24;

        slot.g.assign(2 * b - 1);
        slot.g *= 6 * b - 1;
        slot.g *= 6 * b - 5;

        slot.q.assign(b);
        slot.q *= B;
        slot.q += A;
        slot.q *= &slot.g;

        if b % 2 == 1 {
            slot.q.neg_assign();
        }

        // the sieve only knows odd numbers, so FP tracks the odd part of p
        let odd = (b >> b.trailing_zeros()) as u32;
        let b = b as u32;
        slot.fp.set_prime_power(self.sieve, odd, 3);
        slot.fp
            .mul_prime_power(self.sieve, 3 * 5 * 23 * 29, 3, &mut self.scratch);
        slot.fp.drop_smallest(); // C^3 / 24 keeps only 3^2

        slot.fg.set_prime_power(self.sieve, 2 * b - 1, 1);
        slot.fg
            .mul_prime_power(self.sieve, 6 * b - 1, 1, &mut self.scratch);
        slot.fg
            .mul_prime_power(self.sieve, 6 * b - 5, 1, &mut self.scratch);

        if let Some(pct) = self.progress.observe(b as u64) {
            (self.on_progress)(pct);
        }
    }
}

fn log_sizes(stage: &str, left: &Slot, right: &Slot) {
    debug!(
        stage,
        p_left_bits = left.p.significant_bits(),
        q_left_bits = left.q.significant_bits(),
        g_left_bits = left.g.significant_bits(),
        p_right_bits = right.p.significant_bits(),
        q_right_bits = right.q.significant_bits(),
        "root operands"
    );
}
