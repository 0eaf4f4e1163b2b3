use rug::{ops::SubFrom, Assign, Float};

/// Significand bits of an `f64`.
pub const DOUBLE_PREC: u32 = 53;

/// Newton square root with working precision doubling at every step.
///
/// The two scratch floats are reused between calls; their precision is reset
/// on entry so nothing carries over from a previous call.
pub struct SqrtScratch {
    t1: Float,
    t2: Float,
}

impl Default for SqrtScratch {
    fn default() -> Self {
        Self::new()
    }
}

impl SqrtScratch {
    pub fn new() -> Self {
        Self {
            t1: Float::new(DOUBLE_PREC),
            t2: Float::new(DOUBLE_PREC),
        }
    }

    /// r = sqrt(x) to the precision of `r`.
    pub fn sqrt_u(&mut self, r: &mut Float, x: u32) {
        let prec0 = r.prec();

        if prec0 <= DOUBLE_PREC {
            r.assign(f64::from(x).sqrt());
            return;
        }

        // remember the bit dropped by every halving so the way back up lands
        // exactly on prec0
        let mut bits = 0u64;
        let mut prec = prec0;
        while prec > DOUBLE_PREC {
            let bit = prec & 1;
            prec = (prec + bit) / 2;
            bits = bits * 2 + u64::from(bit);
        }

        let (t1, t2) = (&mut self.t1, &mut self.t2);
        t1.set_prec(DOUBLE_PREC);
        t1.assign(1.0 / f64::from(x).sqrt());

        while prec < prec0 {
            prec *= 2;
            if prec >= prec0 {
                break;
            }
            // t1 = t1 + t1 * (1 - x * t1^2) / 2
            t2.set_prec(prec);
            t2.assign(t1.square_ref()); // half x half -> full
            *t2 *= x;
            t2.sub_from(1u32);
            t2.set_prec(prec / 2);
            *t2 >>= 1u32;
            *t2 *= &*t1; // half x half -> half
            t1.set_prec(prec);
            *t1 += &*t2;

            prec -= (bits & 1) as u32;
            bits /= 2;
        }

        // t2 = x * t1, r = t2 + t1 * (x - t2^2) / 2
        t2.set_prec(prec0 / 2);
        t2.assign(&*t1 * x);
        r.assign(t2.square_ref()); // half x half -> full
        r.sub_from(x);
        *t1 *= &*r; // half x half -> half
        *t1 >>= 1u32;
        r.assign(&*t1 + &*t2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(prec: u32, x: u32) {
        let mut scratch = SqrtScratch::new();
        let mut r = Float::new(prec);
        scratch.sqrt_u(&mut r, x);

        let exact = Float::with_val(prec + 64, x).sqrt();
        let err = Float::with_val(prec + 64, &exact - &r).abs() / &exact;
        // a few ulps of slack for the half precision correction terms
        let bound = Float::with_val(64, Float::i_exp(1, 8 - prec as i32));
        assert!(err < bound, "sqrt({x}) at {prec} bits: relative error {err}");
    }

    #[test]
    fn double_precision_shortcut() {
        let mut scratch = SqrtScratch::new();
        let mut r = Float::new(DOUBLE_PREC);
        scratch.sqrt_u(&mut r, 640320);
        assert_eq!(r, 640320f64.sqrt());
    }

    #[test]
    fn matches_mpfr_across_precisions() {
        for prec in [54, 64, 100, 107, 333, 1000, 4099, 20_000] {
            assert_close(prec, 640320);
            assert_close(prec, 2);
        }
    }

    #[test]
    fn perfect_square() {
        assert_close(512, 10_000);
    }

    #[test]
    fn scratch_reused_across_calls() {
        let mut scratch = SqrtScratch::new();
        let mut big = Float::new(5000);
        scratch.sqrt_u(&mut big, 3);
        let mut small = Float::new(80);
        scratch.sqrt_u(&mut small, 3);
        let exact = Float::with_val(80, 3).sqrt();
        let err = Float::with_val(80, &exact - &small).abs();
        assert!(err < Float::with_val(32, Float::i_exp(1, -76)));
    }
}
