//! Log-domain arithmetic helpers shared by the forward/backward recursions
//! and the sufficient-statistics accumulators.

/// Numerically stable `log(exp(a) + exp(b))`.
///
/// Tolerates either argument being negative infinity (a zero probability),
/// returning the other argument instead of producing NaN.
pub fn log_sum_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + ((a - max).exp() + (b - max).exp()).ln()
}

/// Log-sum-exp over a slice of log-domain values.
///
/// Returns negative infinity for an empty slice or one whose entries are
/// all negative infinity.
pub fn log_sum_exp_slice(xs: &[f64]) -> f64 {
    let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}

/// Streaming log-sum-exp accumulator.
///
/// Starts at `log(0) = -inf` and folds one log-domain term at a time, so a
/// sum over zero-probability terms stays `-inf` without ever going through
/// NaN. Used wherever a recursion combines a variable number of terms
/// (backward recursion, expected-count accumulation).
#[derive(Debug, Clone, Copy)]
pub struct LogAccumulator(f64);

impl LogAccumulator {
    pub fn new() -> Self {
        LogAccumulator(f64::NEG_INFINITY)
    }

    /// Fold `term` (a log-domain value, possibly `-inf`) into the running sum.
    pub fn add(&mut self, term: f64) {
        self.0 = log_sum_exp(self.0, term);
    }

    /// The accumulated `log(sum of exp(terms))`.
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for LogAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
