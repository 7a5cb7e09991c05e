//! Forward recursion of the forward-backward algorithm.

use ndarray::Array2;

use crate::error::Result;
use crate::hmm::logspace::{log_sum_exp_slice, LogAccumulator};
use crate::hmm::model::HmmModel;

/// How the state-sum inside each forward step is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardMode {
    /// Inner state-sum as a linear-space matrix-vector product, with the
    /// previous column's maximum factored out so the linear values stay
    /// representable. Terms far below that maximum can still underflow to
    /// zero within the sum, so this mode is only appropriate for
    /// small-to-moderate state counts and bounded probability magnitudes.
    #[default]
    Mixed,
    /// Inner state-sum as a streaming log-sum-exp. Slower, but safe for
    /// larger models.
    LogSpace,
}

/// Compute the forward table for `observations` under `model`.
///
/// The result has shape `(n_states, len)`; entry `[s, t]` is
/// `log P(obs[0..=t], state_t = s)`. Zero-probability prefixes are
/// represented as negative infinity, never as an error.
///
/// # Errors
///
/// Returns an error for an empty sequence or out-of-alphabet symbols.
pub fn forward(model: &HmmModel, observations: &[usize], mode: ForwardMode) -> Result<Array2<f64>> {
    model.validate_observations(observations)?;

    let n = model.n_states();
    let len = observations.len();
    let mut alpha = Array2::from_elem((n, len), f64::NEG_INFINITY);

    let o0 = observations[0];
    for s in 0..n {
        alpha[[s, 0]] = (model.start()[s] * model.emission()[[s, o0]]).ln();
    }

    for t in 1..len {
        let ot = observations[t];
        match mode {
            ForwardMode::Mixed => {
                let prev = alpha.column(t - 1).to_owned();
                let scale = prev.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                if scale == f64::NEG_INFINITY {
                    // The whole prefix has zero probability; so does every
                    // extension of it.
                    continue;
                }
                let prev_lin = prev.mapv(|x| (x - scale).exp());
                let reached = model.transition().t().dot(&prev_lin);
                for s in 0..n {
                    alpha[[s, t]] = scale + (reached[s] * model.emission()[[s, ot]]).ln();
                }
            }
            ForwardMode::LogSpace => {
                for s in 0..n {
                    let mut acc = LogAccumulator::new();
                    for r in 0..n {
                        acc.add(alpha[[r, t - 1]] + model.transition()[[r, s]].ln());
                    }
                    alpha[[s, t]] = acc.value() + model.emission()[[s, ot]].ln();
                }
            }
        }
    }

    Ok(alpha)
}

/// Total sequence log-likelihood: log-sum-exp over the final forward column.
pub fn sequence_log_likelihood(alpha: &Array2<f64>) -> f64 {
    let last = alpha.column(alpha.ncols() - 1);
    log_sum_exp_slice(&last.to_vec())
}
