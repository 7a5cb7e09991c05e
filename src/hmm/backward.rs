//! Backward recursion of the forward-backward algorithm.

use ndarray::Array2;

use crate::error::Result;
use crate::hmm::logspace::LogAccumulator;
use crate::hmm::model::HmmModel;

/// Compute the backward table for `observations` under `model`.
///
/// The result has shape `(n_states, len)`; entry `[s, t]` is
/// `log P(obs[t+1..] | state_t = s)`. The final column is `log(1) = 0` by
/// convention. The state-sum at each step runs through the streaming
/// log-sum-exp accumulator, so zero-probability transitions contribute
/// negative-infinity terms without producing NaN.
///
/// # Errors
///
/// Returns an error for an empty sequence or out-of-alphabet symbols.
pub fn backward(model: &HmmModel, observations: &[usize]) -> Result<Array2<f64>> {
    model.validate_observations(observations)?;

    let n = model.n_states();
    let len = observations.len();
    let mut beta = Array2::zeros((n, len));

    for t in (0..len - 1).rev() {
        let next = observations[t + 1];
        for s in 0..n {
            let mut acc = LogAccumulator::new();
            for r in 0..n {
                acc.add(
                    beta[[r, t + 1]]
                        + (model.transition()[[s, r]] * model.emission()[[r, next]]).ln(),
                );
            }
            beta[[s, t]] = acc.value();
        }
    }

    Ok(beta)
}
