//! Baum-Welch (EM) re-estimation of transition and emission probabilities.
//!
//! Each iteration is a pure function of the previous model and the fixed
//! observation sequence: forward and backward tables are computed from
//! scratch, combined into expected transition and emission counts
//! normalized by the total sequence log-likelihood, and row-normalized
//! into the next model. The start distribution is deliberately left fixed
//! at its initialization value; only transitions and emissions are
//! re-estimated.

use log::{info, warn};
use ndarray::Array2;

use crate::error::{Error, Result};
use crate::hmm::backward::backward;
use crate::hmm::forward::{forward, sequence_log_likelihood, ForwardMode};
use crate::hmm::logspace::LogAccumulator;
use crate::hmm::model::HmmModel;

/// Options for a training run.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Number of EM iterations to run. Termination is purely by this
    /// counter; there is no convergence-threshold early exit.
    pub iterations: usize,
    /// Emit a per-iteration report (iteration index, divergence, and the
    /// re-estimated matrices) through the `log` facade at info level.
    pub verbose: bool,
    /// How the forward recursion evaluates its inner state-sum.
    pub forward_mode: ForwardMode,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            verbose: false,
            forward_mode: ForwardMode::default(),
        }
    }
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// The re-estimated model. Its start distribution is the one the run
    /// began with.
    pub model: HmmModel,
    /// Shape `(2, iterations)`: row 0 holds the 1-based iteration index,
    /// row 1 the divergence between the models before and after that
    /// iteration (sum of the Frobenius norms of the transition and
    /// emission differences).
    pub trace: Array2<f64>,
}

/// Run `config.iterations` Baum-Welch iterations on `model`.
///
/// The input model is not mutated; each iteration builds a replacement.
///
/// # Errors
///
/// Returns [`Error::InvalidIterationCount`] if `config.iterations` is zero
/// and [`Error::InvalidModelInput`] for an empty observation sequence or
/// out-of-alphabet symbols. Both are detected before the first iteration.
pub fn fit(model: &HmmModel, observations: &[usize], config: &TrainConfig) -> Result<TrainOutcome> {
    if config.iterations == 0 {
        return Err(Error::InvalidIterationCount);
    }
    model.validate_observations(observations)?;

    let mut current = model.clone();
    let mut trace = Array2::zeros((2, config.iterations));

    for iteration in 1..=config.iterations {
        let alpha = forward(&current, observations, config.forward_mode)?;
        let beta = backward(&current, observations)?;
        let log_likelihood = sequence_log_likelihood(&alpha);

        let new_transition = expected_transitions(&current, observations, &alpha, &beta, log_likelihood);
        let new_emission = expected_emissions(&current, observations, &alpha, &beta, log_likelihood);

        let divergence = frobenius_norm(&(current.emission() - &new_emission))
            + frobenius_norm(&(current.transition() - &new_transition));

        if config.verbose {
            info!(
                "iteration {iteration}: log-likelihood = {log_likelihood:.6}, divergence = {divergence:.6e}"
            );
            info!("transition:\n{new_transition}");
            info!("emission:\n{new_emission}");
        }

        trace[[0, iteration - 1]] = iteration as f64;
        trace[[1, iteration - 1]] = divergence;

        current = HmmModel::from_parts_unchecked(
            current.start().clone(),
            new_transition,
            new_emission,
        );
    }

    Ok(TrainOutcome {
        model: current,
        trace,
    })
}

impl HmmModel {
    /// Convenience wrapper around [`fit`].
    pub fn fit(&self, observations: &[usize], config: &TrainConfig) -> Result<TrainOutcome> {
        fit(self, observations, config)
    }
}

/// Expected transition counts, row-normalized into a transition matrix.
///
/// `counts[x][y] = exp( logSumExp_t( alpha[x,t] + beta[y,t+1]
///                                   + ln A[x,y] + ln B[y, obs[t+1]] ) - P )`
/// summed over `t = 0..L-1`.
fn expected_transitions(
    model: &HmmModel,
    observations: &[usize],
    alpha: &Array2<f64>,
    beta: &Array2<f64>,
    log_likelihood: f64,
) -> Array2<f64> {
    let n = model.n_states();
    let mut counts = Array2::zeros((n, n));
    for x in 0..n {
        for y in 0..n {
            let log_a = model.transition()[[x, y]].ln();
            let mut acc = LogAccumulator::new();
            for t in 0..observations.len() - 1 {
                acc.add(
                    alpha[[x, t]]
                        + beta[[y, t + 1]]
                        + log_a
                        + model.emission()[[y, observations[t + 1]]].ln(),
                );
            }
            counts[[x, y]] = (acc.value() - log_likelihood).exp();
        }
    }
    normalize_rows(&mut counts, "transition");
    counts
}

/// Expected emission counts, row-normalized into an emission matrix.
///
/// `counts[x][o] = exp( logSumExp_{i: obs[i] == o}( alpha[x,i] + beta[x,i] ) - P )`.
fn expected_emissions(
    model: &HmmModel,
    observations: &[usize],
    alpha: &Array2<f64>,
    beta: &Array2<f64>,
    log_likelihood: f64,
) -> Array2<f64> {
    let n = model.n_states();
    let k = model.n_symbols();
    let mut counts = Array2::zeros((n, k));
    for x in 0..n {
        for o in 0..k {
            let mut acc = LogAccumulator::new();
            for (i, _) in observations.iter().enumerate().filter(|&(_, &obs)| obs == o) {
                acc.add(alpha[[x, i]] + beta[[x, i]]);
            }
            counts[[x, o]] = (acc.value() - log_likelihood).exp();
        }
    }
    normalize_rows(&mut counts, "emission");
    counts
}

/// Divide each row by its sum to restore a probability distribution.
///
/// A row whose expected counts sum to zero (or fail to be finite, which
/// happens when a state is unreachable under the data) cannot be
/// normalized; instead of letting the division poison the next iteration
/// with NaN, the row is redistributed uniformly and a warning names the
/// offending state.
fn normalize_rows(matrix: &mut Array2<f64>, what: &str) {
    let width = matrix.ncols();
    for (i, mut row) in matrix.rows_mut().into_iter().enumerate() {
        let sum: f64 = row.sum();
        if sum.is_finite() && sum > 0.0 {
            row /= sum;
        } else {
            warn!(
                "degenerate {what} statistics for state {i} (row sum {sum}); \
                 redistributing uniformly"
            );
            row.fill(1.0 / width as f64);
        }
    }
}

/// Frobenius norm, the L2 norm of the matrix viewed as a flat vector.
fn frobenius_norm(diff: &Array2<f64>) -> f64 {
    diff.iter().map(|x| x * x).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::forward::{forward, sequence_log_likelihood, ForwardMode};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn coin_model() -> HmmModel {
        HmmModel::new(
            array![0.6, 0.4],
            array![[0.7, 0.3], [0.4, 0.6]],
            array![[0.6, 0.4], [0.1, 0.9]],
        )
        .unwrap()
    }

    fn assert_rows_stochastic(matrix: &Array2<f64>) {
        for row in matrix.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
            for &p in row {
                assert!((0.0..=1.0 + 1e-9).contains(&p), "entry {p} out of range");
            }
        }
    }

    #[test]
    fn rejects_zero_iterations() {
        let config = TrainConfig {
            iterations: 0,
            ..TrainConfig::default()
        };
        let err = coin_model().fit(&[0, 1], &config).unwrap_err();
        assert!(matches!(err, Error::InvalidIterationCount));
    }

    #[test]
    fn rows_remain_stochastic_after_every_iteration() {
        let obs = [0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 1, 0];
        let mut model = coin_model();
        let config = TrainConfig {
            iterations: 1,
            ..TrainConfig::default()
        };
        for _ in 0..5 {
            let outcome = model.fit(&obs, &config).unwrap();
            assert_rows_stochastic(outcome.model.transition());
            assert_rows_stochastic(outcome.model.emission());
            model = outcome.model;
        }
    }

    #[test]
    fn log_likelihood_is_non_decreasing_across_iterations() {
        let obs = [0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 1, 0, 0, 1];
        let mut model = coin_model();
        let config = TrainConfig {
            iterations: 1,
            ..TrainConfig::default()
        };
        let mut previous = f64::NEG_INFINITY;
        for _ in 0..8 {
            let outcome = model.fit(&obs, &config).unwrap();
            model = outcome.model;
            let alpha = forward(&model, &obs, ForwardMode::Mixed).unwrap();
            let ll = sequence_log_likelihood(&alpha);
            assert!(
                ll >= previous - 1e-9,
                "likelihood decreased: {previous} -> {ll}"
            );
            previous = ll;
        }
    }

    #[test]
    fn trace_has_one_based_iteration_indices() {
        let config = TrainConfig {
            iterations: 4,
            ..TrainConfig::default()
        };
        let outcome = coin_model().fit(&[0, 1, 1, 0, 0], &config).unwrap();
        assert_eq!(outcome.trace.dim(), (2, 4));
        assert_eq!(outcome.trace[[0, 0]], 1.0);
        assert_eq!(outcome.trace[[0, 3]], 4.0);
        for it in 0..4 {
            assert!(outcome.trace[[1, it]].is_finite());
            assert!(outcome.trace[[1, it]] >= 0.0);
        }
    }

    #[test]
    fn start_distribution_is_never_re_estimated() {
        let config = TrainConfig {
            iterations: 3,
            ..TrainConfig::default()
        };
        let model = coin_model();
        let outcome = model.fit(&[0, 1, 0, 0, 1], &config).unwrap();
        assert_eq!(outcome.model.start(), model.start());
    }

    #[test]
    fn single_state_self_loop_is_a_fixed_point() {
        let model = HmmModel::new(
            array![1.0],
            array![[1.0]],
            array![[0.3, 0.7]],
        )
        .unwrap();
        let config = TrainConfig {
            iterations: 3,
            ..TrainConfig::default()
        };
        let outcome = model.fit(&[1, 0, 1, 1], &config).unwrap();
        assert_abs_diff_eq!(outcome.model.transition()[[0, 0]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn symmetric_two_state_scenario_matches_enumeration() {
        // N = 2, K = 2, uniform start and transitions, biased emissions.
        // The sequence likelihood is checked against direct enumeration of
        // all 2^4 hidden paths before a single EM iteration is applied.
        let model = HmmModel::new(
            array![0.5, 0.5],
            array![[0.5, 0.5], [0.5, 0.5]],
            array![[0.6, 0.4], [0.4, 0.6]],
        )
        .unwrap();
        let obs = [0, 1, 0, 1];

        let alpha = forward(&model, &obs, ForwardMode::Mixed).unwrap();
        let ll = sequence_log_likelihood(&alpha);
        let mut total = 0.0;
        for path in 0..(1usize << obs.len()) {
            let states: Vec<usize> = (0..obs.len()).map(|t| (path >> t) & 1).collect();
            let mut p = model.start()[states[0]] * model.emission()[[states[0], obs[0]]];
            for t in 1..obs.len() {
                p *= model.transition()[[states[t - 1], states[t]]]
                    * model.emission()[[states[t], obs[t]]];
            }
            total += p;
        }
        assert_abs_diff_eq!(ll, total.ln(), epsilon = 1e-6);

        let config = TrainConfig {
            iterations: 1,
            ..TrainConfig::default()
        };
        let outcome = model.fit(&obs, &config).unwrap();
        assert_rows_stochastic(outcome.model.transition());
        assert_rows_stochastic(outcome.model.emission());
    }

    #[test]
    fn unreachable_state_falls_back_to_uniform_row() {
        // State 1 can never be entered: zero start probability and no
        // incoming transitions. Its expected counts sum to zero, which must
        // surface as a uniform row, never NaN.
        let model = HmmModel::new(
            array![1.0, 0.0],
            array![[1.0, 0.0], [0.0, 1.0]],
            array![[0.6, 0.4], [0.2, 0.8]],
        )
        .unwrap();
        let config = TrainConfig {
            iterations: 1,
            ..TrainConfig::default()
        };
        let outcome = model.fit(&[0, 1, 0], &config).unwrap();
        for &v in outcome.model.transition().iter() {
            assert!(!v.is_nan());
        }
        for &v in outcome.model.emission().iter() {
            assert!(!v.is_nan());
        }
        assert_abs_diff_eq!(outcome.model.transition()[[1, 0]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(outcome.model.transition()[[1, 1]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(outcome.model.emission()[[1, 0]], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn length_one_sequence_trains_without_transition_evidence() {
        // With L = 1 there are no transition terms at all; every
        // transition row is degenerate and redistributed uniformly.
        let config = TrainConfig {
            iterations: 1,
            ..TrainConfig::default()
        };
        let outcome = coin_model().fit(&[1], &config).unwrap();
        assert_rows_stochastic(outcome.model.transition());
        assert_rows_stochastic(outcome.model.emission());
    }

    #[test]
    fn forward_modes_produce_matching_estimates() {
        let obs = [0, 1, 1, 0, 1, 0, 0];
        let mixed = coin_model()
            .fit(
                &obs,
                &TrainConfig {
                    iterations: 3,
                    verbose: false,
                    forward_mode: ForwardMode::Mixed,
                },
            )
            .unwrap();
        let logspace = coin_model()
            .fit(
                &obs,
                &TrainConfig {
                    iterations: 3,
                    verbose: false,
                    forward_mode: ForwardMode::LogSpace,
                },
            )
            .unwrap();
        for (a, b) in mixed
            .model
            .transition()
            .iter()
            .zip(logspace.model.transition().iter())
        {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
        for (a, b) in mixed
            .model
            .emission()
            .iter()
            .zip(logspace.model.emission().iter())
        {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
        }
    }
}
