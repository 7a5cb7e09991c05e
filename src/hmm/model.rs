//! The discrete HMM parameter triple and its stochastic invariants.

use ndarray::{Array1, Array2};
use rand::Rng;

use crate::error::{Error, Result};

/// Tolerance for checking that probability rows sum to one.
const STOCHASTIC_TOLERANCE: f64 = 1e-6;

/// Parameters of a discrete Hidden Markov Model.
///
/// `start[i]` is the probability of starting in state `i`,
/// `transition[[i, j]]` the probability of moving from state `i` to `j`,
/// and `emission[[i, k]]` the probability of emitting symbol `k` in state
/// `i`. Every row is a probability distribution; construction validates
/// dimensions and row sums so the training recursions can assume them.
///
/// Observation symbols are 0-based indices into `0..n_symbols`.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmModel {
    start: Array1<f64>,
    transition: Array2<f64>,
    emission: Array2<f64>,
}

impl HmmModel {
    /// Build a model from its parameter triple, validating the stochastic
    /// invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidModelInput`] if `transition` is not square,
    /// its side differs from `start.len()` or `emission`'s row count, any
    /// entry lies outside `[0, 1]`, or any row (or `start`) does not sum to
    /// one within `1e-6`.
    pub fn new(start: Array1<f64>, transition: Array2<f64>, emission: Array2<f64>) -> Result<Self> {
        let n = start.len();
        if n == 0 {
            return Err(Error::InvalidModelInput(
                "model must have at least one hidden state".into(),
            ));
        }
        if transition.nrows() != n || transition.ncols() != n {
            return Err(Error::InvalidModelInput(format!(
                "transition matrix is {}x{}, expected {n}x{n}",
                transition.nrows(),
                transition.ncols()
            )));
        }
        if emission.nrows() != n {
            return Err(Error::InvalidModelInput(format!(
                "emission matrix has {} rows, expected {n}",
                emission.nrows()
            )));
        }
        if emission.ncols() == 0 {
            return Err(Error::InvalidModelInput(
                "emission alphabet must have at least one symbol".into(),
            ));
        }

        check_distribution("start", &start.to_vec())?;
        for (i, row) in transition.rows().into_iter().enumerate() {
            check_distribution(&format!("transition row {i}"), &row.to_vec())?;
        }
        for (i, row) in emission.rows().into_iter().enumerate() {
            check_distribution(&format!("emission row {i}"), &row.to_vec())?;
        }

        Ok(Self {
            start,
            transition,
            emission,
        })
    }

    /// Internal constructor for matrices the M-step has already normalized.
    pub(crate) fn from_parts_unchecked(
        start: Array1<f64>,
        transition: Array2<f64>,
        emission: Array2<f64>,
    ) -> Self {
        Self {
            start,
            transition,
            emission,
        }
    }

    /// Uniform-flavored initialization: `start = 1/N`, transitions
    /// `0.7/N` everywhere plus `0.3` on the diagonal, emissions `1/K`.
    pub fn uniform(n_states: usize, n_symbols: usize) -> Result<Self> {
        if n_states == 0 || n_symbols == 0 {
            return Err(Error::InvalidModelInput(
                "state and symbol counts must be at least 1".into(),
            ));
        }
        let n = n_states as f64;
        let start = Array1::from_elem(n_states, 1.0 / n);
        let mut transition = Array2::from_elem((n_states, n_states), 0.7 / n);
        for i in 0..n_states {
            transition[[i, i]] += 0.3;
        }
        let emission = Array2::from_elem((n_states, n_symbols), 1.0 / n_symbols as f64);
        Ok(Self {
            start,
            transition,
            emission,
        })
    }

    /// Random initialization: each row is sampled uniformly and normalized.
    pub fn random<R: Rng + ?Sized>(n_states: usize, n_symbols: usize, rng: &mut R) -> Result<Self> {
        if n_states == 0 || n_symbols == 0 {
            return Err(Error::InvalidModelInput(
                "state and symbol counts must be at least 1".into(),
            ));
        }
        let start = random_distribution(n_states, rng);
        let mut transition = Array2::zeros((n_states, n_states));
        let mut emission = Array2::zeros((n_states, n_symbols));
        for i in 0..n_states {
            transition.row_mut(i).assign(&random_distribution(n_states, rng));
            emission.row_mut(i).assign(&random_distribution(n_symbols, rng));
        }
        Ok(Self {
            start,
            transition,
            emission,
        })
    }

    /// Number of hidden states.
    pub fn n_states(&self) -> usize {
        self.start.len()
    }

    /// Number of observable symbols.
    pub fn n_symbols(&self) -> usize {
        self.emission.ncols()
    }

    /// Start-state probabilities.
    pub fn start(&self) -> &Array1<f64> {
        &self.start
    }

    /// Row-stochastic transition matrix.
    pub fn transition(&self) -> &Array2<f64> {
        &self.transition
    }

    /// Row-stochastic emission matrix.
    pub fn emission(&self) -> &Array2<f64> {
        &self.emission
    }

    /// Check an observation sequence against this model's alphabet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidModelInput`] if the sequence is empty or any
    /// symbol is outside `0..n_symbols`.
    pub fn validate_observations(&self, observations: &[usize]) -> Result<()> {
        if observations.is_empty() {
            return Err(Error::InvalidModelInput(
                "observation sequence is empty".into(),
            ));
        }
        let k = self.n_symbols();
        for (t, &o) in observations.iter().enumerate() {
            if o >= k {
                return Err(Error::InvalidModelInput(format!(
                    "observation[{t}] = {o} out of range (alphabet size {k})"
                )));
            }
        }
        Ok(())
    }
}

fn check_distribution(what: &str, row: &[f64]) -> Result<()> {
    for &p in row {
        if !(0.0..=1.0 + STOCHASTIC_TOLERANCE).contains(&p) {
            return Err(Error::InvalidModelInput(format!(
                "{what} has entry {p} outside [0, 1]"
            )));
        }
    }
    let sum: f64 = row.iter().sum();
    if (sum - 1.0).abs() > STOCHASTIC_TOLERANCE {
        return Err(Error::InvalidModelInput(format!(
            "{what} sums to {sum}, expected 1"
        )));
    }
    Ok(())
}

fn random_distribution<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Array1<f64> {
    let mut row = Array1::from_shape_fn(len, |_| rng.gen::<f64>());
    let sum = row.sum();
    // gen::<f64>() is in [0, 1); an all-zero row has probability zero but
    // would divide by zero, so fall back to uniform.
    if sum > 0.0 {
        row /= sum;
    } else {
        row.fill(1.0 / len as f64);
    }
    row
}
