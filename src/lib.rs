//! Baum-Welch parameter estimation for discrete hidden Markov models.
//!
//! Given an initial model and a single observation sequence, [`fit`] runs a
//! fixed number of EM iterations, re-estimating the transition and emission
//! matrices while keeping the start distribution fixed, and records a
//! per-iteration convergence trace. The forward-backward recursions and
//! expected-count accumulation run in natural-log space so long sequences
//! do not underflow.
//!
//! ```
//! use hmm_train::{HmmModel, TrainConfig};
//! use ndarray::array;
//!
//! let model = HmmModel::new(
//!     array![0.5, 0.5],
//!     array![[0.7, 0.3], [0.4, 0.6]],
//!     array![[0.6, 0.4], [0.1, 0.9]],
//! )
//! .unwrap();
//!
//! let observations = [0, 1, 1, 0, 0, 1];
//! let outcome = model.fit(&observations, &TrainConfig::default()).unwrap();
//! assert_eq!(outcome.trace.ncols(), 10);
//! ```

pub mod error;
pub mod hmm;

pub use error::{Error, Result};
pub use hmm::{backward, fit, forward, HmmModel, TrainConfig, TrainOutcome};
pub use hmm::{sequence_log_likelihood, ForwardMode};
