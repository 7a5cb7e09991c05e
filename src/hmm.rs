pub mod backward;
pub mod forward;
pub mod logspace;
pub mod model;
pub mod train;

// Re-export the training surface with descriptive names
pub use backward::backward;
pub use forward::{forward, sequence_log_likelihood, ForwardMode};
pub use logspace::{log_sum_exp, log_sum_exp_slice, LogAccumulator};
pub use model::HmmModel;
pub use train::{fit, TrainConfig, TrainOutcome};
