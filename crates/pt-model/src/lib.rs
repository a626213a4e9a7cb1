//! # pt-model
//!
//! The multiclass pipeline used by every trial: feature concatenation,
//! value-to-key label mapping, a maximum-entropy (softmax regression)
//! trainer, and the fitted model that maps scores back to label values.
//! Also provides the multiclass evaluation metrics printed after search.

mod metrics;
mod model;
mod pipeline;
mod trainer;

pub use metrics::{ConfusionMatrix, MulticlassMetrics};
pub use model::{MulticlassModel, Prediction};
pub use pipeline::Pipeline;
pub use trainer::{MaxEntOptions, MaxEntTrainer};
