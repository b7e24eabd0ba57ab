//! Per-ticker direction models.
//!
//! Features are the 17 technical indicators at a bar; the label is whether the
//! close `horizon` bars later is higher. Two tree ensembles are available
//! behind the [`Predictor`] trait, and [`ModelRegistry`] keeps one published
//! model per ticker, replacing it atomically on retrain.

pub mod dataset;
pub mod forest;
pub mod gbm;
pub mod predictor;
pub mod registry;
pub mod tree;

pub use dataset::Dataset;
pub use forest::{ForestParams, RandomForest};
pub use gbm::{GbmParams, GradientBoostedTrees};
pub use predictor::{Predictor, TrainedModel};
pub use registry::{ModelMetrics, ModelRegistry, ModelState, MIN_FIT_SAMPLES};
pub use tree::{RegressionTree, TreeParams};
