use analysis_core::{AnalysisError, Algorithm};
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::forest::{ForestParams, RandomForest};
use crate::gbm::{GbmParams, GradientBoostedTrees};

/// A fitted direction classifier.
pub trait Predictor: Send + Sync {
    /// Probability that price is higher after the label horizon
    fn predict_proba(&self, features: &[f64]) -> f64;

    /// Normalised importances in feature order
    fn feature_importances(&self) -> Vec<f64>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    GradientBoosting(GradientBoostedTrees),
    RandomForest(RandomForest),
}

impl TrainedModel {
    pub fn fit(algorithm: Algorithm, dataset: &Dataset, seed: u64) -> Result<Self, AnalysisError> {
        match algorithm {
            Algorithm::GradientBoosting => {
                let params = GbmParams {
                    seed,
                    ..GbmParams::default()
                };
                Ok(TrainedModel::GradientBoosting(GradientBoostedTrees::fit(dataset, &params)?))
            }
            Algorithm::RandomForest => {
                let params = ForestParams {
                    seed,
                    ..ForestParams::default()
                };
                Ok(TrainedModel::RandomForest(RandomForest::fit(dataset, &params)?))
            }
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            TrainedModel::GradientBoosting(_) => Algorithm::GradientBoosting,
            TrainedModel::RandomForest(_) => Algorithm::RandomForest,
        }
    }
}

impl Predictor for TrainedModel {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        let p = match self {
            TrainedModel::GradientBoosting(model) => model.predict_proba(features),
            TrainedModel::RandomForest(model) => model.predict_proba(features),
        };
        if p.is_finite() {
            p.clamp(0.0, 1.0)
        } else {
            0.5
        }
    }

    fn feature_importances(&self) -> Vec<f64> {
        match self {
            TrainedModel::GradientBoosting(model) => model.feature_importances().to_vec(),
            TrainedModel::RandomForest(model) => model.feature_importances().to_vec(),
        }
    }
}
