//! Gradient-boosted trees for binary direction labels.
//!
//! Log-loss boosting: each tree is grown on the residuals `y - p` and its
//! leaves are replaced by the Newton step `Σ(y - p) / Σ p(1 - p)`.

use analysis_core::stats::sigmoid;
use analysis_core::AnalysisError;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::tree::{RegressionTree, TreeParams};

/// Keeps the initial log-odds finite when every label agrees
const BASE_RATE_EPSILON: f64 = 1e-6;
const MAX_LEAF_STEP: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Row share sampled (without replacement) for each tree
    pub subsample: f64,
    pub tree: TreeParams,
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            subsample: 0.8,
            tree: TreeParams {
                max_depth: 4,
                min_samples_split: 10,
                min_samples_leaf: 5,
                max_features: None,
            },
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    feature_importances: Vec<f64>,
}

impl GradientBoostedTrees {
    pub fn fit(dataset: &Dataset, params: &GbmParams) -> Result<Self, AnalysisError> {
        if dataset.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "gradient boosting needs at least one sample".to_string(),
            ));
        }
        if !(params.subsample > 0.0 && params.subsample <= 1.0) {
            return Err(AnalysisError::Configuration(format!(
                "subsample must be in (0, 1], got {}",
                params.subsample
            )));
        }

        let n = dataset.len();
        let labels = &dataset.labels;
        let base_rate = dataset.base_rate().clamp(BASE_RATE_EPSILON, 1.0 - BASE_RATE_EPSILON);
        let base_score = (base_rate / (1.0 - base_rate)).ln();

        let mut raw = vec![base_score; n];
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let sample_size = ((n as f64 * params.subsample).round() as usize).clamp(1, n);
        let mut all_rows: Vec<usize> = (0..n).collect();
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; dataset.n_features()];

        for _ in 0..params.n_estimators {
            let probs: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
            let residuals: Vec<f64> = labels.iter().zip(&probs).map(|(y, p)| y - p).collect();

            all_rows.shuffle(&mut rng);
            let mut rows = all_rows[..sample_size].to_vec();
            rows.sort_unstable();

            let tree = RegressionTree::fit_with_leaves(
                &dataset.features,
                &residuals,
                &rows,
                &params.tree,
                &mut rng,
                |leaf_rows| {
                    let gradient: f64 = leaf_rows.iter().map(|&i| residuals[i]).sum();
                    let hessian: f64 = leaf_rows.iter().map(|&i| probs[i] * (1.0 - probs[i])).sum();
                    if hessian < 1e-12 {
                        0.0
                    } else {
                        (gradient / hessian).clamp(-MAX_LEAF_STEP, MAX_LEAF_STEP)
                    }
                },
            );

            for (r, x) in raw.iter_mut().zip(&dataset.features) {
                *r += params.learning_rate * tree.predict(x);
            }
            for (total, gain) in importances.iter_mut().zip(tree.importances()) {
                *total += gain;
            }
            trees.push(tree);
        }

        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            trees,
            feature_importances: normalize(importances),
        })
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        let raw: f64 = self.base_score
            + self
                .trees
                .iter()
                .map(|tree| self.learning_rate * tree.predict(x))
                .sum::<f64>();
        sigmoid(raw)
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Scale to sum 1; all-zero stays all-zero.
pub(crate) fn normalize(mut values: Vec<f64>) -> Vec<f64> {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        for v in &mut values {
            *v /= sum;
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable(n: usize) -> Dataset {
        let features: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![((i * 37) % 100) as f64, ((i * 11) % 7) as f64])
            .collect();
        let labels = features.iter().map(|x| if x[0] > 50.0 { 1.0 } else { 0.0 }).collect();
        Dataset::new(features, labels)
    }

    #[test]
    fn test_fits_separable_labels() {
        let dataset = separable(120);
        let model = GradientBoostedTrees::fit(&dataset, &GbmParams::default()).unwrap();

        assert_eq!(model.n_trees(), 100);
        assert!(model.predict_proba(&[90.0, 3.0]) > 0.8);
        assert!(model.predict_proba(&[10.0, 3.0]) < 0.2);

        let importances = model.feature_importances();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_single_class_stays_near_base_rate() {
        let features: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let dataset = Dataset::new(features, vec![1.0; 30]);
        let model = GradientBoostedTrees::fit(&dataset, &GbmParams::default()).unwrap();
        assert!(model.predict_proba(&[4.0]) > 0.99);
        assert!(model.predict_proba(&[4.0]).is_finite());
    }

    #[test]
    fn test_seed_makes_fit_deterministic() {
        let dataset = separable(80);
        let a = GradientBoostedTrees::fit(&dataset, &GbmParams::default()).unwrap();
        let b = GradientBoostedTrees::fit(&dataset, &GbmParams::default()).unwrap();
        assert_eq!(a.predict_proba(&[47.0, 2.0]), b.predict_proba(&[47.0, 2.0]));
    }

    #[test]
    fn test_rejects_bad_subsample() {
        let params = GbmParams {
            subsample: 0.0,
            ..GbmParams::default()
        };
        assert!(matches!(
            GradientBoostedTrees::fit(&separable(40), &params),
            Err(AnalysisError::Configuration(_))
        ));
        assert!(matches!(
            GradientBoostedTrees::fit(&Dataset::default(), &GbmParams::default()),
            Err(AnalysisError::InsufficientData(_))
        ));
    }
}
