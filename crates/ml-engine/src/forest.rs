//! Bootstrap random forest; probabilities are the mean leaf frequency.

use analysis_core::AnalysisError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::gbm::normalize;
use crate::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Trees split on the mean of 0/1 labels; `max_features` None = √features
    pub tree: TreeParams,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            tree: TreeParams {
                max_depth: 8,
                min_samples_split: 10,
                min_samples_leaf: 5,
                max_features: None,
            },
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    pub fn fit(dataset: &Dataset, params: &ForestParams) -> Result<Self, AnalysisError> {
        if dataset.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "random forest needs at least one sample".to_string(),
            ));
        }
        if params.n_trees == 0 {
            return Err(AnalysisError::Configuration("random forest needs at least one tree".to_string()));
        }

        let n = dataset.len();
        let n_features = dataset.n_features();
        let tree_params = TreeParams {
            max_features: Some(
                params
                    .tree
                    .max_features
                    .unwrap_or_else(|| (n_features as f64).sqrt().round().max(1.0) as usize),
            ),
            ..params.tree.clone()
        };

        // Each tree gets its own seed so the result does not depend on scheduling
        let trees: Vec<RegressionTree> = (0..params.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(i as u64));
                let rows: Vec<usize> = if params.bootstrap {
                    let mut sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                    sample.sort_unstable();
                    sample
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(&dataset.features, &dataset.labels, &rows, &tree_params, &mut rng)
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        for tree in &trees {
            for (total, gain) in importances.iter_mut().zip(tree.importances()) {
                *total += gain;
            }
        }

        Ok(Self {
            trees,
            feature_importances: normalize(importances),
        })
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(x)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
