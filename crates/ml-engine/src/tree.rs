//! CART regression tree shared by both ensembles.

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Gains at or below this are treated as no improvement
const MIN_GAIN: f64 = 1e-12;

/// Growth limits for a single tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    /// Nodes with fewer rows become leaves
    pub min_samples_split: usize,
    /// A split must leave at least this many rows on each side
    pub min_samples_leaf: usize,
    /// Features sampled per split (None = all)
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 4,
            min_samples_split: 10,
            min_samples_leaf: 5,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Regression tree grown by squared-error reduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Node,
    /// Total squared-error reduction per feature (not normalised)
    importances: Vec<f64>,
}

impl RegressionTree {
    /// Fit on `rows` of `features`; leaves predict the mean target.
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        rows: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        Self::fit_with_leaves(features, targets, rows, params, rng, |leaf_rows| {
            let sum: f64 = leaf_rows.iter().map(|&i| targets[i]).sum();
            if leaf_rows.is_empty() {
                0.0
            } else {
                sum / leaf_rows.len() as f64
            }
        })
    }

    /// Fit with splits chosen on `targets` and leaf values from `leaf_value`.
    pub fn fit_with_leaves<F>(
        features: &[Vec<f64>],
        targets: &[f64],
        rows: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
        leaf_value: F,
    ) -> Self
    where
        F: Fn(&[usize]) -> f64,
    {
        let n_features = features.first().map_or(0, Vec::len);
        let mut builder = TreeBuilder {
            features,
            targets,
            params,
            leaf_value,
            importances: vec![0.0; n_features],
            n_features,
        };
        let root = builder.build(rows.to_vec(), 0, rng);
        Self {
            root,
            importances: builder.importances,
        }
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = x.get(*feature).copied().unwrap_or(f64::NAN);
                    node = if v <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn n_leaves(&self) -> usize {
        self.root.n_leaves()
    }
}

struct TreeBuilder<'a, F> {
    features: &'a [Vec<f64>],
    targets: &'a [f64],
    params: &'a TreeParams,
    leaf_value: F,
    importances: Vec<f64>,
    n_features: usize,
}

impl<F> TreeBuilder<'_, F>
where
    F: Fn(&[usize]) -> f64,
{
    fn leaf(&self, rows: &[usize]) -> Node {
        let value = (self.leaf_value)(rows);
        Node::Leaf {
            value: if value.is_finite() { value } else { 0.0 },
        }
    }

    fn build(&mut self, rows: Vec<usize>, depth: usize, rng: &mut ChaCha8Rng) -> Node {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        if depth >= self.params.max_depth || n < self.params.min_samples_split || n < 2 * min_leaf {
            return self.leaf(&rows);
        }

        let Some(split) = self.best_split(&rows, rng) else {
            return self.leaf(&rows);
        };
        self.importances[split.feature] += split.gain;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&i| self.features[i][split.feature] <= split.threshold);

        let left = self.build(left_rows, depth + 1, rng);
        let right = self.build(right_rows, depth + 1, rng);
        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn best_split(&self, rows: &[usize], rng: &mut ChaCha8Rng) -> Option<SplitCandidate> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf.max(1);

        let total: f64 = rows.iter().map(|&i| self.targets[i]).sum();
        let total_sq: f64 = rows.iter().map(|&i| self.targets[i].powi(2)).sum();
        let parent_sse = total_sq - total * total / n as f64;
        if parent_sse <= MIN_GAIN {
            return None;
        }

        let mut candidates: Vec<usize> = (0..self.n_features).collect();
        if let Some(k) = self.params.max_features {
            if k > 0 && k < self.n_features {
                candidates.shuffle(rng);
                candidates.truncate(k);
            }
        }

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = rows.to_vec();

        for &feature in &candidates {
            sorted.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for i in 1..n {
                let y = self.targets[sorted[i - 1]];
                left_sum += y;
                left_sq += y * y;

                if i < min_leaf || n - i < min_leaf {
                    continue;
                }
                let lo = self.features[sorted[i - 1]][feature];
                let hi = self.features[sorted[i]][feature];
                if lo >= hi {
                    continue;
                }

                let n_left = i as f64;
                let n_right = (n - i) as f64;
                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left) + (right_sq - right_sum * right_sum / n_right);
                let gain = parent_sse - sse;

                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_learns_step_function() {
        let features: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let targets: Vec<f64> = (0..40).map(|i| if i < 20 { 0.0 } else { 1.0 }).collect();
        let rows: Vec<usize> = (0..40).collect();

        let tree = RegressionTree::fit(&features, &targets, &rows, &TreeParams::default(), &mut rng());
        assert_eq!(tree.predict(&[5.0, 0.0]), 0.0);
        assert_eq!(tree.predict(&[35.0, 2.0]), 1.0);
        assert!(tree.importances()[0] > 0.0);
        assert_eq!(tree.importances()[1], 0.0);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_respects_leaf_and_depth_limits() {
        let features: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..30).map(|i| (i * i) as f64).collect();
        let rows: Vec<usize> = (0..30).collect();
        let params = TreeParams {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 5,
            max_features: None,
        };

        let tree = RegressionTree::fit(&features, &targets, &rows, &params, &mut rng());
        // Every leaf holds at least 5 of the 30 rows
        assert!(tree.n_leaves() <= 6);

        let shallow = RegressionTree::fit(
            &features,
            &targets,
            &rows,
            &TreeParams { max_depth: 2, ..params },
            &mut rng(),
        );
        assert!(shallow.depth() <= 2);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let targets = vec![0.7; 20];
        let rows: Vec<usize> = (0..20).collect();
        let tree = RegressionTree::fit(&features, &targets, &rows, &TreeParams::default(), &mut rng());
        assert_eq!(tree.n_leaves(), 1);
        assert!((tree.predict(&[3.0]) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_custom_leaf_values() {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..20).map(|i| if i < 10 { -1.0 } else { 1.0 }).collect();
        let rows: Vec<usize> = (0..20).collect();
        let tree = RegressionTree::fit_with_leaves(
            &features,
            &targets,
            &rows,
            &TreeParams::default(),
            &mut rng(),
            |leaf| leaf.len() as f64,
        );
        assert_eq!(tree.predict(&[0.0]), 10.0);
    }
}
