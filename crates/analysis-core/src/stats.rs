//! Small numeric helpers shared by the indicator, sentiment and model crates.

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Compute sample standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Population standard deviation (divides by n).
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Mean absolute deviation around the mean.
pub fn mean_abs_deviation(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|x| (x - m).abs()).sum::<f64>() / data.len() as f64
}

/// Logistic function.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Keep finite values, map NaN and infinities to `None`.
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Sign of a value as -1.0, 0.0 or 1.0 (0.0 stays 0.0, unlike `f64::signum`).
pub fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Mean squared error between predicted probabilities and 0/1 outcomes.
pub fn brier_score(probabilities: &[f64], outcomes: &[f64]) -> f64 {
    if probabilities.is_empty() || probabilities.len() != outcomes.len() {
        return 0.0;
    }
    probabilities
        .iter()
        .zip(outcomes)
        .map(|(p, y)| (p - y).powi(2))
        .sum::<f64>()
        / probabilities.len() as f64
}

/// Share of probabilities on the correct side of 0.5.
pub fn directional_accuracy(probabilities: &[f64], outcomes: &[f64]) -> f64 {
    if probabilities.is_empty() || probabilities.len() != outcomes.len() {
        return 0.0;
    }
    let correct = probabilities
        .iter()
        .zip(outcomes)
        .filter(|(p, y)| (**p >= 0.5) == (**y >= 0.5))
        .count();
    correct as f64 / probabilities.len() as f64
}

/// Binary confusion counts, predicting "up" when the probability is >= 0.5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn from_probabilities(probabilities: &[f64], outcomes: &[f64]) -> Self {
        let mut matrix = Self::default();
        for (p, y) in probabilities.iter().zip(outcomes) {
            match (*p >= 0.5, *y >= 0.5) {
                (true, true) => matrix.true_positive += 1,
                (true, false) => matrix.false_positive += 1,
                (false, false) => matrix.true_negative += 1,
                (false, true) => matrix.false_negative += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    /// 0 when nothing was predicted positive
    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    /// 0 when there are no positive outcomes
    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
