//! Labelled training rows built from an indicator series.

use analysis_core::stats::mean;
use technical_analysis::{IndicatorSeries, INDICATOR_COUNT};

/// Feature rows in indicator order with 0/1 direction labels.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

impl Dataset {
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<f64>) -> Self {
        debug_assert_eq!(features.len(), labels.len());
        Self { features, labels }
    }

    /// Label bar `t` with 1.0 when `close[t + horizon]` is above `close[t]`.
    ///
    /// Bars without a full feature vector, and the last `horizon` bars, are skipped.
    pub fn from_series(series: &IndicatorSeries, horizon: usize) -> Self {
        let closes = series.closes();
        let mut dataset = Dataset::default();
        if horizon == 0 {
            return dataset;
        }

        for t in 0..series.len().saturating_sub(horizon) {
            let Some(row) = series.complete_features(t) else {
                continue;
            };
            let (now, later) = (closes[t], closes[t + horizon]);
            if now <= 0.0 {
                continue;
            }
            let forward_return = later / now - 1.0;
            if !forward_return.is_finite() {
                continue;
            }
            dataset.features.push(row);
            dataset.labels.push(if forward_return > 0.0 { 1.0 } else { 0.0 });
        }
        dataset
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.first().map_or(INDICATOR_COUNT, Vec::len)
    }

    /// Share of rows labelled up
    pub fn base_rate(&self) -> f64 {
        mean(&self.labels)
    }

    /// Split in time order: the earlier rows fit, the last `fraction` validates.
    pub fn split_chronological(&self, fraction: f64) -> (Dataset, Dataset) {
        let holdout = ((self.len() as f64) * fraction).round() as usize;
        let cut = self.len() - holdout.min(self.len());
        (
            Dataset::new(self.features[..cut].to_vec(), self.labels[..cut].to_vec()),
            Dataset::new(self.features[cut..].to_vec(), self.labels[cut..].to_vec()),
        )
    }

    fn slice(&self, range: std::ops::Range<usize>) -> Dataset {
        Dataset::new(self.features[range.clone()].to_vec(), self.labels[range].to_vec())
    }

    /// Forward-chaining folds: rows are cut into `folds + 1` equal blocks and
    /// fold `k` fits on blocks `0..=k` and tests on block `k + 1`. The last
    /// test block absorbs the remainder. Empty when a block would be empty.
    pub fn walk_forward_folds(&self, folds: usize) -> Vec<(Dataset, Dataset)> {
        if folds == 0 {
            return Vec::new();
        }
        let block = self.len() / (folds + 1);
        if block == 0 {
            return Vec::new();
        }

        (1..=folds)
            .map(|k| {
                let train_end = k * block;
                let test_end = if k == folds { self.len() } else { train_end + block };
                (self.slice(0..train_end), self.slice(train_end..test_end))
            })
            .collect()
    }

    /// Per-feature means, used to impute undefined features at predict time.
    pub fn feature_means(&self) -> Vec<f64> {
        (0..self.n_features())
            .map(|j| {
                let column: Vec<f64> = self.features.iter().map(|row| row[j]).collect();
                mean(&column)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{IndicatorConfig, PriceBar};
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};
    use technical_analysis::compute_series;

    fn bars(n: usize) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + 8.0 * (i as f64 * 0.3).sin();
                PriceBar {
                    date: start + Duration::days(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000.0 + i as f64,
                }
            })
            .collect()
    }

    #[test]
    fn test_rows_need_features_and_future_close() {
        let bars = bars(100);
        let series = compute_series(&bars, &IndicatorConfig::default()).unwrap();
        let dataset = Dataset::from_series(&series, 5);

        // SMA_50 is first defined at bar 49; the last 5 bars have no label
        assert_eq!(dataset.len(), 100 - 49 - 5);
        assert_eq!(dataset.n_features(), INDICATOR_COUNT);

        let first_label = if bars[54].close > bars[49].close { 1.0 } else { 0.0 };
        assert_eq!(dataset.labels[0], first_label);
    }

    #[test]
    fn test_chronological_split_keeps_order() {
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let labels = vec![0.0; 10];
        let dataset = Dataset::new(features, labels);

        let (fit, validation) = dataset.split_chronological(0.2);
        assert_eq!(fit.len(), 8);
        assert_eq!(validation.len(), 2);
        assert_eq!(validation.features[0], vec![8.0]);

        let (all, none) = dataset.split_chronological(0.0);
        assert_eq!(all.len(), 10);
        assert!(none.is_empty());
    }

    #[test]
    fn test_walk_forward_folds() {
        let dataset = Dataset::new((0..23).map(|i| vec![i as f64]).collect(), vec![0.0; 23]);
        let folds = dataset.walk_forward_folds(4);

        // 23 rows / 5 blocks -> 4 rows per block, remainder in the last test block
        let shapes: Vec<(usize, usize)> = folds.iter().map(|(fit, test)| (fit.len(), test.len())).collect();
        assert_eq!(shapes, vec![(4, 4), (8, 4), (12, 4), (16, 7)]);
        for (fit, test) in &folds {
            // Never trains on rows after the test block starts
            assert!(fit.features.last().unwrap()[0] < test.features[0][0]);
        }
        assert_eq!(folds[3].1.features.last().unwrap()[0], 22.0);

        assert!(dataset.walk_forward_folds(0).is_empty());
        assert!(Dataset::new(vec![vec![1.0]; 3], vec![1.0; 3]).walk_forward_folds(5).is_empty());
    }

    #[test]
    fn test_feature_means() {
        let dataset = Dataset::new(vec![vec![1.0, 10.0], vec![3.0, 20.0]], vec![0.0, 1.0]);
        let means = dataset.feature_means();
        assert_relative_eq!(means[0], 2.0);
        assert_relative_eq!(means[1], 15.0);
        assert_relative_eq!(dataset.base_rate(), 0.5);
    }
}
