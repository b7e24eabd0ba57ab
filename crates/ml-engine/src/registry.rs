//! Per-ticker model slots with atomic replacement.
//!
//! Each ticker owns a slot holding the published `ModelState` behind an
//! `RwLock<Option<Arc<_>>>` and a training mutex. Training builds the new
//! state without touching the published one, then swaps the pointer under a
//! short write lock. Readers clone the `Arc` and predict outside any lock, so
//! a prediction that started before a retrain finishes on its own snapshot.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use analysis_core::stats::{brier_score, directional_accuracy, mean, population_std_dev, ConfusionMatrix};
use analysis_core::{
    Algorithm, AnalysisError, IndicatorConfig, ModelConfig, Opinion, OpinionSource, PriceBar, Sufficiency,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use technical_analysis::{compute_series, Indicator, IndicatorSet, INDICATOR_COUNT};

use crate::dataset::Dataset;
use crate::predictor::{Predictor, TrainedModel};

/// Fewer labelled rows than this cannot be fitted at all
pub const MIN_FIT_SAMPLES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub ticker: String,
    pub algorithm: Algorithm,
    pub version: u64,
    pub training_samples: usize,
    pub validation_samples: usize,
    pub train_accuracy: f64,
    pub validation_accuracy: Option<f64>,
    pub validation_precision: Option<f64>,
    pub validation_recall: Option<f64>,
    pub validation_f1: Option<f64>,
    pub validation_brier: Option<f64>,
    /// Mean and population std of walk-forward fold accuracies
    pub cv_accuracy: Option<f64>,
    pub cv_std: Option<f64>,
    pub cv_folds: usize,
    pub horizon: usize,
    pub trained_at: DateTime<Utc>,
    /// (indicator name, importance), most important first
    pub feature_importances: Vec<(String, f64)>,
}

/// Immutable once published
#[derive(Debug)]
pub struct ModelState {
    pub model: TrainedModel,
    pub feature_means: Vec<f64>,
    pub metrics: ModelMetrics,
}

impl ModelState {
    /// Up-probability for a raw feature vector in indicator order.
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        self.model.predict_proba(features)
    }

    /// Opinion for one indicator snapshot.
    ///
    /// Undefined indicators are imputed with training means, but with fewer
    /// than `min_defined_features` defined the opinion is `NoData`.
    pub fn predict(&self, set: &IndicatorSet, config: &ModelConfig) -> Opinion {
        let values = set.feature_vector();
        let defined = values.iter().filter(|v| v.is_some()).count();
        let required = config.min_defined_features.max(1);
        if defined < required {
            tracing::debug!(
                ticker = %self.metrics.ticker,
                defined,
                required,
                "too few defined indicators for an ML opinion"
            );
            return Opinion::no_data(OpinionSource::Ml);
        }

        let features: Vec<f64> = values
            .iter()
            .zip(&self.feature_means)
            .map(|(value, mean)| value.unwrap_or(*mean))
            .collect();

        let p_up = self.predict_proba(&features);
        let score = (p_up - 0.5) * 200.0;
        let confidence = (p_up - 0.5).abs() * 2.0 * (defined as f64 / INDICATOR_COUNT as f64);

        let sufficiency = if self.metrics.training_samples < config.min_training_samples || defined < INDICATOR_COUNT {
            Sufficiency::LowConfidence
        } else {
            Sufficiency::Sufficient
        };
        if defined < INDICATOR_COUNT {
            tracing::debug!(
                ticker = %self.metrics.ticker,
                imputed = INDICATOR_COUNT - defined,
                "imputed undefined features with training means"
            );
        }

        Opinion::new(OpinionSource::Ml, score, confidence, sufficiency)
    }
}

#[derive(Default)]
struct ModelSlot {
    state: RwLock<Option<Arc<ModelState>>>,
    training: Mutex<()>,
}

impl ModelSlot {
    fn current(&self) -> Option<Arc<ModelState>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn publish(&self, state: ModelState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(state));
    }
}

/// Accuracy of each forward-chaining fold, skipping folds too small to fit.
fn walk_forward_accuracy(dataset: &Dataset, folds: usize, algorithm: Algorithm, seed: u64) -> Result<Vec<f64>, AnalysisError> {
    dataset
        .walk_forward_folds(folds)
        .into_par_iter()
        .filter(|(fit, test)| fit.len() >= MIN_FIT_SAMPLES && !test.is_empty())
        .map(|(fit, test)| {
            let model = TrainedModel::fit(algorithm, &fit, seed)?;
            let probs: Vec<f64> = test.features.iter().map(|x| model.predict_proba(x)).collect();
            Ok(directional_accuracy(&probs, &test.labels))
        })
        .collect()
}

/// Trained predictors keyed by ticker.
pub struct ModelRegistry {
    config: ModelConfig,
    indicators: IndicatorConfig,
    slots: DashMap<String, Arc<ModelSlot>>,
}

impl ModelRegistry {
    pub fn new(config: ModelConfig, indicators: IndicatorConfig) -> Self {
        Self {
            config,
            indicators,
            slots: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn slot(&self, ticker: &str) -> Arc<ModelSlot> {
        // Clone out so the shard lock is not held while training
        self.slots.entry(ticker.to_string()).or_default().value().clone()
    }

    fn check_history(&self, ticker: &str, bars: &[PriceBar]) -> Result<(), AnalysisError> {
        if bars.len() < self.config.min_training_bars {
            return Err(AnalysisError::InsufficientData(format!(
                "{ticker}: {} bars, need at least {} to train",
                bars.len(),
                self.config.min_training_bars
            )));
        }
        Ok(())
    }

    /// Fit a fresh model for `ticker` and publish it.
    ///
    /// On error the previously published model, if any, stays in place.
    pub fn train(&self, ticker: &str, bars: &[PriceBar]) -> Result<ModelMetrics, AnalysisError> {
        self.check_history(ticker, bars)?;
        let slot = self.slot(ticker);
        let _training = slot.training.lock().unwrap_or_else(PoisonError::into_inner);
        self.fit_and_publish(ticker, bars, &slot)
    }

    /// Train only if no model is published yet, else return the current metrics.
    ///
    /// The check is repeated under the ticker's training lock, so concurrent
    /// first requests train once.
    pub fn train_if_absent(&self, ticker: &str, bars: &[PriceBar]) -> Result<ModelMetrics, AnalysisError> {
        if let Some(state) = self.snapshot(ticker) {
            return Ok(state.metrics.clone());
        }
        self.check_history(ticker, bars)?;

        let slot = self.slot(ticker);
        let _training = slot.training.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = slot.current() {
            return Ok(state.metrics.clone());
        }
        let metrics = self.fit_and_publish(ticker, bars, &slot)?;
        tracing::info!(ticker, version = metrics.version, "trained model on demand");
        Ok(metrics)
    }

    // Caller holds the slot's training lock
    fn fit_and_publish(&self, ticker: &str, bars: &[PriceBar], slot: &ModelSlot) -> Result<ModelMetrics, AnalysisError> {
        let series = compute_series(bars, &self.indicators)?;
        let dataset = Dataset::from_series(&series, self.config.horizon);
        if dataset.len() < MIN_FIT_SAMPLES {
            return Err(AnalysisError::InsufficientData(format!(
                "{ticker}: {} labelled samples, need at least {MIN_FIT_SAMPLES}",
                dataset.len()
            )));
        }

        let algorithm = self.config.algorithm;
        let seed = self.config.seed;

        let (fit_part, validation_part) = dataset.split_chronological(self.config.validation_fraction);
        let validation = if !validation_part.is_empty() && !fit_part.is_empty() {
            let held_out = TrainedModel::fit(algorithm, &fit_part, seed)?;
            let probs: Vec<f64> = validation_part.features.iter().map(|x| held_out.predict_proba(x)).collect();
            Some((
                ConfusionMatrix::from_probabilities(&probs, &validation_part.labels),
                brier_score(&probs, &validation_part.labels),
            ))
        } else {
            None
        };

        let cv_scores = walk_forward_accuracy(&dataset, self.config.cv_folds, algorithm, seed)?;
        let (cv_accuracy, cv_std) = if cv_scores.is_empty() {
            (None, None)
        } else {
            (Some(mean(&cv_scores)), Some(population_std_dev(&cv_scores)))
        };

        let model = TrainedModel::fit(algorithm, &dataset, seed)?;
        let train_probs: Vec<f64> = dataset.features.iter().map(|x| model.predict_proba(x)).collect();
        let train_accuracy = directional_accuracy(&train_probs, &dataset.labels);

        let mut feature_importances: Vec<(String, f64)> = Indicator::ALL
            .iter()
            .zip(model.feature_importances())
            .map(|(indicator, importance)| (indicator.name().to_string(), importance))
            .collect();
        feature_importances.sort_by(|a, b| b.1.total_cmp(&a.1));

        let version = slot.current().map_or(0, |state| state.metrics.version) + 1;
        let metrics = ModelMetrics {
            ticker: ticker.to_string(),
            algorithm,
            version,
            training_samples: dataset.len(),
            validation_samples: validation_part.len(),
            train_accuracy,
            validation_accuracy: validation.map(|(m, _)| m.accuracy()),
            validation_precision: validation.map(|(m, _)| m.precision()),
            validation_recall: validation.map(|(m, _)| m.recall()),
            validation_f1: validation.map(|(m, _)| m.f1()),
            validation_brier: validation.map(|(_, brier)| brier),
            cv_accuracy,
            cv_std,
            cv_folds: cv_scores.len(),
            horizon: self.config.horizon,
            trained_at: Utc::now(),
            feature_importances,
        };

        slot.publish(ModelState {
            model,
            feature_means: dataset.feature_means(),
            metrics: metrics.clone(),
        });

        tracing::info!(
            ticker,
            %algorithm,
            version,
            samples = metrics.training_samples,
            validation_accuracy = ?metrics.validation_accuracy,
            validation_f1 = ?metrics.validation_f1,
            cv_accuracy = ?metrics.cv_accuracy,
            "published model"
        );
        Ok(metrics)
    }

    /// The currently published state, if any.
    pub fn snapshot(&self, ticker: &str) -> Option<Arc<ModelState>> {
        self.slots.get(ticker).and_then(|slot| slot.current())
    }

    pub fn predict(&self, ticker: &str, set: &IndicatorSet) -> Result<Opinion, AnalysisError> {
        let state = self
            .snapshot(ticker)
            .ok_or_else(|| AnalysisError::UntrainedModel(ticker.to_string()))?;
        Ok(state.predict(set, &self.config))
    }

    pub fn metrics(&self, ticker: &str) -> Option<ModelMetrics> {
        self.snapshot(ticker).map(|state| state.metrics.clone())
    }

    pub fn is_trained(&self, ticker: &str) -> bool {
        self.snapshot(ticker).is_some()
    }

    /// Tickers with a published model, sorted
    pub fn trained_tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self
            .slots
            .iter()
            .filter(|entry| entry.value().current().is_some())
            .map(|entry| entry.key().clone())
            .collect();
        tickers.sort();
        tickers
    }
}
