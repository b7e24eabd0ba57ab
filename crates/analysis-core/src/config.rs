use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AnalysisError;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Indicator window sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
    pub stoch_k_period: usize,
    pub stoch_d_period: usize,
    pub atr_period: usize,
    pub cci_period: usize,
    pub williams_period: usize,
    pub roc_short: usize,
    pub roc_long: usize,
    pub sma_short: usize,
    pub sma_long: usize,
    pub volume_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
            stoch_k_period: 14,
            stoch_d_period: 3,
            atr_period: 14,
            cci_period: 20,
            williams_period: 14,
            roc_short: 5,
            roc_long: 10,
            sma_short: 20,
            sma_long: 50,
            volume_period: 20,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let windows = [
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bollinger_period", self.bollinger_period),
            ("stoch_k_period", self.stoch_k_period),
            ("stoch_d_period", self.stoch_d_period),
            ("atr_period", self.atr_period),
            ("cci_period", self.cci_period),
            ("williams_period", self.williams_period),
            ("roc_short", self.roc_short),
            ("roc_long", self.roc_long),
            ("sma_short", self.sma_short),
            ("sma_long", self.sma_long),
            ("volume_period", self.volume_period),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, w)| *w == 0) {
            return Err(AnalysisError::Configuration(format!("{name} must be at least 1")));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(AnalysisError::Configuration(format!(
                "macd_fast ({}) must be shorter than macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }
        if !self.bollinger_std_dev.is_finite() || self.bollinger_std_dev <= 0.0 {
            return Err(AnalysisError::Configuration(
                "bollinger_std_dev must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Training algorithm for the per-ticker predictor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    GradientBoosting,
    RandomForest,
}

impl FromStr for Algorithm {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gradient_boosting" => Ok(Algorithm::GradientBoosting),
            "random_forest" => Ok(Algorithm::RandomForest),
            other => Err(AnalysisError::Configuration(format!(
                "unknown model algorithm '{other}' (expected gradient_boosting or random_forest)"
            ))),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::GradientBoosting => write!(f, "gradient_boosting"),
            Algorithm::RandomForest => write!(f, "random_forest"),
        }
    }
}

/// Per-ticker model lifecycle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub algorithm: Algorithm,
    /// Below this many bars, training fails with InsufficientData
    pub min_training_bars: usize,
    /// Below this many labelled samples, predictions are flagged low-confidence
    pub min_training_samples: usize,
    /// Forward horizon (in bars) of the direction label
    pub horizon: usize,
    /// Share of the most recent samples held out for validation
    pub validation_fraction: f64,
    /// Walk-forward cross-validation folds; 0 disables
    pub cv_folds: usize,
    /// Fewer defined indicators than this at predict time gives no ML opinion
    pub min_defined_features: usize,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::GradientBoosting,
            min_training_bars: 80,
            min_training_samples: 60,
            horizon: 5,
            validation_fraction: 0.2,
            cv_folds: 5,
            min_defined_features: 9,
            seed: 42,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.horizon == 0 {
            return Err(AnalysisError::Configuration("horizon must be at least 1 bar".to_string()));
        }
        if self.min_training_bars <= self.horizon {
            return Err(AnalysisError::Configuration(format!(
                "min_training_bars ({}) must exceed the horizon ({})",
                self.min_training_bars, self.horizon
            )));
        }
        if self.min_defined_features == 0 {
            return Err(AnalysisError::Configuration(
                "min_defined_features must be at least 1".to_string(),
            ));
        }
        if !(0.0..0.5).contains(&self.validation_fraction) {
            return Err(AnalysisError::Configuration(
                "validation_fraction must be in [0, 0.5)".to_string(),
            ));
        }
        Ok(())
    }
}

/// How per-headline polarities are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    Mean,
    RecencyWeighted,
    /// Weights 1..=n in input order, so the last headline counts most
    Positional,
}

impl FromStr for AggregationMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(AggregationMode::Mean),
            "recency_weighted" => Ok(AggregationMode::RecencyWeighted),
            "positional" => Ok(AggregationMode::Positional),
            other => Err(AnalysisError::Configuration(format!(
                "unknown sentiment aggregation mode '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    pub mode: AggregationMode,
    /// Fewer headlines than this yields a low-confidence opinion
    pub min_headlines: usize,
    /// Pseudo-count of neutral headlines pulling the aggregate toward 0
    pub prior_weight: f64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            mode: AggregationMode::Mean,
            min_headlines: 3,
            prior_weight: 0.0,
        }
    }
}

impl SentimentConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.prior_weight.is_finite() || self.prior_weight < 0.0 {
            return Err(AnalysisError::Configuration(
                "prior_weight must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fusion weights; must sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub ml: f64,
    pub technical: f64,
    pub sentiment: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            ml: 0.45,
            technical: 0.35,
            sentiment: 0.20,
        }
    }
}

impl FusionWeights {
    pub fn new(ml: f64, technical: f64, sentiment: f64) -> Result<Self, AnalysisError> {
        let weights = Self { ml, technical, sentiment };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, w) in [("ml", self.ml), ("technical", self.technical), ("sentiment", self.sentiment)] {
            if !w.is_finite() || w < 0.0 {
                return Err(AnalysisError::Configuration(format!(
                    "{name} weight must be a non-negative number, got {w}"
                )));
            }
        }
        let sum = self.ml + self.technical + self.sentiment;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AnalysisError::Configuration(format!(
                "fusion weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Edge-score cut points for the five-way signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    pub strong_buy: i32,
    pub buy: i32,
    pub sell: i32,
    pub strong_sell: i32,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            strong_buy: 60,
            buy: 25,
            sell: -25,
            strong_sell: -60,
        }
    }
}

impl SignalThresholds {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.strong_sell < self.sell && self.sell < self.buy && self.buy < self.strong_buy) {
            return Err(AnalysisError::Configuration(format!(
                "signal thresholds must satisfy strong_sell < sell < buy < strong_buy, got {:?}",
                self
            )));
        }
        if self.strong_buy > 100 || self.strong_sell < -100 {
            return Err(AnalysisError::Configuration(
                "signal thresholds must lie within [-100, 100]".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub weights: FusionWeights,
    pub thresholds: SignalThresholds,
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.weights.validate()?;
        self.thresholds.validate()
    }
}

/// Everything the engine reads at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub indicators: IndicatorConfig,
    pub model: ModelConfig,
    pub sentiment: SentimentConfig,
    pub fusion: FusionConfig,
}

impl EngineConfig {
    /// Read overrides from the process environment, then validate.
    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a map in tests, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AnalysisError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            indicators: defaults.indicators,
            model: ModelConfig {
                algorithm: parse_or(&lookup, "EDGE_MODEL_TYPE", defaults.model.algorithm)?,
                min_training_bars: parse_or(&lookup, "EDGE_MIN_TRAINING_BARS", defaults.model.min_training_bars)?,
                min_training_samples: parse_or(
                    &lookup,
                    "EDGE_MIN_TRAINING_SAMPLES",
                    defaults.model.min_training_samples,
                )?,
                horizon: parse_or(&lookup, "EDGE_PREDICTION_HORIZON", defaults.model.horizon)?,
                cv_folds: parse_or(&lookup, "EDGE_CV_FOLDS", defaults.model.cv_folds)?,
                min_defined_features: parse_or(
                    &lookup,
                    "EDGE_MIN_DEFINED_FEATURES",
                    defaults.model.min_defined_features,
                )?,
                ..defaults.model
            },
            sentiment: SentimentConfig {
                mode: parse_or(&lookup, "EDGE_SENTIMENT_MODE", defaults.sentiment.mode)?,
                min_headlines: parse_or(&lookup, "EDGE_MIN_HEADLINES", defaults.sentiment.min_headlines)?,
                ..defaults.sentiment
            },
            fusion: FusionConfig {
                weights: FusionWeights {
                    ml: parse_or(&lookup, "EDGE_WEIGHT_ML", defaults.fusion.weights.ml)?,
                    technical: parse_or(&lookup, "EDGE_WEIGHT_TECHNICAL", defaults.fusion.weights.technical)?,
                    sentiment: parse_or(&lookup, "EDGE_WEIGHT_SENTIMENT", defaults.fusion.weights.sentiment)?,
                },
                thresholds: SignalThresholds {
                    strong_buy: parse_or(&lookup, "EDGE_STRONG_BUY", defaults.fusion.thresholds.strong_buy)?,
                    buy: parse_or(&lookup, "EDGE_BUY", defaults.fusion.thresholds.buy)?,
                    sell: parse_or(&lookup, "EDGE_SELL", defaults.fusion.thresholds.sell)?,
                    strong_sell: parse_or(&lookup, "EDGE_STRONG_SELL", defaults.fusion.thresholds.strong_sell)?,
                },
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.indicators.validate()?;
        self.model.validate()?;
        self.sentiment.validate()?;
        self.fusion.validate()
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AnalysisError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AnalysisError::Configuration(format!("{key}={raw}: {e}"))),
        None => Ok(default),
    }
}
