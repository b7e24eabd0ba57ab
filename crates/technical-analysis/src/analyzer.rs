use analysis_core::stats::sign;
use analysis_core::{AnalysisError, IndicatorConfig, Opinion, OpinionSource, PriceBar, Sufficiency};
use serde::Serialize;

use crate::indicator_set::{compute_indicators, Indicator, IndicatorSet};

// Vote weights; they sum to 1.0.
const TREND_WEIGHT: f64 = 0.25;
const MACD_WEIGHT: f64 = 0.25;
const RSI_WEIGHT: f64 = 0.20;
const ROC_WEIGHT: f64 = 0.10;
const STOCH_WEIGHT: f64 = 0.075;
const BOLLINGER_WEIGHT: f64 = 0.075;
const VOLUME_WEIGHT: f64 = 0.05;

/// Below this share of defined vote weight the opinion is flagged low-confidence.
const MIN_CONFIDENT_WEIGHT: f64 = 0.5;

/// One rule's vote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalVote {
    pub name: &'static str,
    pub weight: f64,
    /// -1.0 (bearish) to 1.0 (bullish); `None` when its inputs are undefined
    pub vote: Option<f64>,
    pub reading: &'static str,
}

/// Technical opinion with the votes that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalAnalysis {
    /// -100 to 100
    pub score: f64,
    pub votes: Vec<TechnicalVote>,
    /// Share of vote weight whose inputs were defined
    pub defined_weight: f64,
    pub reason: String,
}

impl TechnicalAnalysis {
    pub fn opinion(&self) -> Opinion {
        let sufficiency = if self.defined_weight <= 0.0 {
            Sufficiency::NoData
        } else if self.defined_weight < MIN_CONFIDENT_WEIGHT {
            Sufficiency::LowConfidence
        } else {
            Sufficiency::Sufficient
        };
        if sufficiency == Sufficiency::NoData {
            return Opinion::no_data(OpinionSource::Technical);
        }
        Opinion::new(OpinionSource::Technical, self.score, self.defined_weight, sufficiency)
    }
}

/// Turns an indicator snapshot into the technical sub-score.
///
/// Trend-following votes (trend, MACD, RSI, ROC) carry most of the weight;
/// Stochastic and Bollinger readings vote against stretched moves, and volume
/// only confirms or doubts the short-term direction. Undefined inputs vote 0
/// but keep their weight, so missing history pulls the score toward neutral.
pub struct TechnicalAnalysisEngine;

impl TechnicalAnalysisEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, set: &IndicatorSet) -> TechnicalAnalysis {
        let votes = vec![
            trend_vote(set),
            macd_vote(set),
            rsi_vote(set),
            roc_vote(set),
            stochastic_vote(set),
            bollinger_vote(set),
            volume_vote(set),
        ];

        let total: f64 = votes.iter().map(|v| v.weight * v.vote.unwrap_or(0.0)).sum();
        let defined_weight: f64 = votes.iter().filter(|v| v.vote.is_some()).map(|v| v.weight).sum();
        let score = (total * 100.0).clamp(-100.0, 100.0);

        let reason = votes
            .iter()
            .filter_map(|v| match v.vote {
                Some(x) if x > 0.0 => Some(format!("+ {}", v.reading)),
                Some(x) if x < 0.0 => Some(format!("- {}", v.reading)),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(", ");

        tracing::debug!(score, defined_weight, %reason, "technical score");

        TechnicalAnalysis {
            score,
            votes,
            defined_weight,
            reason,
        }
    }

    pub fn opinion(&self, set: &IndicatorSet) -> Opinion {
        self.score(set).opinion()
    }

    /// Compute indicators for `bars` and score the latest bar.
    pub fn analyze(&self, bars: &[PriceBar], config: &IndicatorConfig) -> Result<TechnicalAnalysis, AnalysisError> {
        let set = compute_indicators(bars, config)?;
        Ok(self.score(&set))
    }
}

impl Default for TechnicalAnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn vote(name: &'static str, weight: f64, vote: Option<f64>, reading: &'static str) -> TechnicalVote {
    TechnicalVote {
        name,
        weight,
        vote: vote.map(|v| v.clamp(-1.0, 1.0)),
        reading,
    }
}

fn trend_vote(set: &IndicatorSet) -> TechnicalVote {
    let sma_20 = set.get(Indicator::Sma20);
    let sma_50 = set.get(Indicator::Sma50);
    let Some(short) = sma_20 else {
        return vote("Trend", TREND_WEIGHT, None, "No Trend Data");
    };

    let mut v = 0.5 * sign(set.close - short);
    if let Some(long) = sma_50 {
        v += 0.5 * sign(short - long);
    }
    let reading = if v >= 1.0 {
        "Price Above Rising MAs"
    } else if v <= -1.0 {
        "Price Below Falling MAs"
    } else if v > 0.0 {
        "Mild Uptrend"
    } else if v < 0.0 {
        "Mild Downtrend"
    } else {
        "Mixed Trend"
    };
    vote("Trend", TREND_WEIGHT, Some(v), reading)
}

fn macd_vote(set: &IndicatorSet) -> TechnicalVote {
    let Some(line) = set.get(Indicator::Macd) else {
        return vote("MACD", MACD_WEIGHT, None, "No MACD");
    };
    let (v, reading) = match set.get(Indicator::MacdHist) {
        Some(hist) if line > 0.0 && hist > 0.0 => (1.0, "MACD Bullish Momentum"),
        Some(_) if line > 0.0 => (0.5, "MACD Bullish, Fading"),
        Some(hist) if line < 0.0 && hist < 0.0 => (-1.0, "MACD Bearish Momentum"),
        Some(_) if line < 0.0 => (-0.5, "MACD Bearish, Fading"),
        // Histogram not yet defined: the line's sign alone is a half vote.
        None if line > 0.0 => (0.5, "MACD Above Zero"),
        None if line < 0.0 => (-0.5, "MACD Below Zero"),
        _ => (0.0, "MACD Flat"),
    };
    vote("MACD", MACD_WEIGHT, Some(v), reading)
}

fn rsi_vote(set: &IndicatorSet) -> TechnicalVote {
    match set.get(Indicator::Rsi) {
        Some(rsi) => {
            let reading = if rsi > 70.0 {
                "RSI Strong Momentum"
            } else if rsi < 30.0 {
                "RSI Weak Momentum"
            } else if rsi >= 50.0 {
                "RSI Above Midline"
            } else {
                "RSI Below Midline"
            };
            vote("RSI", RSI_WEIGHT, Some((rsi - 50.0) / 20.0), reading)
        }
        None => vote("RSI", RSI_WEIGHT, None, "No RSI"),
    }
}

fn roc_vote(set: &IndicatorSet) -> TechnicalVote {
    match set.get(Indicator::Roc5) {
        Some(roc) => {
            let reading = if roc >= 0.0 { "Positive 5-Day Return" } else { "Negative 5-Day Return" };
            vote("ROC", ROC_WEIGHT, Some(roc / 5.0), reading)
        }
        None => vote("ROC", ROC_WEIGHT, None, "No ROC"),
    }
}

fn stochastic_vote(set: &IndicatorSet) -> TechnicalVote {
    match set.get(Indicator::StochK) {
        Some(k) if k >= 80.0 => vote("Stochastic", STOCH_WEIGHT, Some(-1.0), "Stochastic Overbought"),
        Some(k) if k <= 20.0 => vote("Stochastic", STOCH_WEIGHT, Some(1.0), "Stochastic Oversold"),
        Some(_) => vote("Stochastic", STOCH_WEIGHT, Some(0.0), "Stochastic Neutral"),
        None => vote("Stochastic", STOCH_WEIGHT, None, "No Stochastic"),
    }
}

fn bollinger_vote(set: &IndicatorSet) -> TechnicalVote {
    match set.get(Indicator::BbPct) {
        Some(pct) if pct > 0.9 => vote("Bollinger", BOLLINGER_WEIGHT, Some(-1.0), "Near Upper Band"),
        Some(pct) if pct < 0.1 => vote("Bollinger", BOLLINGER_WEIGHT, Some(1.0), "Near Lower Band"),
        Some(_) => vote("Bollinger", BOLLINGER_WEIGHT, Some(0.0), "Inside Bands"),
        None => vote("Bollinger", BOLLINGER_WEIGHT, None, "No Bands"),
    }
}

fn volume_vote(set: &IndicatorSet) -> TechnicalVote {
    let (Some(ratio), Some(roc)) = (set.get(Indicator::VolumeRatio), set.get(Indicator::Roc5)) else {
        return vote("Volume", VOLUME_WEIGHT, None, "No Volume Data");
    };
    let direction = sign(roc);
    if ratio >= 1.5 {
        vote("Volume", VOLUME_WEIGHT, Some(direction), "High Volume Confirms Move")
    } else if ratio <= 0.5 {
        vote("Volume", VOLUME_WEIGHT, Some(-0.5 * direction), "Thin Volume Doubts Move")
    } else {
        vote("Volume", VOLUME_WEIGHT, Some(0.0), "Normal Volume")
    }
}
