use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Typical price (H+L+C)/3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// News headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: String,
}

impl Headline {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            published: None,
            source: String::new(),
        }
    }
}

/// Which engine produced an opinion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpinionSource {
    Ml,
    Technical,
    Sentiment,
}

impl OpinionSource {
    pub fn label(&self) -> &'static str {
        match self {
            OpinionSource::Ml => "ml",
            OpinionSource::Technical => "technical",
            OpinionSource::Sentiment => "sentiment",
        }
    }
}

/// How much an opinion can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sufficiency {
    Sufficient,
    LowConfidence,
    /// Nothing to say; fusion redistributes this opinion's weight.
    NoData,
}

/// One sub-score feeding fusion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub source: OpinionSource,
    /// -100 (bearish) to 100 (bullish)
    pub score: f64,
    pub confidence: f64, // 0.0 to 1.0
    pub sufficiency: Sufficiency,
}

impl Opinion {
    pub fn new(source: OpinionSource, score: f64, confidence: f64, sufficiency: Sufficiency) -> Self {
        Self {
            source,
            score: clamp_score(score),
            confidence: if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 },
            sufficiency,
        }
    }

    pub fn sufficient(source: OpinionSource, score: f64) -> Self {
        Self::new(source, score, 1.0, Sufficiency::Sufficient)
    }

    pub fn no_data(source: OpinionSource) -> Self {
        Self {
            source,
            score: 0.0,
            confidence: 0.0,
            sufficiency: Sufficiency::NoData,
        }
    }

    /// Usable by fusion: has data and a finite score.
    pub fn is_available(&self) -> bool {
        self.sufficiency != Sufficiency::NoData && self.score.is_finite()
    }
}

/// Clamp to [-100, 100]; non-finite input collapses to neutral.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(-100.0, 100.0)
    } else {
        0.0
    }
}

/// Discrete trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl Signal {
    /// Human-readable label for the signal
    pub fn to_label(&self) -> &'static str {
        match self {
            Signal::StrongSell => "STRONG SELL",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
            Signal::Buy => "BUY",
            Signal::StrongBuy => "STRONG BUY",
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Signal::Hold)
    }
}

/// Audit record of one sub-score's part in a fusion run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentContribution {
    pub source: OpinionSource,
    pub score: f64,
    pub configured_weight: f64,
    /// Weight after redistribution; 0 when unavailable
    pub effective_weight: f64,
    pub available: bool,
}

/// Fused output for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSignal {
    pub ticker: String,
    /// -100 to 100
    pub edge_score: i32,
    /// Unrounded weighted sum, before clamping
    pub raw_score: f64,
    pub signal: Signal,
    pub ml_score: Option<f64>,
    pub ta_score: Option<f64>,
    pub sentiment_score: Option<f64>,
    pub components: Vec<ComponentContribution>,
    pub computed_at: DateTime<Utc>,
}

impl EdgeSignal {
    pub fn available_sources(&self) -> Vec<OpinionSource> {
        self.components
            .iter()
            .filter(|c| c.available)
            .map(|c| c.source)
            .collect()
    }
}
