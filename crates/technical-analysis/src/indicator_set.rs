use std::collections::BTreeMap;
use std::fmt;

use analysis_core::{AnalysisError, IndicatorConfig, PriceBar};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::indicators::*;

pub const INDICATOR_COUNT: usize = 17;

/// The fixed set of indicators. Declaration order is the model feature order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Indicator {
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "MACD_Signal")]
    MacdSignal,
    #[serde(rename = "MACD_Hist")]
    MacdHist,
    #[serde(rename = "BB_Pct")]
    BbPct,
    #[serde(rename = "BB_Width")]
    BbWidth,
    #[serde(rename = "Stoch_K")]
    StochK,
    #[serde(rename = "Stoch_D")]
    StochD,
    #[serde(rename = "ATR")]
    Atr,
    #[serde(rename = "CCI")]
    Cci,
    #[serde(rename = "Williams_R")]
    WilliamsR,
    #[serde(rename = "Volume_Ratio")]
    VolumeRatio,
    #[serde(rename = "ROC_5")]
    Roc5,
    #[serde(rename = "ROC_10")]
    Roc10,
    #[serde(rename = "SMA_20")]
    Sma20,
    #[serde(rename = "SMA_50")]
    Sma50,
    #[serde(rename = "OBV")]
    Obv,
}

impl Indicator {
    pub const ALL: [Indicator; INDICATOR_COUNT] = [
        Indicator::Rsi,
        Indicator::Macd,
        Indicator::MacdSignal,
        Indicator::MacdHist,
        Indicator::BbPct,
        Indicator::BbWidth,
        Indicator::StochK,
        Indicator::StochD,
        Indicator::Atr,
        Indicator::Cci,
        Indicator::WilliamsR,
        Indicator::VolumeRatio,
        Indicator::Roc5,
        Indicator::Roc10,
        Indicator::Sma20,
        Indicator::Sma50,
        Indicator::Obv,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Indicator::Rsi => "RSI",
            Indicator::Macd => "MACD",
            Indicator::MacdSignal => "MACD_Signal",
            Indicator::MacdHist => "MACD_Hist",
            Indicator::BbPct => "BB_Pct",
            Indicator::BbWidth => "BB_Width",
            Indicator::StochK => "Stoch_K",
            Indicator::StochD => "Stoch_D",
            Indicator::Atr => "ATR",
            Indicator::Cci => "CCI",
            Indicator::WilliamsR => "Williams_R",
            Indicator::VolumeRatio => "Volume_Ratio",
            Indicator::Roc5 => "ROC_5",
            Indicator::Roc10 => "ROC_10",
            Indicator::Sma20 => "SMA_20",
            Indicator::Sma50 => "SMA_50",
            Indicator::Obv => "OBV",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Bars of history needed before this indicator is defined at the last bar.
    pub fn min_bars(&self, config: &IndicatorConfig) -> usize {
        match self {
            Indicator::Rsi => config.rsi_period + 1,
            Indicator::Macd => config.macd_slow,
            Indicator::MacdSignal | Indicator::MacdHist => config.macd_slow + config.macd_signal - 1,
            Indicator::BbPct | Indicator::BbWidth => config.bollinger_period,
            Indicator::StochK => config.stoch_k_period,
            Indicator::StochD => config.stoch_k_period + config.stoch_d_period - 1,
            Indicator::Atr => config.atr_period + 1,
            Indicator::Cci => config.cci_period,
            Indicator::WilliamsR => config.williams_period,
            Indicator::VolumeRatio => config.volume_period,
            Indicator::Roc5 => config.roc_short + 1,
            Indicator::Roc10 => config.roc_long + 1,
            Indicator::Sma20 => config.sma_short,
            Indicator::Sma50 => config.sma_long,
            Indicator::Obv => 1,
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Indicator snapshot at one bar. `None` marks an undefined value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub as_of: NaiveDate,
    pub close: f64,
    pub values: BTreeMap<Indicator, Option<f64>>,
}

impl IndicatorSet {
    /// All indicators undefined
    pub fn empty(as_of: NaiveDate, close: f64) -> Self {
        Self {
            as_of,
            close,
            values: Indicator::ALL.iter().map(|&ind| (ind, None)).collect(),
        }
    }

    /// Builder-style setter; non-finite values are stored as undefined.
    pub fn with(mut self, indicator: Indicator, value: f64) -> Self {
        self.values.insert(indicator, value.is_finite().then_some(value));
        self
    }

    pub fn get(&self, indicator: Indicator) -> Option<f64> {
        self.values.get(&indicator).copied().flatten()
    }

    pub fn is_defined(&self, indicator: Indicator) -> bool {
        self.get(indicator).is_some()
    }

    pub fn defined_count(&self) -> usize {
        Indicator::ALL.iter().filter(|&&ind| self.is_defined(ind)).count()
    }

    pub fn undefined(&self) -> Vec<Indicator> {
        Indicator::ALL.iter().copied().filter(|&ind| !self.is_defined(ind)).collect()
    }

    /// Values in feature order
    pub fn feature_vector(&self) -> Vec<Option<f64>> {
        Indicator::ALL.iter().map(|&ind| self.get(ind)).collect()
    }
}

/// Indicator columns aligned bar-for-bar with the input history.
#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    dates: Vec<NaiveDate>,
    closes: Vec<f64>,
    columns: Vec<Vec<Option<f64>>>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn value(&self, indicator: Indicator, bar: usize) -> Option<f64> {
        self.columns[indicator.index()].get(bar).copied().flatten()
    }

    /// Snapshot at bar `i`
    pub fn row(&self, i: usize) -> Option<IndicatorSet> {
        if i >= self.len() {
            return None;
        }
        Some(IndicatorSet {
            as_of: self.dates[i],
            close: self.closes[i],
            values: Indicator::ALL
                .iter()
                .map(|&ind| (ind, self.value(ind, i)))
                .collect(),
        })
    }

    /// Snapshot at the last bar
    pub fn latest(&self) -> Option<IndicatorSet> {
        self.len().checked_sub(1).and_then(|i| self.row(i))
    }

    /// Feature vector at bar `i` if every indicator is defined there.
    pub fn complete_features(&self, i: usize) -> Option<Vec<f64>> {
        if i >= self.len() {
            return None;
        }
        self.columns.iter().map(|col| col[i]).collect()
    }
}

/// Reject malformed history instead of silently reordering or clamping it.
pub fn validate_bars(bars: &[PriceBar]) -> Result<(), AnalysisError> {
    if bars.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "price history is empty".to_string(),
        ));
    }

    for (i, bar) in bars.iter().enumerate() {
        let fields = [bar.open, bar.high, bar.low, bar.close, bar.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidInput(format!(
                "bar {i} ({}) has a non-finite field",
                bar.date
            )));
        }
        if bar.volume < 0.0 {
            return Err(AnalysisError::InvalidInput(format!(
                "bar {i} ({}) has negative volume {}",
                bar.date, bar.volume
            )));
        }
        if bar.high < bar.open.max(bar.close).max(bar.low) {
            return Err(AnalysisError::InvalidInput(format!(
                "bar {i} ({}) has high {} below open/close/low",
                bar.date, bar.high
            )));
        }
        if i > 0 && bar.date <= bars[i - 1].date {
            return Err(AnalysisError::InvalidInput(format!(
                "bar {i} ({}) is not after bar {} ({})",
                bar.date,
                i - 1,
                bars[i - 1].date
            )));
        }
    }
    Ok(())
}

/// Compute every indicator for every bar.
pub fn compute_series(bars: &[PriceBar], config: &IndicatorConfig) -> Result<IndicatorSeries, AnalysisError> {
    validate_bars(bars)?;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let macd_result = macd(&closes, config.macd_fast, config.macd_slow, config.macd_signal);
    let bb = bollinger_bands(&closes, config.bollinger_period, config.bollinger_std_dev);
    let stoch = stochastic(bars, config.stoch_k_period, config.stoch_d_period);

    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); INDICATOR_COUNT];
    columns[Indicator::Rsi.index()] = rsi(&closes, config.rsi_period);
    columns[Indicator::Macd.index()] = macd_result.macd_line;
    columns[Indicator::MacdSignal.index()] = macd_result.signal_line;
    columns[Indicator::MacdHist.index()] = macd_result.histogram;
    columns[Indicator::BbPct.index()] = bb.percent_b;
    columns[Indicator::BbWidth.index()] = bb.width;
    columns[Indicator::StochK.index()] = stoch.k;
    columns[Indicator::StochD.index()] = stoch.d;
    columns[Indicator::Atr.index()] = atr(bars, config.atr_period);
    columns[Indicator::Cci.index()] = cci(bars, config.cci_period);
    columns[Indicator::WilliamsR.index()] = williams_r(bars, config.williams_period);
    columns[Indicator::VolumeRatio.index()] = volume_ratio(bars, config.volume_period);
    columns[Indicator::Roc5.index()] = roc(&closes, config.roc_short);
    columns[Indicator::Roc10.index()] = roc(&closes, config.roc_long);
    columns[Indicator::Sma20.index()] = sma(&closes, config.sma_short);
    columns[Indicator::Sma50.index()] = sma(&closes, config.sma_long);
    columns[Indicator::Obv.index()] = obv(bars);

    tracing::debug!(bars = bars.len(), "computed indicator series");

    Ok(IndicatorSeries {
        dates: bars.iter().map(|b| b.date).collect(),
        closes,
        columns,
    })
}

/// Indicator snapshot at the most recent bar.
pub fn compute_indicators(bars: &[PriceBar], config: &IndicatorConfig) -> Result<IndicatorSet, AnalysisError> {
    let series = compute_series(bars, config)?;
    let set = series
        .latest()
        .ok_or_else(|| AnalysisError::InsufficientData("price history is empty".to_string()))?;

    let undefined = set.undefined();
    if !undefined.is_empty() {
        tracing::debug!(
            bars = bars.len(),
            undefined = ?undefined.iter().map(Indicator::name).collect::<Vec<_>>(),
            "some indicators lack history"
        );
    }
    Ok(set)
}
