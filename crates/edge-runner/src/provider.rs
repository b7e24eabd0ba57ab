use std::fs;
use std::path::{Path, PathBuf};

use analysis_core::{AnalysisError, Headline, MarketDataProvider, PriceBar};
use serde::de::DeserializeOwned;

/// Reads `<TICKER>.bars.json` and `<TICKER>.news.json` from one directory.
///
/// Bars are a JSON array of `{date, open, high, low, close, volume}` in
/// chronological order; news is an array of `{title, published?, source?}`.
pub struct FileDataProvider {
    root: PathBuf,
}

impl FileDataProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, ticker: &str, kind: &str) -> PathBuf {
        self.root.join(format!("{}.{kind}.json", ticker.to_uppercase()))
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, AnalysisError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AnalysisError::DataSource(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| AnalysisError::DataSource(format!("{}: {e}", path.display())))
    }
}

impl MarketDataProvider for FileDataProvider {
    fn price_history(&self, ticker: &str, min_bars: usize) -> Result<Vec<PriceBar>, AnalysisError> {
        let bars: Vec<PriceBar> = self.read_json(&self.path_for(ticker, "bars"))?;
        if bars.len() < min_bars {
            tracing::debug!(ticker, bars = bars.len(), min_bars, "price file shorter than requested");
        }
        Ok(bars)
    }

    fn recent_headlines(&self, ticker: &str) -> Result<Vec<Headline>, AnalysisError> {
        self.read_json(&self.path_for(ticker, "news"))
    }
}
