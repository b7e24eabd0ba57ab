use crate::{AnalysisError, Headline, PriceBar};

/// Data-layer collaborator that hands the engine already-fetched inputs.
pub trait MarketDataProvider: Send + Sync {
    /// Chronologically ordered daily bars, at least `min_bars` long when available.
    fn price_history(&self, ticker: &str, min_bars: usize) -> Result<Vec<PriceBar>, AnalysisError>;

    /// Most recent headlines for the ticker, any order.
    fn recent_headlines(&self, ticker: &str) -> Result<Vec<Headline>, AnalysisError>;
}
