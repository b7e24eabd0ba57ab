use std::cmp::Ordering;

use analysis_core::{AnalysisError, EdgeSignal, MarketDataProvider};
use ml_engine::ModelMetrics;
use rayon::prelude::*;

use super::EdgeEngine;

/// Per-ticker result of a batch operation
#[derive(Debug, Clone, PartialEq)]
pub struct TickerOutcome<T> {
    pub ticker: String,
    pub result: Result<T, AnalysisError>,
}

impl<T> TickerOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn ok(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }
}

/// Successes by edge score (highest first), then failures, both stable.
fn rank(a: &TickerOutcome<EdgeSignal>, b: &TickerOutcome<EdgeSignal>) -> Ordering {
    match (&a.result, &b.result) {
        (Ok(x), Ok(y)) => y.edge_score.cmp(&x.edge_score),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => Ordering::Equal,
    }
}

impl EdgeEngine {
    /// Generate signals for every ticker in parallel.
    pub fn refresh_all(
        &self,
        tickers: &[String],
        provider: &dyn MarketDataProvider,
    ) -> Vec<TickerOutcome<EdgeSignal>> {
        tracing::info!("Refreshing signals for {} tickers", tickers.len());

        let mut outcomes: Vec<TickerOutcome<EdgeSignal>> = tickers
            .par_iter()
            .map(|ticker| TickerOutcome {
                ticker: ticker.clone(),
                result: self.generate_signal(ticker, provider),
            })
            .collect();

        for failed in outcomes.iter().filter(|o| !o.is_ok()) {
            if let Err(e) = &failed.result {
                tracing::warn!(ticker = %failed.ticker, error = %e, "signal refresh failed");
            }
        }

        outcomes.sort_by(rank);

        let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
        tracing::info!(
            "Refresh complete: {}/{} tickers produced a signal",
            succeeded,
            outcomes.len()
        );
        outcomes
    }

    /// Retrain every ticker's model in parallel; results keep input order.
    pub fn retrain_all(
        &self,
        tickers: &[String],
        provider: &dyn MarketDataProvider,
    ) -> Vec<TickerOutcome<ModelMetrics>> {
        tracing::info!("Retraining models for {} tickers", tickers.len());
        let min_bars = self.config().model.min_training_bars;

        let outcomes: Vec<TickerOutcome<ModelMetrics>> = tickers
            .par_iter()
            .map(|ticker| {
                let result = provider
                    .price_history(ticker, min_bars)
                    .and_then(|bars| self.train_model(ticker, &bars));
                if let Err(e) = &result {
                    tracing::warn!(ticker = %ticker, error = %e, "retrain failed, previous model kept");
                }
                TickerOutcome {
                    ticker: ticker.clone(),
                    result,
                }
            })
            .collect();

        let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
        tracing::info!("Retrain complete: {}/{} models published", succeeded, outcomes.len());
        outcomes
    }
}
