use analysis_core::{
    AnalysisError, EdgeSignal, EngineConfig, Headline, MarketDataProvider, Opinion, OpinionSource, PriceBar,
};
use chrono::{DateTime, Utc};
use ml_engine::{ModelMetrics, ModelRegistry};
use sentiment_analysis::{PolarityModel, SentimentAnalysisEngine, SentimentResult};
use technical_analysis::{IndicatorSet, TechnicalAnalysisEngine};

pub mod batch;
pub mod fusion;
pub use batch::TickerOutcome;
pub use fusion::{classify, FusionScorer};

/// Facade over the indicator, model, sentiment and fusion engines.
///
/// Every operation is synchronous. The engine is `Sync`; share it behind an
/// `Arc` or a plain reference across threads.
pub struct EdgeEngine {
    config: EngineConfig,
    technical_analyzer: TechnicalAnalysisEngine,
    sentiment_analyzer: SentimentAnalysisEngine,
    models: ModelRegistry,
    fusion: FusionScorer,
}

impl EdgeEngine {
    pub fn new(config: EngineConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            technical_analyzer: TechnicalAnalysisEngine::new(),
            sentiment_analyzer: SentimentAnalysisEngine::new(config.sentiment.clone()),
            models: ModelRegistry::new(config.model.clone(), config.indicators.clone()),
            fusion: FusionScorer::new(config.fusion),
            config,
        })
    }

    /// Swap the headline polarity model (the default is the built-in lexicon).
    pub fn with_polarity_model(mut self, model: Box<dyn PolarityModel>) -> Self {
        self.sentiment_analyzer = SentimentAnalysisEngine::with_model(model, self.config.sentiment.clone());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn compute_indicators(&self, bars: &[PriceBar]) -> Result<IndicatorSet, AnalysisError> {
        technical_analysis::compute_indicators(bars, &self.config.indicators)
    }

    pub fn train_model(&self, ticker: &str, bars: &[PriceBar]) -> Result<ModelMetrics, AnalysisError> {
        self.models.train(ticker, bars)
    }

    pub fn predict(&self, ticker: &str, set: &IndicatorSet) -> Result<Opinion, AnalysisError> {
        self.models.predict(ticker, set)
    }

    pub fn analyze_sentiment(&self, headlines: &[Headline]) -> SentimentResult {
        self.analyze_sentiment_at(headlines, Utc::now())
    }

    /// Sentiment with recency measured from `as_of`
    pub fn analyze_sentiment_at(&self, headlines: &[Headline], as_of: DateTime<Utc>) -> SentimentResult {
        self.sentiment_analyzer.analyze(headlines, as_of)
    }

    pub fn technical_opinion(&self, set: &IndicatorSet) -> Opinion {
        self.technical_analyzer.opinion(set)
    }

    pub fn fuse(
        &self,
        ticker: &str,
        ml: &Opinion,
        ta: &Opinion,
        sentiment: &Opinion,
    ) -> Result<EdgeSignal, AnalysisError> {
        self.fusion.fuse(ticker, ml, ta, sentiment)
    }

    pub fn model_metrics(&self, ticker: &str) -> Option<ModelMetrics> {
        self.models.metrics(ticker)
    }

    /// End-to-end signal for one ticker.
    ///
    /// Trains a model on first use. A failing input (prices, model or
    /// headlines) only removes its own opinion; the call errors with `NoData`
    /// when nothing usable is left.
    pub fn generate_signal(
        &self,
        ticker: &str,
        provider: &dyn MarketDataProvider,
    ) -> Result<EdgeSignal, AnalysisError> {
        tracing::info!(ticker, "generating edge signal");

        let bars = match provider.price_history(ticker, self.config.model.min_training_bars) {
            Ok(bars) => Some(bars),
            Err(e) => {
                tracing::warn!(ticker, error = %e, "price history unavailable");
                None
            }
        };

        let indicators = bars.as_deref().and_then(|bars| match self.compute_indicators(bars) {
            Ok(set) => Some(set),
            Err(e) => {
                tracing::warn!(ticker, error = %e, "indicator computation failed");
                None
            }
        });

        let (ml, ta) = match (&bars, &indicators) {
            (Some(bars), Some(set)) => (self.ml_opinion(ticker, bars, set), self.technical_opinion(set)),
            _ => (
                Opinion::no_data(OpinionSource::Ml),
                Opinion::no_data(OpinionSource::Technical),
            ),
        };

        let sentiment = match provider.recent_headlines(ticker) {
            Ok(headlines) => self
                .analyze_sentiment(&headlines)
                .opinion(self.config.sentiment.min_headlines),
            Err(e) => {
                tracing::warn!(ticker, error = %e, "headlines unavailable");
                Opinion::no_data(OpinionSource::Sentiment)
            }
        };

        self.fuse(ticker, &ml, &ta, &sentiment)
    }

    fn ml_opinion(&self, ticker: &str, bars: &[PriceBar], set: &IndicatorSet) -> Opinion {
        if let Err(e) = self.models.train_if_absent(ticker, bars) {
            tracing::warn!(ticker, error = %e, "model training failed, ML opinion unavailable");
            return Opinion::no_data(OpinionSource::Ml);
        }

        match self.predict(ticker, set) {
            Ok(opinion) => opinion,
            Err(e) => {
                tracing::warn!(ticker, error = %e, "prediction failed, ML opinion unavailable");
                Opinion::no_data(OpinionSource::Ml)
            }
        }
    }
}
