use analysis_core::{
    AnalysisError, ComponentContribution, EdgeSignal, FusionConfig, Opinion, OpinionSource, Signal,
    SignalThresholds,
};
use chrono::Utc;

const ROUNDING_GRID: f64 = 1e9;

/// Map an edge score onto the five-way signal. Boundaries are inclusive.
pub fn classify(edge_score: i32, thresholds: &SignalThresholds) -> Signal {
    if edge_score >= thresholds.strong_buy {
        Signal::StrongBuy
    } else if edge_score >= thresholds.buy {
        Signal::Buy
    } else if edge_score <= thresholds.strong_sell {
        Signal::StrongSell
    } else if edge_score <= thresholds.sell {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Weighted composite of the three sub-scores.
///
/// Unavailable opinions drop out and their weight is spread proportionally
/// over the remaining ones, so effective weights always sum to 1.
#[derive(Debug, Clone, Default)]
pub struct FusionScorer {
    config: FusionConfig,
}

impl FusionScorer {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn classify(&self, edge_score: i32) -> Signal {
        classify(edge_score, &self.config.thresholds)
    }

    pub fn fuse(
        &self,
        ticker: &str,
        ml: &Opinion,
        ta: &Opinion,
        sentiment: &Opinion,
    ) -> Result<EdgeSignal, AnalysisError> {
        let weights = &self.config.weights;
        let inputs = [
            (OpinionSource::Ml, ml, weights.ml),
            (OpinionSource::Technical, ta, weights.technical),
            (OpinionSource::Sentiment, sentiment, weights.sentiment),
        ];

        let available_weight: f64 = inputs
            .iter()
            .filter(|(_, opinion, _)| opinion.is_available())
            .map(|(_, _, weight)| weight)
            .sum();
        if available_weight <= 0.0 {
            tracing::warn!(ticker, "no usable opinion to fuse");
            return Err(AnalysisError::NoData(format!(
                "{ticker}: no ML, technical or sentiment opinion available"
            )));
        }

        let components: Vec<ComponentContribution> = inputs
            .iter()
            .map(|&(source, opinion, weight)| {
                let available = opinion.is_available();
                ComponentContribution {
                    source,
                    score: if available { opinion.score } else { 0.0 },
                    configured_weight: weight,
                    effective_weight: if available { weight / available_weight } else { 0.0 },
                    available,
                }
            })
            .collect();

        let raw_score: f64 = components.iter().map(|c| c.effective_weight * c.score).sum();
        // Snap float noise first so 54.49999999 rounds like 54.5; f64::round is half away from zero
        let snapped = (raw_score * ROUNDING_GRID).round() / ROUNDING_GRID;
        let edge_score = snapped.round().clamp(-100.0, 100.0) as i32;
        let signal = self.classify(edge_score);

        let score_of = |source: OpinionSource| {
            components
                .iter()
                .find(|c| c.source == source && c.available)
                .map(|c| c.score)
        };
        let missing: Vec<&str> = components
            .iter()
            .filter(|c| !c.available)
            .map(|c| c.source.label())
            .collect();
        if !missing.is_empty() {
            tracing::debug!(ticker, ?missing, "redistributed weight of missing opinions");
        }

        let edge = EdgeSignal {
            ticker: ticker.to_string(),
            edge_score,
            raw_score,
            signal,
            ml_score: score_of(OpinionSource::Ml),
            ta_score: score_of(OpinionSource::Technical),
            sentiment_score: score_of(OpinionSource::Sentiment),
            components,
            computed_at: Utc::now(),
        };

        tracing::info!(
            ticker,
            edge_score,
            signal = signal.to_label(),
            ml = ?edge.ml_score,
            ta = ?edge.ta_score,
            sentiment = ?edge.sentiment_score,
            "fused edge signal"
        );
        Ok(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::FusionWeights;
    use approx::assert_relative_eq;

    fn ml(score: f64) -> Opinion {
        Opinion::sufficient(OpinionSource::Ml, score)
    }

    fn ta(score: f64) -> Opinion {
        Opinion::sufficient(OpinionSource::Technical, score)
    }

    fn sent(score: f64) -> Opinion {
        Opinion::sufficient(OpinionSource::Sentiment, score)
    }

    #[test]
    fn test_weighted_example() {
        let scorer = FusionScorer::default();
        let edge = scorer.fuse("ACME", &ml(40.0), &ta(70.0), &sent(60.0)).unwrap();
        // 18 + 24.5 + 12
        assert_relative_eq!(edge.raw_score, 54.5, epsilon = 1e-9);
        assert_eq!(edge.edge_score, 55);
        assert_eq!(edge.signal, Signal::Buy);
        assert_eq!(edge.ml_score, Some(40.0));
    }

    #[test]
    fn test_classification_boundaries() {
        let t = SignalThresholds::default();
        assert_eq!(classify(100, &t), Signal::StrongBuy);
        assert_eq!(classify(60, &t), Signal::StrongBuy);
        assert_eq!(classify(59, &t), Signal::Buy);
        assert_eq!(classify(25, &t), Signal::Buy);
        assert_eq!(classify(24, &t), Signal::Hold);
        assert_eq!(classify(0, &t), Signal::Hold);
        assert_eq!(classify(-24, &t), Signal::Hold);
        assert_eq!(classify(-25, &t), Signal::Sell);
        assert_eq!(classify(-59, &t), Signal::Sell);
        assert_eq!(classify(-60, &t), Signal::StrongSell);
        assert_eq!(classify(-100, &t), Signal::StrongSell);
    }

    #[test]
    fn test_missing_sentiment_redistributes() {
        let scorer = FusionScorer::default();
        let edge = scorer
            .fuse("ACME", &ml(40.0), &ta(70.0), &Opinion::no_data(OpinionSource::Sentiment))
            .unwrap();

        let effective: f64 = edge.components.iter().map(|c| c.effective_weight).sum();
        assert_relative_eq!(effective, 1.0, epsilon = 1e-12);
        assert_relative_eq!(edge.components[0].effective_weight, 0.45 / 0.8, epsilon = 1e-12);
        assert_relative_eq!(edge.raw_score, (0.45 * 40.0 + 0.35 * 70.0) / 0.8, epsilon = 1e-9);
        assert_eq!(edge.sentiment_score, None);
        assert_eq!(
            edge.available_sources(),
            vec![OpinionSource::Ml, OpinionSource::Technical]
        );
    }

    #[test]
    fn test_single_source_takes_full_weight() {
        let scorer = FusionScorer::default();
        let edge = scorer
            .fuse(
                "ACME",
                &Opinion::no_data(OpinionSource::Ml),
                &ta(-70.0),
                &Opinion::no_data(OpinionSource::Sentiment),
            )
            .unwrap();
        assert_eq!(edge.edge_score, -70);
        assert_eq!(edge.signal, Signal::StrongSell);
    }

    #[test]
    fn test_no_data_errors() {
        let scorer = FusionScorer::default();
        let result = scorer.fuse(
            "ACME",
            &Opinion::no_data(OpinionSource::Ml),
            &Opinion::no_data(OpinionSource::Technical),
            &Opinion::no_data(OpinionSource::Sentiment),
        );
        assert!(matches!(result, Err(AnalysisError::NoData(_))));
    }

    #[test]
    fn test_zero_weight_source_alone_is_no_data() {
        let config = FusionConfig {
            weights: FusionWeights::new(0.6, 0.4, 0.0).unwrap(),
            ..FusionConfig::default()
        };
        let scorer = FusionScorer::new(config);
        let result = scorer.fuse(
            "ACME",
            &Opinion::no_data(OpinionSource::Ml),
            &Opinion::no_data(OpinionSource::Technical),
            &sent(80.0),
        );
        assert!(matches!(result, Err(AnalysisError::NoData(_))));
    }

    #[test]
    fn test_low_confidence_still_counts() {
        let scorer = FusionScorer::default();
        let low = Opinion::new(OpinionSource::Sentiment, 50.0, 0.1, analysis_core::Sufficiency::LowConfidence);
        let edge = scorer.fuse("ACME", &ml(0.0), &ta(0.0), &low).unwrap();
        assert_eq!(edge.edge_score, 10);
        assert_eq!(edge.signal, Signal::Hold);
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        let scorer = FusionScorer::default();
        let up = scorer
            .fuse("A", &Opinion::no_data(OpinionSource::Ml), &Opinion::no_data(OpinionSource::Technical), &sent(24.5))
            .unwrap();
        assert_eq!(up.edge_score, 25);
        assert_eq!(up.signal, Signal::Buy);

        let down = scorer
            .fuse("A", &Opinion::no_data(OpinionSource::Ml), &Opinion::no_data(OpinionSource::Technical), &sent(-24.5))
            .unwrap();
        assert_eq!(down.edge_score, -25);
        assert_eq!(down.signal, Signal::Sell);
    }
}
