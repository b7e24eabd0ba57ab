use analysis_core::{AggregationMode, Headline, Opinion, OpinionSource, SentimentConfig, Sufficiency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod lexicon;
pub use lexicon::{LexiconModel, PolarityModel};

/// Weight for headlines whose publication time is unknown
const UNKNOWN_AGE_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > 0.1 {
            SentimentLabel::Positive
        } else if polarity < -0.1 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineSentiment {
    pub title: String,
    pub polarity: f64,
    pub label: SentimentLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub headlines: Vec<HeadlineSentiment>,
    /// Aggregate polarity, -1.0 to 1.0
    pub score: f64,
    pub headline_count: usize,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
    pub no_data: bool,
}

impl SentimentResult {
    pub fn empty() -> Self {
        Self {
            headlines: Vec::new(),
            score: 0.0,
            headline_count: 0,
            positive: 0,
            neutral: 0,
            negative: 0,
            no_data: true,
        }
    }

    /// Share of headlines carrying the most common label
    pub fn dominant_share(&self) -> f64 {
        if self.headline_count == 0 {
            return 0.0;
        }
        let max_count = self.positive.max(self.negative).max(self.neutral);
        max_count as f64 / self.headline_count as f64
    }

    pub fn opinion(&self, min_headlines: usize) -> Opinion {
        if self.no_data || self.headline_count == 0 {
            return Opinion::no_data(OpinionSource::Sentiment);
        }

        let count_confidence = (self.headline_count as f64 / 10.0).min(1.0);
        let confidence = 0.5 * count_confidence + 0.5 * self.dominant_share();
        let sufficiency = if self.headline_count < min_headlines {
            Sufficiency::LowConfidence
        } else {
            Sufficiency::Sufficient
        };
        Opinion::new(OpinionSource::Sentiment, self.score * 100.0, confidence, sufficiency)
    }
}

/// Age-bucket weight of a headline relative to `as_of`.
pub fn recency_weight(published: Option<DateTime<Utc>>, as_of: DateTime<Utc>) -> f64 {
    let Some(published) = published else {
        return UNKNOWN_AGE_WEIGHT;
    };
    let age_hours = (as_of - published).num_hours();

    if age_hours <= 24 {
        // Includes timestamps slightly in the future
        1.0
    } else if age_hours <= 48 {
        0.7
    } else if age_hours <= 168 {
        // 1 week
        0.4
    } else {
        0.2
    }
}

pub struct SentimentAnalysisEngine {
    model: Box<dyn PolarityModel>,
    config: SentimentConfig,
}

impl SentimentAnalysisEngine {
    pub fn new(config: SentimentConfig) -> Self {
        Self::with_model(Box::new(LexiconModel::new()), config)
    }

    pub fn with_model(model: Box<dyn PolarityModel>, config: SentimentConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &SentimentConfig {
        &self.config
    }

    pub fn score_headline(&self, headline: &Headline) -> HeadlineSentiment {
        let raw = self.model.polarity(&headline.title);
        let polarity = if raw.is_finite() { raw.clamp(-1.0, 1.0) } else { 0.0 };
        HeadlineSentiment {
            title: headline.title.clone(),
            polarity,
            label: SentimentLabel::from_polarity(polarity),
        }
    }

    pub fn analyze(&self, headlines: &[Headline], as_of: DateTime<Utc>) -> SentimentResult {
        if headlines.is_empty() {
            tracing::debug!("no headlines to score");
            return SentimentResult::empty();
        }

        let scored: Vec<HeadlineSentiment> = headlines.iter().map(|h| self.score_headline(h)).collect();

        let mut total_score = 0.0;
        let mut total_weight = 0.0;
        for (position, (headline, sentiment)) in headlines.iter().zip(&scored).enumerate() {
            let weight = match self.config.mode {
                AggregationMode::Mean => 1.0,
                AggregationMode::RecencyWeighted => recency_weight(headline.published, as_of),
                AggregationMode::Positional => (position + 1) as f64,
            };
            total_score += sentiment.polarity * weight;
            total_weight += weight;
        }

        let denominator = total_weight + self.config.prior_weight.max(0.0);
        let score = if denominator > 0.0 {
            (total_score / denominator).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        let count = |label: SentimentLabel| scored.iter().filter(|s| s.label == label).count();
        let result = SentimentResult {
            headline_count: scored.len(),
            positive: count(SentimentLabel::Positive),
            neutral: count(SentimentLabel::Neutral),
            negative: count(SentimentLabel::Negative),
            headlines: scored,
            score,
            no_data: false,
        };

        tracing::debug!(
            headlines = result.headline_count,
            positive = result.positive,
            negative = result.negative,
            score,
            "aggregated headline sentiment"
        );
        result
    }

    pub fn opinion(&self, headlines: &[Headline], as_of: DateTime<Utc>) -> Opinion {
        self.analyze(headlines, as_of).opinion(self.config.min_headlines)
    }
}

impl Default for SentimentAnalysisEngine {
    fn default() -> Self {
        Self::new(SentimentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    struct FixedModel;

    impl PolarityModel for FixedModel {
        fn polarity(&self, text: &str) -> f64 {
            text.parse().unwrap_or(f64::NAN)
        }
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 16, 0, 0).unwrap()
    }

    fn fixed_engine(mode: AggregationMode, prior_weight: f64) -> SentimentAnalysisEngine {
        let config = SentimentConfig {
            mode,
            prior_weight,
            ..SentimentConfig::default()
        };
        SentimentAnalysisEngine::with_model(Box::new(FixedModel), config)
    }

    fn headline_at(polarity: f64, hours_ago: Option<i64>) -> Headline {
        Headline {
            title: polarity.to_string(),
            published: hours_ago.map(|h| as_of() - Duration::hours(h)),
            source: "test".to_string(),
        }
    }

    #[test]
    fn test_label_thresholds() {
        assert_eq!(SentimentLabel::from_polarity(0.15), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_polarity(-0.05), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_polarity(-0.3), SentimentLabel::Negative);
        assert_eq!(SentimentLabel::from_polarity(0.1), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_polarity(-0.1), SentimentLabel::Neutral);
    }

    #[test]
    fn test_headline_labels_through_engine() {
        let engine = fixed_engine(AggregationMode::Mean, 0.0);
        let result = engine.analyze(
            &[headline_at(0.15, None), headline_at(-0.05, None), headline_at(-0.3, None)],
            as_of(),
        );
        let labels: Vec<SentimentLabel> = result.headlines.iter().map(|h| h.label).collect();
        assert_eq!(
            labels,
            vec![SentimentLabel::Positive, SentimentLabel::Neutral, SentimentLabel::Negative]
        );
        assert_eq!((result.positive, result.neutral, result.negative), (1, 1, 1));
    }

    #[test]
    fn test_empty_headlines_is_no_data() {
        let engine = SentimentAnalysisEngine::default();
        let result = engine.analyze(&[], as_of());
        assert!(result.no_data);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.opinion(3).sufficiency, Sufficiency::NoData);
    }

    #[test]
    fn test_mean_aggregation() {
        let engine = fixed_engine(AggregationMode::Mean, 0.0);
        let headlines = vec![headline_at(0.6, Some(1)), headline_at(0.2, Some(100)), headline_at(-0.2, None)];
        let result = engine.analyze(&headlines, as_of());
        assert_relative_eq!(result.score, 0.2, epsilon = 1e-12);
        assert!(!result.no_data);
    }

    #[test]
    fn test_recency_weighted_aggregation() {
        let engine = fixed_engine(AggregationMode::RecencyWeighted, 0.0);
        // weights 1.0, 0.7, 0.4 (unknown age)
        let headlines = vec![headline_at(0.6, Some(2)), headline_at(-0.4, Some(30)), headline_at(0.5, None)];
        let result = engine.analyze(&headlines, as_of());
        let expected = (0.6 - 0.28 + 0.2) / 2.1;
        assert_relative_eq!(result.score, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_positional_aggregation_favours_later_headlines() {
        let engine = fixed_engine(AggregationMode::Positional, 0.0);
        let rising: Vec<Headline> = [0.0, 0.5, 1.0].iter().map(|&p| headline_at(p, None)).collect();
        let falling: Vec<Headline> = rising.iter().rev().cloned().collect();

        // (0*1 + 0.5*2 + 1*3) / 6 and (1*1 + 0.5*2 + 0*3) / 6
        assert_relative_eq!(engine.analyze(&rising, as_of()).score, 4.0 / 6.0, epsilon = 1e-12);
        assert_relative_eq!(engine.analyze(&falling, as_of()).score, 2.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_positive_headlines() {
        let headlines: Vec<Headline> = (0..5).map(|_| headline_at(0.6, None)).collect();
        for mode in [AggregationMode::Mean, AggregationMode::Positional] {
            let opinion = fixed_engine(mode, 0.0).opinion(&headlines, as_of());
            assert_relative_eq!(opinion.score, 60.0, epsilon = 1e-9);
            assert_eq!(opinion.sufficiency, Sufficiency::Sufficient);
        }
    }

    #[test]
    fn test_recency_buckets() {
        let at = |hours: i64| recency_weight(Some(as_of() - Duration::hours(hours)), as_of());
        assert_eq!(at(-3), 1.0);
        assert_eq!(at(24), 1.0);
        assert_eq!(at(25), 0.7);
        assert_eq!(at(48), 0.7);
        assert_eq!(at(100), 0.4);
        assert_eq!(at(169), 0.2);
        assert_eq!(recency_weight(None, as_of()), 0.4);
    }

    #[test]
    fn test_prior_weight_shrinks_toward_zero() {
        let engine = fixed_engine(AggregationMode::Mean, 2.0);
        let result = engine.analyze(&[headline_at(0.8, None), headline_at(0.4, None)], as_of());
        // (0.8 + 0.4) / (2 + 2)
        assert_relative_eq!(result.score, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_polarity_is_neutral() {
        let engine = fixed_engine(AggregationMode::Mean, 0.0);
        let result = engine.analyze(&[Headline::new("garbage")], as_of());
        assert_eq!(result.headlines[0].polarity, 0.0);
        assert_eq!(result.headlines[0].label, SentimentLabel::Neutral);
    }

    #[test]
    fn test_opinion_confidence_and_sufficiency() {
        let engine = fixed_engine(AggregationMode::Mean, 0.0);

        let two = engine.analyze(&[headline_at(0.5, None), headline_at(0.3, None)], as_of());
        let opinion = two.opinion(3);
        assert_eq!(opinion.sufficiency, Sufficiency::LowConfidence);
        assert_relative_eq!(opinion.score, 40.0, epsilon = 1e-9);
        // 0.5 * 0.2 + 0.5 * 1.0
        assert_relative_eq!(opinion.confidence, 0.6, epsilon = 1e-12);

        let headlines: Vec<Headline> = [0.5, 0.4, -0.5, 0.0]
            .iter()
            .map(|&p| headline_at(p, None))
            .collect();
        let opinion = engine.opinion(&headlines, as_of());
        assert_eq!(opinion.sufficiency, Sufficiency::Sufficient);
        // 0.5 * 0.4 + 0.5 * 0.5
        assert_relative_eq!(opinion.confidence, 0.45, epsilon = 1e-12);
    }

    #[test]
    fn test_lexicon_engine_end_to_end() {
        let engine = SentimentAnalysisEngine::default();
        let headlines = vec![
            Headline::new("Acme shares surge after record quarter"),
            Headline::new("Analysts upgrade Acme on strong demand"),
            Headline::new("Acme faces lawsuit over patent"),
        ];
        let result = engine.analyze(&headlines, as_of());
        assert_eq!(result.positive, 2);
        assert_eq!(result.negative, 1);
        assert!(result.score > 0.1);
    }
}
