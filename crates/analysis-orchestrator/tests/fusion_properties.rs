//! Property tests for fusion and indicator invariants.
//!
//! 1. Edge score bounds and classification agree for any inputs
//! 2. Redistributed weights always sum to one
//! 3. Fusion is monotonic in each sub-score
//! 4. Indicators are finite or undefined, and RSI ignores price scale

use analysis_core::{
    AnalysisError, FusionConfig, IndicatorConfig, Opinion, OpinionSource, PriceBar, Signal, SignalThresholds,
};
use analysis_orchestrator::{classify, FusionScorer};
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use technical_analysis::{compute_indicators, rsi};

// ── Strategies ───────────────────────────────────────────────────────

fn arb_score() -> impl Strategy<Value = f64> {
    -100.0..=100.0_f64
}

fn arb_opinion(source: OpinionSource) -> impl Strategy<Value = Opinion> {
    (arb_score(), any::<bool>()).prop_map(move |(score, available)| {
        if available {
            Opinion::sufficient(source, score)
        } else {
            Opinion::no_data(source)
        }
    })
}

/// Random walk of closes with a consistent OHLCV envelope
fn arb_bars(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<PriceBar>> {
    (
        10.0..500.0_f64,
        prop::collection::vec((-0.05..0.05_f64, 0.0..0.03_f64, 0.0..1e7_f64), min_len..max_len),
    )
        .prop_map(|(start, steps)| {
            let first = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
            let mut close = start;
            steps
                .into_iter()
                .enumerate()
                .map(|(i, (ret, spread, volume))| {
                    let open = close;
                    close = (close * (1.0 + ret)).max(0.01);
                    PriceBar {
                        date: first + Duration::days(i as i64),
                        open,
                        high: open.max(close) * (1.0 + spread),
                        low: open.min(close) * (1.0 - spread),
                        close,
                        volume,
                    }
                })
                .collect()
        })
}

fn rank(signal: Signal) -> i32 {
    match signal {
        Signal::StrongSell => 0,
        Signal::Sell => 1,
        Signal::Hold => 2,
        Signal::Buy => 3,
        Signal::StrongBuy => 4,
    }
}

// ── 1-3. Fusion ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn edge_score_bounded_and_classified(
        ml in arb_opinion(OpinionSource::Ml),
        ta in arb_opinion(OpinionSource::Technical),
        sent in arb_opinion(OpinionSource::Sentiment),
    ) {
        let scorer = FusionScorer::default();
        match scorer.fuse("PROP", &ml, &ta, &sent) {
            Ok(edge) => {
                prop_assert!((-100..=100).contains(&edge.edge_score));
                prop_assert_eq!(edge.signal, classify(edge.edge_score, &SignalThresholds::default()));
            }
            Err(e) => {
                prop_assert!(matches!(e, AnalysisError::NoData(_)));
                prop_assert!(!ml.is_available() && !ta.is_available() && !sent.is_available());
            }
        }
    }

    #[test]
    fn effective_weights_sum_to_one(
        ml in arb_opinion(OpinionSource::Ml),
        ta in arb_opinion(OpinionSource::Technical),
        sent in arb_opinion(OpinionSource::Sentiment),
    ) {
        let scorer = FusionScorer::default();
        if let Ok(edge) = scorer.fuse("PROP", &ml, &ta, &sent) {
            let total: f64 = edge.components.iter().map(|c| c.effective_weight).sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
            for c in &edge.components {
                if !c.available {
                    prop_assert_eq!(c.effective_weight, 0.0);
                }
            }
        }
    }

    #[test]
    fn fusion_monotonic_in_each_score(
        base in prop::array::uniform3(-100.0..=97.0_f64),
        which in 0usize..3,
        bump in 0.5..3.0_f64,
    ) {
        let scorer = FusionScorer::default();
        let opinions = |scores: [f64; 3]| {
            (
                Opinion::sufficient(OpinionSource::Ml, scores[0]),
                Opinion::sufficient(OpinionSource::Technical, scores[1]),
                Opinion::sufficient(OpinionSource::Sentiment, scores[2]),
            )
        };

        let mut raised = base;
        raised[which] += bump;

        let (a_ml, a_ta, a_sent) = opinions(base);
        let (b_ml, b_ta, b_sent) = opinions(raised);
        let before = scorer.fuse("PROP", &a_ml, &a_ta, &a_sent).unwrap();
        let after = scorer.fuse("PROP", &b_ml, &b_ta, &b_sent).unwrap();

        prop_assert!(after.raw_score > before.raw_score);
        prop_assert!(after.edge_score >= before.edge_score);
        prop_assert!(rank(after.signal) >= rank(before.signal));
    }

    #[test]
    fn classification_is_monotonic(a in -100i32..=100, b in -100i32..=100) {
        let thresholds = SignalThresholds::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(rank(classify(lo, &thresholds)) <= rank(classify(hi, &thresholds)));
    }
}

// ── 4. Indicators ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn indicators_finite_or_undefined(bars in arb_bars(50, 120)) {
        let set = compute_indicators(&bars, &IndicatorConfig::default()).unwrap();
        for (indicator, value) in &set.values {
            if let Some(v) = value {
                prop_assert!(v.is_finite(), "{} = {}", indicator, v);
            }
        }
    }

    #[test]
    fn rsi_ignores_price_scale(bars in arb_bars(20, 80), factor in 0.01..1000.0_f64) {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let scaled: Vec<f64> = closes.iter().map(|c| c * factor).collect();
        for (a, b) in rsi(&closes, 14).iter().zip(rsi(&scaled, 14).iter()) {
            match (a, b) {
                (Some(a), Some(b)) => prop_assert!((a - b).abs() < 1e-6, "{} vs {}", a, b),
                (None, None) => {}
                _ => prop_assert!(false, "definedness changed under scaling"),
            }
        }
    }
}

#[test]
fn default_fusion_config_is_valid() {
    assert!(FusionConfig::default().validate().is_ok());
}
