use std::collections::{HashMap, HashSet};

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't",
    "wasn't", "weren't", "won't", "wouldn't", "couldn't", "shouldn't", "hardly",
    "barely", "neither", "nor", "without",
];

const INTENSIFIERS: &[&str] = &[
    "very", "sharply", "strongly", "significantly", "extremely", "hugely",
    "deeply", "highly", "massively", "substantially", "dramatically",
];

/// Tokens back from a lexicon hit that a negation can reach
const NEGATION_WINDOW: usize = 3;
const INTENSIFIER_SCALE: f64 = 1.3;
const NEGATION_SCALE: f64 = -0.5;

const POSITIVE_WORDS: &[(&str, f64)] = &[
    ("bullish", 0.8), ("rally", 0.7), ("rallies", 0.7), ("surge", 0.8), ("surges", 0.8),
    ("soar", 0.9), ("soars", 0.9), ("gain", 0.5), ("gains", 0.5), ("profit", 0.5),
    ("profitable", 0.6), ("growth", 0.5), ("beat", 0.6), ("beats", 0.6),
    ("upgrade", 0.7), ("upgraded", 0.7), ("outperform", 0.7), ("strong", 0.5),
    ("positive", 0.5), ("rise", 0.4), ("rises", 0.4), ("increase", 0.3),
    ("breakthrough", 0.7), ("innovation", 0.4), ("success", 0.6), ("exceed", 0.6),
    ("exceeds", 0.6), ("momentum", 0.3), ("buy", 0.4), ("recommend", 0.4),
    ("optimistic", 0.6), ("record", 0.5), ("high", 0.2), ("advance", 0.4),
    ("dividend", 0.3), ("buyback", 0.5), ("repurchase", 0.4), ("accretive", 0.5),
    ("upside", 0.5), ("recovery", 0.5), ("rebound", 0.5), ("expansion", 0.4),
    ("robust", 0.6), ("accelerating", 0.5), ("overweight", 0.5), ("raised", 0.4),
    ("reiterated", 0.2), ("outpacing", 0.5), ("tailwind", 0.5), ("approval", 0.6),
    ("jump", 0.6), ("jumps", 0.6), ("win", 0.5), ("wins", 0.5),
];

const NEGATIVE_WORDS: &[(&str, f64)] = &[
    ("bearish", -0.8), ("decline", -0.5), ("declines", -0.5), ("loss", -0.6),
    ("losses", -0.6), ("fall", -0.5), ("falls", -0.5), ("plunge", -0.8),
    ("plunges", -0.8), ("crash", -0.9), ("miss", -0.6), ("misses", -0.6),
    ("downgrade", -0.7), ("downgraded", -0.7), ("underperform", -0.7), ("weak", -0.5),
    ("negative", -0.5), ("drop", -0.5), ("drops", -0.5), ("decrease", -0.3),
    ("concern", -0.4), ("concerns", -0.4), ("risk", -0.3), ("fail", -0.6),
    ("fails", -0.6), ("disappoint", -0.6), ("disappointing", -0.6), ("slump", -0.7),
    ("sell", -0.4), ("warning", -0.6), ("warns", -0.6), ("pessimistic", -0.6),
    ("low", -0.2), ("retreat", -0.4), ("fear", -0.6), ("fears", -0.6),
    ("trouble", -0.5), ("dilution", -0.5), ("dilutive", -0.5), ("headwind", -0.5),
    ("lawsuit", -0.6), ("litigation", -0.5), ("recall", -0.6), ("investigation", -0.6),
    ("subpoena", -0.6), ("default", -0.8), ("bankruptcy", -1.0), ("restructuring", -0.4),
    ("layoff", -0.5), ("layoffs", -0.5), ("downside", -0.5), ("overvalued", -0.5),
    ("bubble", -0.5), ("underweight", -0.5), ("lowered", -0.4), ("suspended", -0.6),
    ("fraud", -0.9), ("tumble", -0.7), ("tumbles", -0.7),
];

/// Scores a piece of text in [-1.0, 1.0]
pub trait PolarityModel: Send + Sync {
    fn polarity(&self, text: &str) -> f64;
}

/// Weighted finance word list with negation and intensifier handling.
pub struct LexiconModel {
    valences: HashMap<&'static str, f64>,
    negations: HashSet<&'static str>,
    intensifiers: HashSet<&'static str>,
}

impl LexiconModel {
    pub fn new() -> Self {
        Self {
            valences: POSITIVE_WORDS.iter().chain(NEGATIVE_WORDS).copied().collect(),
            negations: NEGATION_WORDS.iter().copied().collect(),
            intensifiers: INTENSIFIERS.iter().copied().collect(),
        }
    }

    /// Add or override a lexicon entry; valence is clamped to [-1, 1].
    pub fn with_word(mut self, word: &'static str, valence: f64) -> Self {
        self.valences.insert(word, valence.clamp(-1.0, 1.0));
        self
    }

    pub fn valence(&self, word: &str) -> Option<f64> {
        self.valences.get(word).copied()
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | ':' | '(' | ')'))
            .map(|w| w.trim_matches(|c: char| matches!(c, '"' | '\'' | '-')))
            .filter(|w| !w.is_empty())
            .map(|w| w.replace('\u{2019}', "'"))
            .collect()
    }
}

impl PolarityModel for LexiconModel {
    fn polarity(&self, text: &str) -> f64 {
        let words = Self::tokenize(text);
        let mut matched: Vec<f64> = Vec::new();

        for (i, word) in words.iter().enumerate() {
            let Some(mut valence) = self.valence(word) else {
                continue;
            };

            if i > 0 && self.intensifiers.contains(words[i - 1].as_str()) {
                valence *= INTENSIFIER_SCALE;
            }

            let window_start = i.saturating_sub(NEGATION_WINDOW);
            if words[window_start..i].iter().any(|w| self.negations.contains(w.as_str())) {
                valence *= NEGATION_SCALE;
            }

            matched.push(valence);
        }

        if matched.is_empty() {
            return 0.0;
        }
        let polarity = matched.iter().sum::<f64>() / matched.len() as f64;
        polarity.clamp(-1.0, 1.0)
    }
}

impl Default for LexiconModel {
    fn default() -> Self {
        Self::new()
    }
}
