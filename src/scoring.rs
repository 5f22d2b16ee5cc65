//! # Scoring Engine
//! Pure, testable logic that maps a set of topic observations → `ScoreResult`.
//! No I/O, suitable for unit tests and offline evaluation.
//!
//! Policy: volume-weighted mean sentiment, shifted by +0.5 and clamped to
//! [0,1] (λF). Tiering uses fixed, strict thresholds: >0.7 Critical,
//! >0.5 Risky, else Normal. Zero total volume is not an error; the average
//! is defined as 0.0.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shift applied to the average sentiment before clamping.
pub const LAMBDA_SHIFT: f64 = 0.5;
/// λF strictly above this is `Risky`.
pub const RISKY_THRESHOLD: f64 = 0.5;
/// λF strictly above this is `Critical`.
pub const CRITICAL_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObservationError {
    #[error("topic must not be empty")]
    EmptyTopic,
    #[error("sentiment for '{topic}' must be within [-1.0, 1.0], got {value}")]
    SentimentOutOfRange { topic: String, value: f64 },
}

/// One topic's sentiment/volume sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub topic: String,
    pub sentiment: f64,
    pub volume: u64,
}

impl Observation {
    /// Validating constructor: non-blank topic, finite sentiment in [-1,1].
    pub fn new(
        topic: impl Into<String>,
        sentiment: f64,
        volume: u64,
    ) -> Result<Self, ObservationError> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(ObservationError::EmptyTopic);
        }
        if !sentiment.is_finite() || !(-1.0..=1.0).contains(&sentiment) {
            return Err(ObservationError::SentimentOutOfRange {
                topic,
                value: sentiment,
            });
        }
        Ok(Self {
            topic,
            sentiment,
            volume,
        })
    }
}

/// Wire shape of a topic at the input boundary:
/// `{keyword, sentiment_score, tweet_count}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicInput {
    pub keyword: String,
    pub sentiment_score: f64,
    pub tweet_count: u64,
}

impl TryFrom<TopicInput> for Observation {
    type Error = ObservationError;

    fn try_from(t: TopicInput) -> Result<Self, Self::Error> {
        Observation::new(t.keyword, t.sentiment_score, t.tweet_count)
    }
}

impl From<&Observation> for TopicInput {
    fn from(o: &Observation) -> Self {
        Self {
            keyword: o.topic.clone(),
            sentiment_score: o.sentiment,
            tweet_count: o.volume,
        }
    }
}

/// Observations keyed by topic. Inserting an existing topic replaces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationSet {
    inner: BTreeMap<String, Observation>,
}

impl ObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins; returns the displaced observation, if any.
    pub fn insert(&mut self, obs: Observation) -> Option<Observation> {
        self.inner.insert(obs.topic.clone(), obs)
    }

    pub fn get(&self, topic: &str) -> Option<&Observation> {
        self.inner.get(topic)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates in topic order.
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.inner.values()
    }

    /// Validate a batch of wire inputs into a set (duplicates: last wins).
    pub fn from_inputs<I>(inputs: I) -> Result<Self, ObservationError>
    where
        I: IntoIterator<Item = TopicInput>,
    {
        let mut set = Self::new();
        for t in inputs {
            set.insert(Observation::try_from(t)?);
        }
        Ok(set)
    }

    pub fn to_inputs(&self) -> Vec<TopicInput> {
        self.iter().map(TopicInput::from).collect()
    }
}

impl FromIterator<Observation> for ObservationSet {
    fn from_iter<T: IntoIterator<Item = Observation>>(iter: T) -> Self {
        let mut set = Self::new();
        for o in iter {
            set.insert(o);
        }
        set
    }
}

/// Risk tier derived from λF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Normal,
    Risky,
    Critical,
}

impl Tier {
    /// First match wins; both thresholds are strict.
    pub fn classify(lambda_f: f64) -> Self {
        if lambda_f > CRITICAL_THRESHOLD {
            Tier::Critical
        } else if lambda_f > RISKY_THRESHOLD {
            Tier::Risky
        } else {
            Tier::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Normal => "Normal",
            Tier::Risky => "Risky",
            Tier::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable scored result. Fields are only reachable through getters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    average_sentiment: f64,
    lambda_f: f64,
    tier: Tier,
    timestamp: DateTime<Utc>,
    observations: ObservationSet,
}

impl ScoreResult {
    pub fn average_sentiment(&self) -> f64 {
        self.average_sentiment
    }

    pub fn lambda_f(&self) -> f64 {
        self.lambda_f
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn observations(&self) -> &ObservationSet {
        &self.observations
    }
}

/// λF = clamp(avg + 0.5, 0, 1).
pub fn lambda_from_average(average_sentiment: f64) -> f64 {
    (average_sentiment + LAMBDA_SHIFT).clamp(0.0, 1.0)
}

/// Volume-weighted mean sentiment; 0.0 when total volume is 0.
/// Both totals are summed in `f64` so volumes near `u64::MAX` cannot overflow.
pub fn average_sentiment(observations: &ObservationSet) -> f64 {
    let mut total_weighted = 0.0f64;
    let mut total_volume = 0.0f64;
    for o in observations.iter() {
        let volume = o.volume as f64;
        total_weighted += volume * o.sentiment;
        total_volume += volume;
    }
    if total_volume > 0.0 {
        total_weighted / total_volume
    } else {
        0.0
    }
}

/// Score the set, stamped with the current time.
pub fn compute_score(observations: &ObservationSet) -> ScoreResult {
    compute_score_at(observations, Utc::now())
}

/// Same as [`compute_score`] but with a caller-supplied timestamp.
pub fn compute_score_at(observations: &ObservationSet, timestamp: DateTime<Utc>) -> ScoreResult {
    let avg = average_sentiment(observations);
    let lambda_f = lambda_from_average(avg);
    ScoreResult {
        average_sentiment: avg,
        lambda_f,
        tier: Tier::classify(lambda_f),
        timestamp,
        observations: observations.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs(topic: &str, s: f64, v: u64) -> Observation {
        Observation::new(topic, s, v).unwrap()
    }

    #[test]
    fn opposite_topics_cancel_out() {
        let set: ObservationSet = vec![obs("A", 1.0, 10), obs("B", -1.0, 10)]
            .into_iter()
            .collect();
        let r = compute_score(&set);
        assert_eq!(r.average_sentiment(), 0.0);
        assert_eq!(r.lambda_f(), 0.5);
        assert_eq!(r.tier(), Tier::Normal);
    }

    #[test]
    fn strong_single_topic_is_critical_and_clamped() {
        let set: ObservationSet = vec![obs("A", 0.8, 100)].into_iter().collect();
        let r = compute_score(&set);
        assert!((r.average_sentiment() - 0.8).abs() < 1e-12);
        assert_eq!(r.lambda_f(), 1.0);
        assert_eq!(r.tier(), Tier::Critical);
    }

    #[test]
    fn empty_set_is_neutral() {
        let r = compute_score(&ObservationSet::new());
        assert_eq!(r.average_sentiment(), 0.0);
        assert_eq!(r.lambda_f(), 0.5);
        assert_eq!(r.tier(), Tier::Normal);
    }

    #[test]
    fn zero_volume_is_defined_as_zero_average() {
        let set: ObservationSet = vec![obs("A", 0.9, 0), obs("B", -0.4, 0)]
            .into_iter()
            .collect();
        assert_eq!(average_sentiment(&set), 0.0);
    }

    #[test]
    fn tier_boundaries_are_strict() {
        assert_eq!(Tier::classify(0.5), Tier::Normal);
        assert_eq!(Tier::classify(0.5000001), Tier::Risky);
        assert_eq!(Tier::classify(0.7), Tier::Risky);
        assert_eq!(Tier::classify(0.70001), Tier::Critical);
        assert_eq!(Tier::classify(0.0), Tier::Normal);
        assert_eq!(Tier::classify(1.0), Tier::Critical);
    }

    #[test]
    fn lambda_clamps_at_both_ends() {
        assert_eq!(lambda_from_average(-1.0), 0.0);
        assert_eq!(lambda_from_average(1.0), 1.0);
        assert!((lambda_from_average(0.1) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn duplicate_topic_last_write_wins() {
        let mut set = ObservationSet::new();
        assert!(set.insert(obs("Fed", 0.2, 5)).is_none());
        let prev = set.insert(obs("Fed", -0.6, 50)).unwrap();
        assert_eq!(prev.sentiment, 0.2);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("Fed").unwrap().volume, 50);
    }

    #[test]
    fn observation_validation() {
        assert_eq!(
            Observation::new("   ", 0.1, 1).unwrap_err(),
            ObservationError::EmptyTopic
        );
        assert!(matches!(
            Observation::new("X", 1.5, 1),
            Err(ObservationError::SentimentOutOfRange { .. })
        ));
        assert!(Observation::new("X", f64::NAN, 1).is_err());
        assert_eq!(Observation::new(" X ", -1.0, 0).unwrap().topic, "X");
    }

    #[test]
    fn same_input_same_output_with_fixed_timestamp() {
        let ts = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        let set: ObservationSet = vec![obs("A", 0.3, 7), obs("B", -0.1, 3)]
            .into_iter()
            .collect();
        assert_eq!(compute_score_at(&set, ts), compute_score_at(&set, ts));
    }

    #[test]
    fn serialized_tier_names() {
        let v = serde_json::to_value(Tier::Risky).unwrap();
        assert_eq!(v, serde_json::json!("Risky"));
    }
}
