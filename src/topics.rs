//! Default topic loader.
//!
//! The defaults file is a JSON array of `{keyword, sentiment_score, tweet_count}`.
//! Anything wrong with it is fatal at startup: no partial run.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::scoring::{ObservationSet, TopicInput};

pub fn load_default_topics<P: AsRef<Path>>(path: P) -> Result<ObservationSet> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading default topics from {}", path.display()))?;
    let set = parse_topics(&data)
        .with_context(|| format!("invalid default topics in {}", path.display()))?;
    tracing::info!(path = %path.display(), topics = set.len(), "default topics loaded");
    Ok(set)
}

pub fn parse_topics(s: &str) -> Result<ObservationSet> {
    let inputs: Vec<TopicInput> = serde_json::from_str(s)?;
    Ok(ObservationSet::from_inputs(inputs)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_shape_and_dedups() {
        let set = parse_topics(
            r#"[
                {"keyword": "Inflation", "sentiment_score": -0.35, "tweet_count": 1200},
                {"keyword": "Jobs", "sentiment_score": 0.2, "tweet_count": 800},
                {"keyword": "Inflation", "sentiment_score": -0.5, "tweet_count": 900}
            ]"#,
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("Inflation").unwrap().volume, 900);
    }

    #[test]
    fn bad_entries_are_fatal() {
        assert!(parse_topics(r#"[{"keyword": "", "sentiment_score": 0.1, "tweet_count": 1}]"#).is_err());
        assert!(parse_topics(r#"[{"keyword": "X", "sentiment_score": 2.0, "tweet_count": 1}]"#).is_err());
        assert!(parse_topics(r#"[{"keyword": "X", "sentiment_score": 0.1, "tweet_count": -4}]"#).is_err());
        assert!(parse_topics("{}").is_err());
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = load_default_topics("no/such/topics.json").unwrap_err();
        assert!(format!("{err:#}").contains("no/such/topics.json"));
    }
}
