use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Identifier of a reasoning entry.
///
/// Agents emit either plain integers or strings such as `thought_1718000000123`
/// and `demo_1718000000456`. Ids are ordered so that a later entry always
/// compares greater than an earlier one:
/// - two numbers compare numerically,
/// - two strings with a trailing numeric suffix compare by that suffix,
/// - ids without a numeric part sort before numbered ones and compare textually.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThoughtId {
    Num(i64),
    Text(String),
}

/// Numeric part of an id. Digit runs compare by length and then textually,
/// so suffixes of any length order correctly.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NumericKey<'a> {
    Negative(i64),
    Digits(usize, Cow<'a, str>),
}

impl<'a> NumericKey<'a> {
    fn digits(raw: Cow<'a, str>) -> Self {
        let trimmed = match raw {
            Cow::Borrowed(s) => Cow::Borrowed(s.trim_start_matches('0')),
            Cow::Owned(s) => Cow::Owned(s.trim_start_matches('0').to_string()),
        };
        NumericKey::Digits(trimmed.len(), trimmed)
    }
}

impl ThoughtId {
    fn numeric_key(&self) -> Option<NumericKey<'_>> {
        match self {
            ThoughtId::Num(n) if *n < 0 => Some(NumericKey::Negative(*n)),
            ThoughtId::Num(n) => Some(NumericKey::digits(Cow::Owned(n.to_string()))),
            ThoughtId::Text(s) => {
                let start = s
                    .char_indices()
                    .rev()
                    .take_while(|(_, c)| c.is_ascii_digit())
                    .last()
                    .map(|(i, _)| i)?;
                Some(NumericKey::digits(Cow::Borrowed(&s[start..])))
            }
        }
    }
}

impl Ord for ThoughtId {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.numeric_key(), other.numeric_key());
        a.is_some()
            .cmp(&b.is_some())
            .then_with(|| a.cmp(&b))
            .then_with(|| self.to_string().cmp(&other.to_string()))
            .then_with(|| matches!(self, ThoughtId::Text(_)).cmp(&matches!(other, ThoughtId::Text(_))))
    }
}

impl PartialOrd for ThoughtId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ThoughtId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThoughtId::Num(n) => write!(f, "{}", n),
            ThoughtId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ThoughtId {
    fn from(n: i64) -> Self {
        ThoughtId::Num(n)
    }
}

impl From<&str> for ThoughtId {
    fn from(s: &str) -> Self {
        ThoughtId::Text(s.to_string())
    }
}

impl From<String> for ThoughtId {
    fn from(s: String) -> Self {
        ThoughtId::Text(s)
    }
}

/// Human verdict on a single reasoning entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Positive,
    Negative,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Positive => "positive",
            Feedback::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Feedback {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Feedback::Positive),
            "negative" => Ok(Feedback::Negative),
            other => Err(format!("invalid feedback '{}'; expected positive|negative", other)),
        }
    }
}

/// One unit of the agent's explainable decision trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningEntry {
    pub id: ThoughtId,
    #[serde(deserialize_with = "super::lenient::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub reasoning: String,
    pub confidence: f64,
    /// Named input signals (values are numbers, labels or nested weight maps)
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub human_feedback: Option<Feedback>,
}

/// Most recent id of a thought list, regardless of the list's ordering
pub fn latest_id(thoughts: &[ReasoningEntry]) -> Option<&ThoughtId> {
    thoughts.iter().map(|t| &t.id).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ids_order_numerically() {
        assert!(ThoughtId::Num(10) > ThoughtId::Num(9));
        assert!(ThoughtId::from("thought_10") > ThoughtId::from("thought_9"));
    }

    #[test]
    fn test_mixed_prefix_ids_order_by_suffix() {
        let agent = ThoughtId::from("thought_1718000000100");
        let demo = ThoughtId::from("demo_1718000000200");
        assert!(demo > agent);
    }

    #[test]
    fn test_long_suffixes_order_by_value() {
        let short = ThoughtId::from("thought_9223372036854775807");
        let long = ThoughtId::from("thought_10000000000000000000000");
        let longer = ThoughtId::from("thought_10000000000000000000001");
        assert!(long > short);
        assert!(longer > long);
        assert!(long > ThoughtId::Num(i64::MAX));
        assert!(long > ThoughtId::from("thought"));
    }

    #[test]
    fn test_leading_zeros_and_negatives() {
        assert!(ThoughtId::from("thought_010") > ThoughtId::from("thought_9"));
        assert!(ThoughtId::from("thought_005") != ThoughtId::from("thought_5"));
        assert_ne!(ThoughtId::from("thought_005").cmp(&ThoughtId::from("thought_5")), Ordering::Equal);
        assert!(ThoughtId::Num(-1) < ThoughtId::Num(0));
        assert!(ThoughtId::Num(-5) < ThoughtId::Num(-2));
        assert!(ThoughtId::Num(-1) > ThoughtId::from("abc"));
    }

    #[test]
    fn test_non_numeric_ids_fall_back_to_text() {
        assert!(ThoughtId::from("b") > ThoughtId::from("a"));
        assert_eq!(ThoughtId::from("x").cmp(&ThoughtId::from("x")), Ordering::Equal);
    }

    #[test]
    fn test_id_deserializes_from_number_or_string() {
        let n: ThoughtId = serde_json::from_str("42").unwrap();
        let s: ThoughtId = serde_json::from_str("\"demo_42\"").unwrap();
        assert_eq!(n, ThoughtId::Num(42));
        assert_eq!(s, ThoughtId::Text("demo_42".into()));
    }

    #[test]
    fn test_entry_round_trips_type_field() {
        let json = r#"{
            "id": "thought_1",
            "timestamp": "2026-02-18T10:30:05Z",
            "type": "TRIANGULATION",
            "reasoning": "aligned",
            "confidence": 0.8,
            "inputs": {"action": "BUY"},
            "human_feedback": null
        }"#;
        let entry: ReasoningEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, "TRIANGULATION");
        assert!(entry.human_feedback.is_none());

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "TRIANGULATION");
    }

    #[test]
    fn test_feedback_parse() {
        assert_eq!("Positive".parse::<Feedback>().unwrap(), Feedback::Positive);
        assert!("meh".parse::<Feedback>().is_err());
    }
}
