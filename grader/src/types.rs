//! # Types Module
//!
//! Small value types shared by more than one grading phase.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// How serious a finding is.
///
/// Variants are ordered from least to most serious, so `Severity::High >= Severity::Medium`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parses a free-form label. Unknown labels become [`Severity::Medium`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().trim_matches(|c| c == '[' || c == ']').to_ascii_lowercase().as_str() {
            "low" | "minor" => Severity::Low,
            "high" | "major" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// `true` for high and critical findings.
    pub fn is_severe(&self) -> bool {
        *self >= Severity::High
    }

    pub fn all() -> [Severity; 4] {
        [Severity::Low, Severity::Medium, Severity::High, Severity::Critical]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Providers invent their own labels, so decoding never rejects a severity.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Severity::from_label(&label))
    }
}

/// Folds a label-keyed severity histogram into [`Severity`] buckets.
///
/// Labels that resolve to the same severity, such as `"major"` and `"high"`,
/// have their counts summed.
pub fn histogram_from_labels(labels: BTreeMap<String, usize>) -> BTreeMap<Severity, usize> {
    let mut histogram = BTreeMap::new();
    for (label, count) in labels {
        *histogram.entry(Severity::from_label(&label)).or_default() += count;
    }
    histogram
}

/// Rounds to two decimal places.
#[inline]
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label_is_lenient() {
        assert_eq!(Severity::from_label("HIGH"), Severity::High);
        assert_eq!(Severity::from_label(" [critical] "), Severity::Critical);
        assert_eq!(Severity::from_label("low"), Severity::Low);
        assert_eq!(Severity::from_label("catastrophic"), Severity::Medium);
    }

    #[test]
    fn test_ordering_and_severity() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High.is_severe());
        assert!(!Severity::Medium.is_severe());
    }

    #[test]
    fn test_histogram_sums_labels_that_share_a_severity() {
        let labels: BTreeMap<String, usize> =
            serde_json::from_str(r#"{"medium": 2, "moderate": 3, "major": 1, "high": 4, "low": 0}"#).unwrap();
        let histogram = histogram_from_labels(labels);
        assert_eq!(histogram[&Severity::Medium], 5);
        assert_eq!(histogram[&Severity::High], 5);
        assert_eq!(histogram[&Severity::Low], 0);
        assert!(!histogram.contains_key(&Severity::Critical));
    }

    #[test]
    fn test_serde_round_trip_is_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
        let parsed: Vec<Severity> = serde_json::from_str(r#"["critical", "weird"]"#).unwrap();
        assert_eq!(parsed, vec![Severity::Critical, Severity::Medium]);
    }
}
