//! Tolerant decoding of provider answers.
//!
//! Providers are asked for JSON or for labelled plain-text sections, and they
//! do not always comply. Everything here degrades instead of failing: JSON
//! decoding yields [`Decoded::Fallback`] with a reason, section helpers yield
//! `None` or an empty list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::warn;

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```(?:json)?\s*(\{.*\})\s*```").expect("static regex"));

// `_` is a word character, so `\b` keeps `OVERALL_CONFIDENCE:` from matching.
static CONFIDENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bCONFIDENCE\**:\s*\**\s*\[?\s*([0-9]*\.?[0-9]+)").expect("static regex")
});

static LABELED_BOOL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([A-Z][A-Z0-9_]*)\**:\s*\**\s*\[?\s*(true|false)\b").expect("static regex")
});

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```([A-Za-z0-9_+-]*)(.*?)```").expect("static regex"));

/// Outcome of a tolerant decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Parsed(T),
    Fallback { value: T, reason: String },
}

impl<T> Decoded<T> {
    pub fn value(&self) -> &T {
        match self {
            Decoded::Parsed(value) | Decoded::Fallback { value, .. } => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Decoded::Parsed(value) | Decoded::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Decoded::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            Decoded::Parsed(_) => None,
            Decoded::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Unwraps a step answer, recording `step` in `fallback_steps` when it was
/// decoded heuristically.
pub fn note_fallback<T>(decoded: Decoded<T>, step: &str, fallback_steps: &mut Vec<String>) -> T {
    if let Some(reason) = decoded.fallback_reason() {
        warn!(step, reason, "step answer decoded heuristically");
        fallback_steps.push(step.to_string());
    }
    decoded.into_inner()
}

/// Finds the JSON object inside `text`.
///
/// Tries, in order: the whole trimmed text, a fenced ```json block, and the
/// slice between the first `{` and the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    if let Some(caps) = JSON_FENCE.captures(text) {
        if let Some(m) = caps.get(1) {
            return Some(m.as_str());
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Decodes the JSON object embedded in `text` into `T`.
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let json = extract_json_object(text).ok_or_else(|| "no JSON object found in response".to_string())?;
    serde_json::from_str(json).map_err(|e| format!("malformed JSON: {e}"))
}

/// Decodes the JSON object in `text` as `R` and maps it with `parse`.
///
/// When decoding fails the value is built from the raw text by `fallback`,
/// and the result is tagged [`Decoded::Fallback`] with the reason.
pub fn decode_or_else<R, T, P, F>(text: &str, step: &str, parse: P, fallback: F) -> Decoded<T>
where
    R: DeserializeOwned,
    P: FnOnce(R) -> T,
    F: FnOnce(&str) -> T,
{
    match decode_json::<R>(text) {
        Ok(raw) => Decoded::Parsed(parse(raw)),
        Err(reason) => {
            warn!(step, %reason, "structured decode failed, using heuristic fallback");
            Decoded::Fallback {
                value: fallback(text),
                reason,
            }
        }
    }
}

/// Returns the body of the `HEADER:` section, up to the first of `stops` or the end.
///
/// Header matching is case-insensitive. The body is trimmed.
pub fn section<'a>(text: &'a str, header: &str, stops: &[&str]) -> Option<&'a str> {
    let lower = text.to_ascii_lowercase();
    let marker = format!("{}:", header.to_ascii_lowercase());
    let start = lower.find(&marker)? + marker.len();

    let end = stops
        .iter()
        .filter_map(|stop| lower[start..].find(&format!("{}:", stop.to_ascii_lowercase())))
        .min()
        .map(|offset| start + offset)
        .unwrap_or(text.len());

    Some(text[start..end].trim())
}

/// Lines starting with `-` or `•`, marker stripped. Empty items are dropped.
pub fn bullet_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('-').or_else(|| line.strip_prefix('•')))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads `CONFIDENCE: <number>` and clamps it to `[0, 1]`.
pub fn confidence(text: &str) -> Option<f64> {
    CONFIDENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|value| value.clamp(0.0, 1.0))
}

/// Reads `LABEL: true|false`. The label must match a whole identifier.
pub fn labeled_bool(text: &str, label: &str) -> Option<bool> {
    LABELED_BOOL
        .captures_iter(text)
        .find(|caps| caps[1].trim().eq_ignore_ascii_case(label))
        .map(|caps| caps[2].eq_ignore_ascii_case("true"))
}

/// Body of the first ```lang fenced block, or of the first fence of any kind when `lang` is empty.
pub fn fenced_block<'a>(text: &'a str, lang: &str) -> Option<&'a str> {
    FENCE
        .captures_iter(text)
        .find(|caps| lang.is_empty() || caps[1].eq_ignore_ascii_case(lang))
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().trim())
}

/// Clamps a self-reported confidence into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
