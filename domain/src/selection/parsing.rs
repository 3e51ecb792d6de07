//! Confidence extraction from free-form variation output.
//!
//! Agents often state how sure they are somewhere in their answer
//! ("I'm about 85% confident", "confidence: 0.7", "Confidence 90"). These
//! functions recover that number. They are pure text pattern matching: no
//! I/O, no model calls.
//!
//! | Form | Example | Value |
//! |------|---------|-------|
//! | Percentage | `92%`, `87.5 %` | `0.92`, `0.875` |
//! | Decimal | `0.85`, `1.0` | `0.85`, `1.0` |
//! | Integer after "confidence" | `Confidence: 80`, `confidence is 7/10` | `0.8`, `0.7` |

use regex::Regex;
use std::sync::LazyLock;

static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d.])(\d{1,3}(?:\.\d+)?)\s*%").expect("percent pattern is valid")
});

static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d.])(0\.\d+|1\.0+)(?:$|[^\d.]|\.(?:\D|$))").expect("decimal pattern is valid")
});

static CONFIDENCE_INT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bconfidence\b(?:\s*(?::|=|-|is|of|level|score|at))*\s*(\d{1,3})(?:\s*/\s*(10|100))?\b")
        .expect("confidence pattern is valid")
});

/// Extract a confidence value in [0,1] from output text.
///
/// Tries, in order, a percentage, a decimal in [0,1], then an integer that
/// directly follows the word "confidence". The first form that matches
/// anywhere in the text wins. Returns `None` for empty text or when nothing
/// matches.
///
/// # Examples
///
/// ```
/// use fanout_domain::selection::parsing::parse_confidence_from_output;
///
/// assert_eq!(parse_confidence_from_output("I'm 95% sure this fixes it"), Some(0.95));
/// assert_eq!(parse_confidence_from_output("confidence: 0.8"), Some(0.8));
/// assert_eq!(parse_confidence_from_output("Confidence: 70"), Some(0.7));
/// assert_eq!(parse_confidence_from_output("no idea"), None);
/// ```
pub fn parse_confidence_from_output(text: &str) -> Option<f64> {
    if text.trim().is_empty() {
        return None;
    }

    if let Some(caps) = PERCENT_RE.captures(text)
        && let Ok(value) = caps[1].parse::<f64>()
    {
        return Some(normalize(value / 100.0));
    }

    if let Some(caps) = DECIMAL_RE.captures(text)
        && let Ok(value) = caps[1].parse::<f64>()
    {
        return Some(normalize(value));
    }

    if let Some(caps) = CONFIDENCE_INT_RE.captures(text)
        && let Ok(value) = caps[1].parse::<f64>()
    {
        let scaled = match caps.get(2).map(|m| m.as_str()) {
            Some("10") => value / 10.0,
            Some(_) => value / 100.0,
            None if value > 1.0 => value / 100.0,
            None => value,
        };
        return Some(normalize(scaled));
    }

    None
}

fn normalize(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
