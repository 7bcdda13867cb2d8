// String-level three-way comparisons used by the per-field strategies.

use crate::schema::format;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Numeric comparison. Values that do not parse as numbers sort before
/// numeric ones; two non-numbers fall back to lexical order.
pub fn compare_numbers(a: &str, b: &str) -> Ordering {
    let na = a.trim().parse::<f64>().ok();
    let nb = b.trim().parse::<f64>().ok();
    match (na, nb) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Parse a formatted boolean value. Empty is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1")
}

/// Boolean comparison: true sorts after false.
pub fn compare_bools(a: &str, b: &str) -> Ordering {
    parse_bool(a).cmp(&parse_bool(b))
}

/// ISO date comparison. Components are zero-padded so lexical order on the
/// normalized Y-M-D string equals chronological order; partial dates sort
/// by whatever components are present.
pub fn compare_iso_dates(a: &str, b: &str) -> Ordering {
    iso_date_key(a).cmp(&iso_date_key(b))
}

fn iso_date_key(value: &str) -> String {
    let mut parts = value.trim().splitn(3, '-');
    let year = parts.next().unwrap_or("");
    let month = parts.next().unwrap_or("");
    let day = parts.next().unwrap_or("");
    format!("{:0>4}-{:0>2}-{:0>2}", year, month, day)
}

/// Title comparison: strips one leading article from each side, then
/// compares case-insensitively.
pub fn compare_titles(a: &str, b: &str, articles: &[String]) -> Ordering {
    let a = format::strip_articles(a, articles).to_lowercase();
    let b = format::strip_articles(b, articles).to_lowercase();
    a.cmp(&b)
}

fn lcc_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z]+)\s*(\d+(?:\.\d+)?)?").expect("lcc regex")
    })
}

/// Library of Congress call-number comparison: alphabetic class prefix
/// compares lexically, the following number numerically, and any cutter
/// remainder lexically.
pub fn compare_lcc(a: &str, b: &str) -> Ordering {
    let (prefix_a, num_a) = split_lcc(a);
    let (prefix_b, num_b) = split_lcc(b);
    prefix_a
        .cmp(&prefix_b)
        .then_with(|| num_a.partial_cmp(&num_b).unwrap_or(Ordering::Equal))
        .then_with(|| a.cmp(b))
}

fn split_lcc(value: &str) -> (String, f64) {
    match lcc_regex().captures(value.trim()) {
        Some(caps) => {
            let prefix = caps[1].to_ascii_uppercase();
            let number = caps
                .get(2)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(0.0);
            (prefix, number)
        }
        None => (String::new(), 0.0),
    }
}
