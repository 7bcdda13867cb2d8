// Aggregate entry sameness score. Identifying fields (title, ISBN-like
// identifiers) carry most of the weight; incidental personal fields (loan
// status, notes) never count for or against a match.

use crate::collection::Collection;
use crate::compare::strings;
use crate::entry::Entry;
use crate::schema::field::PROP_IDENTIFIER;
use crate::schema::{format, Field, FieldType};
use std::cmp::Ordering;

/// Score at or above which two entries are certainly the same item.
pub const ENTRY_PERFECT_MATCH: i32 = 20;

/// Score at or above which two entries are probably the same item.
pub const ENTRY_GOOD_MATCH: i32 = 10;

// an identifying match must survive a couple of minor disagreements and
// still reach ENTRY_GOOD_MATCH, without reaching perfect on its own
const WEIGHT_TITLE: i32 = 14;
const WEIGHT_IDENTIFIER: i32 = 14;
const WEIGHT_MINOR: i32 = 2;
const MISMATCH_PENALTY: i32 = 2;

/// Field names treated as strong identifiers even without the
/// identifier property.
const IDENTIFIER_NAMES: [&str; 6] = ["isbn", "lccn", "issn", "upc", "ean", "barcode"];

fn is_identifier(field: &Field) -> bool {
    field.property(PROP_IDENTIFIER) == Some("true")
        || IDENTIFIER_NAMES.contains(&field.name.as_str())
}

/// Incidental fields describe the owner's relationship to the item, not
/// the item itself, so they are excluded from matching entirely.
fn is_incidental(field: &Field) -> bool {
    field.name == "loaned" || field.field_type == FieldType::Para || field.category == "Personal"
}

fn identifiers_equal(a: &str, b: &str) -> bool {
    let norm = |s: &str| {
        s.chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase()
    };
    norm(a) == norm(b)
}

/// Compute the sameness score of two entries over the collection's schema.
///
/// Properties the weights guarantee:
/// * value-identical entries score at least [`ENTRY_PERFECT_MATCH`];
/// * entries differing only in incidental fields still score perfect;
/// * a title or identifier match with other disagreements lands between
///   [`ENTRY_GOOD_MATCH`] and [`ENTRY_PERFECT_MATCH`];
/// * unrelated entries stay below [`ENTRY_GOOD_MATCH`].
pub fn score_entries(coll: &Collection, a: &Entry, b: &Entry) -> i32 {
    let articles = format::default_articles();
    let mut score = 0;
    let mut matched = false;
    let mut disagreed = false;

    for field in coll.fields() {
        if field.is_reserved() || is_incidental(field) {
            continue;
        }
        let va = a.value(&field.name);
        let vb = b.value(&field.name);
        if va.is_empty() || vb.is_empty() {
            // a value only one side knows is neither evidence for nor
            // against a match
            continue;
        }

        let (weight, equal) = if field.name == "title" {
            (WEIGHT_TITLE, strings::compare_titles(va, vb, &articles) == Ordering::Equal)
        } else if is_identifier(field) {
            (WEIGHT_IDENTIFIER, identifiers_equal(va, vb))
        } else {
            (WEIGHT_MINOR, va == vb)
        };

        if equal {
            score += weight;
            matched = true;
        } else {
            score -= MISMATCH_PENALTY;
            disagreed = true;
        }
    }

    // entries that agree on every shared significant field are the same
    // item regardless of how sparse the schema is
    if matched && !disagreed {
        score = score.max(ENTRY_PERFECT_MATCH);
    }
    score
}
