//! Identity keys for records.
//!
//! Most kinds carry a server id. Convocations arrive as free text ("VIII созыв (архив)", "8",
//! "2019") and are identified by a normalized key instead.

use crate::entities::{EntityKind, Identity};
use crate::util::collapse_whitespace;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^()]*\)").expect("parenthetical regex is valid"));
static ARCHIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bархив[а-яё]*").expect("archive regex is valid"));
static CONVOCATION_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)созыв[а-яё]*").expect("convocation regex is valid"));
static ROMAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b[IVX]{1,8}\b").expect("roman regex is valid"));
static SHORT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]{1,2}\b").expect("number regex is valid"));

/// Fields consulted, in order, when a convocation record has no usable id.
const CONVOCATION_KEY_FIELDS: [&str; 4] = ["number", "name", "title", "id"];

/// Normalize a convocation label to its identity key.
///
/// `"VIII созыв (архив)"`, `"8"` and `"viii"` all map to `"VIII"`. Input without a numeral
/// degrades to the cleaned text. The result is a fixed point: normalizing it again returns it
/// unchanged.
pub fn normalize_convocation_key(raw: &str) -> String {
    let cleaned = clean_label(raw);

    if let Some(m) = ROMAN.find(&cleaned) {
        return m.as_str().to_ascii_uppercase();
    }

    if let Some(m) = SHORT_NUMBER.find(&cleaned) {
        let digits = m.as_str();
        return match digits.parse::<u32>() {
            Ok(n) => to_roman(n).unwrap_or_else(|| digits.to_string()),
            Err(_) => digits.to_string(),
        };
    }

    cleaned
}

fn clean_label(raw: &str) -> String {
    let mut current = raw.replace(['\u{00A0}', '\u{202F}', '\u{2007}'], " ");
    loop {
        let mut next = collapse_whitespace(&current);
        next = PARENTHETICAL.replace_all(&next, " ").into_owned();
        next = ARCHIVE.replace_all(&next, " ").into_owned();
        next = CONVOCATION_WORD.replace_all(&next, " ").into_owned();
        next = collapse_whitespace(&next);
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Roman numerals for 1..=39, the range `[IVX]{1,8}` can spell.
fn to_roman(mut n: u32) -> Option<String> {
    if n == 0 || n > 39 {
        return None;
    }
    let mut out = String::new();
    for (value, glyph) in [(10, "X"), (9, "IX"), (5, "V"), (4, "IV"), (1, "I")] {
        while n >= value {
            out.push_str(glyph);
            n -= value;
        }
    }
    Some(out)
}

/// Normalize a key handed in directly (from a route param, an admin form, ...).
pub fn normalize_key(kind: EntityKind, raw: &str) -> Option<String> {
    let key = match kind.identity() {
        Identity::ById => raw.trim().to_string(),
        Identity::ByKey => normalize_convocation_key(raw),
    };
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Trimmed `id` of a record; numeric ids are stringified.
pub fn record_id(record: &Value) -> Option<String> {
    scalar_text(record.get("id")?).filter(|s| !s.is_empty())
}

/// Identity key of a record under its kind's addressing mode.
///
/// Returns `None` for records that carry nothing usable; callers drop those.
pub fn entity_key(kind: EntityKind, record: &Value) -> Option<String> {
    match kind.identity() {
        Identity::ById => record_id(record),
        Identity::ByKey => {
            let label = match record {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Object(_) => CONVOCATION_KEY_FIELDS
                    .iter()
                    .filter_map(|f| record.get(*f).and_then(scalar_text))
                    .find(|s| !s.is_empty()),
                _ => None,
            }?;
            normalize_key(kind, &label)
        }
    }
}

fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
