//! Column name normalization
//!
//! Turns raw CSV header cells into lowercase PostgreSQL identifiers. The
//! transform is deterministic so the CREATE and INSERT paths of one load
//! always agree on the column list.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// PostgreSQL truncates identifiers beyond this length
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Joins the kept prefix and suffix of an over-long name
pub const SHORTEN_SEPARATOR: &str = "___";

pub const SQL_KEYWORDS: &[&str] = &[
    "select", "insert", "update", "delete", "from", "where", "join", "group", "order", "by",
    "having", "limit", "count", "distinct", "drop", "alter", "create", "table", "index",
    "database", "view", "primary", "foreign", "key", "null", "and", "or", "not", "as", "like",
    "in", "between", "exists", "union", "intersect", "except", "case", "when", "then", "else",
    "end", "default", "check", "unique", "cascade",
];

static NON_WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

static DIGIT_RUN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());

static WHITESPACE_RUN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const DIGIT_WORDS: [&str; 10] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

/// Normalize one raw header cell.
///
/// Output is lowercase, made of word characters and underscores, and never
/// equal to an entry of [`SQL_KEYWORDS`]. An input with no word characters
/// normalizes to an empty string; [`normalize_headers`] gives those a name.
pub fn normalize_column_name(raw: &str) -> String {
    let name = raw.replace('%', "percent").replace('/', " per ");
    let name = NON_WORD_PATTERN.replace_all(&name, "");
    let name = DIGIT_RUN_PATTERN.replace_all(&name, |caps: &regex::Captures| {
        spell_digits(&caps[0])
    });
    let name = name.replace('-', "_");
    let name = shorten(&name, MAX_IDENTIFIER_LEN);

    let name = name.trim().to_lowercase();
    let name = WHITESPACE_RUN_PATTERN.replace_all(&name, "_");
    // Lowercasing can grow a name (`İ` becomes two chars).
    let name = shorten(&name, MAX_IDENTIFIER_LEN);

    if SQL_KEYWORDS.contains(&name.as_str()) {
        format!("sql_{}", name)
    } else {
        name
    }
}

/// Normalize a whole header row (key column already dropped).
///
/// Empty results become `column_<position>` and repeated names get `_2`,
/// `_3`, ... suffixes in header order.
pub fn normalize_headers<S: AsRef<str>>(raw_headers: &[S]) -> Vec<String> {
    let mut used = HashSet::new();
    raw_headers
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let base = normalize_column_name(raw.as_ref());
            let base = if base.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                base
            };
            unique_name(base, &mut used)
        })
        .collect()
}

/// Spell each digit of a run as its English word, without separators
pub fn spell_digits(digits: &str) -> String {
    digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| DIGIT_WORDS[d as usize])
        .collect()
}

/// Keep a prefix and a suffix around [`SHORTEN_SEPARATOR`] so the result is exactly `max_len` chars
pub fn shorten(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        return name.to_string();
    }

    let keep = max_len.saturating_sub(SHORTEN_SEPARATOR.len());
    let prefix_len = keep / 2;
    let suffix_len = keep - prefix_len;

    let mut out: String = chars[..prefix_len].iter().collect();
    out.push_str(SHORTEN_SEPARATOR);
    out.extend(&chars[chars.len() - suffix_len..]);
    out
}

fn unique_name(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut idx = 2;
    loop {
        let suffix = format!("_{}", idx);
        let stem: String = base
            .chars()
            .take(MAX_IDENTIFIER_LEN.saturating_sub(suffix.len()))
            .collect();
        let candidate = format!("{}{}", stem, suffix);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        idx += 1;
    }
}
