use once_cell::sync::Lazy;
use regex::Regex;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<think>[\s\S]*?</think>|<think\s*/>").unwrap());

static REASONING_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<reasoning>[\s\S]*?</reasoning>").unwrap());

static MULTIPLE_NEWLINES_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static SQL_FENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```(?:sql|postgresql|postgres)?[ \t]*\n?(.*?)```").unwrap());

static SQL_LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)(?:^|\n)\s*(?:SQLQuery|SQL|Query)\s*:\s*(.+)").unwrap());

static BARE_SELECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*((?:SELECT|WITH)\b.*)$").unwrap());

/// Cleans LLM response by removing reasoning tags and extra blank lines
pub fn clean_llm_response(response: &str) -> String {
    let mut cleaned = response.to_string();

    // Remove <think>...</think> and <think/> tags
    cleaned = THINK_TAG_PATTERN.replace_all(&cleaned, "").to_string();

    // Remove <reasoning>...</reasoning> tags (some models use this)
    cleaned = REASONING_TAG_PATTERN.replace_all(&cleaned, "").to_string();

    cleaned = cleaned.trim().to_string();

    // Collapse multiple consecutive newlines into at most two
    cleaned = MULTIPLE_NEWLINES_PATTERN
        .replace_all(&cleaned, "\n\n")
        .to_string();

    cleaned
}

/// Pull the SQL statement out of a model reply.
///
/// Accepts a fenced code block, a `SQLQuery:`/`SQL:` label, or a reply that
/// is nothing but a SELECT/WITH statement. Trailing semicolons are dropped.
pub fn extract_sql(response: &str) -> Option<String> {
    let cleaned = clean_llm_response(response);

    let candidate = SQL_FENCE_PATTERN
        .captures(&cleaned)
        .or_else(|| SQL_LABEL_PATTERN.captures(&cleaned))
        .or_else(|| BARE_SELECT_PATTERN.captures(&cleaned))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_end_matches(';').trim().to_string())?;

    if candidate.is_empty() {
        None
    } else {
        Some(candidate)
    }
}
