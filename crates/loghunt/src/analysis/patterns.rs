use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use regex::Regex;

use crate::parser::model::{EventType, ValidationEvent};

/// Keywords that earn a similarity bonus when both messages contain them
const SHARED_KEYWORDS: [&str; 7] = ["error", "warning", "failed", "exception", "timeout", "permission", "not found"];
const KEYWORD_BONUS: f64 = 0.1;

/// Replacement passes, most specific first.
static NORMALIZERS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        // paths
        (r"[/\\][\w/\\.-]+\.(cpp|hpp|py|js|java|go|rs|rb|php|c|h)[:\s]", " <file> "),
        (r"/[\w/.-]+/", "/<path>/"),
        (r"\\[\w\\.-]+\\", r"\<path>\"),
        // timestamps
        (r"\d{4}-\d{2}-\d{2}[T\s]\d{2}:\d{2}:\d{2}", "<timestamp>"),
        (r"\d{2}:\d{2}:\d{2}", "<time>"),
        // locations
        (r":\d+:\d+:", ":<line>:<col>:"),
        (r"line\s+\d+", "line <num>"),
        (r"column\s+\d+", "column <num>"),
        // ids and addresses
        (r"0x[0-9a-f]+", "<addr>"),
        (r"\b\d{6,}\b", "<id>"),
        // quoted identifiers
        (r"'[\w.-]+'", "'<var>'"),
        (r#""[\w.-]+""#, "\"<var>\""),
        // numbers
        (r"\b\d+\.\d+\b", "<decimal>"),
        (r"\b\d+\b", "<num>"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

fn needs_normalization(message: &str) -> bool {
    message
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':' | '\'' | '"' | '\t' | '\n') || c.is_ascii_digit())
}

/// Lowercase `message` and replace variable content (paths, times,
/// locations, ids, quoted names, numbers) with placeholders.
pub fn normalize_error_message(message: &str) -> String {
    let mut normalized = message.to_lowercase();
    if !needs_normalization(&normalized) {
        return normalized.trim().to_string();
    }

    for (re, replacement) in NORMALIZERS.iter() {
        if re.is_match(&normalized) {
            normalized = re.replace_all(&normalized, *replacement).into_owned();
        }
    }

    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `<tool>_<category>_<hex hash>`; events that differ only in variable
/// content share a fingerprint.
pub fn fingerprint(event: &ValidationEvent) -> String {
    let normalized = normalize_error_message(&event.message);

    let mut hasher = DefaultHasher::new();
    format!("{}:{}:{}", event.tool_name, event.category, normalized).hash(&mut hasher);

    format!("{}_{}_{:x}", event.tool_name, event.category, hasher.finish())
}

/// Similarity in `[0, 1]`: positional character agreement of the
/// normalized forms plus a bonus per shared keyword.
pub fn message_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_error_message(a);
    let b = normalize_error_message(b);

    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ if a == b => return 1.0,
        _ => {}
    }

    let max_len = a.chars().count().max(b.chars().count());
    let common = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
    let keywords = SHARED_KEYWORDS.iter().filter(|k| a.contains(*k) && b.contains(*k)).count();

    (common as f64 / max_len as f64 + keywords as f64 * KEYWORD_BONUS).min(1.0)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Coarse cause bucket: network, permission, configuration, resource,
/// syntax, build, test_logic or unknown. First match wins.
pub fn root_cause_category(event: &ValidationEvent) -> &'static str {
    let message = event.message.to_lowercase();

    if contains_any(&message, &["connection", "timeout", "unreachable", "network", "dns"]) {
        "network"
    } else if contains_any(&message, &["permission", "access denied", "unauthorized", "forbidden", "authentication"]) {
        "permission"
    } else if contains_any(&message, &["config", "invalid resource", "not found", "does not exist", "missing"]) {
        "configuration"
    } else if contains_any(&message, &["memory", "disk", "space", "quota", "limit"]) {
        "resource"
    } else if contains_any(&message, &["syntax", "parse", "invalid", "format"])
        || matches!(event.event_type, EventType::LintIssue | EventType::TypeError)
    {
        "syntax"
    } else if contains_any(&message, &["build", "compile", "dependency", "package"])
        || event.event_type == EventType::BuildError
    {
        "build"
    } else if event.event_type == EventType::TestResult {
        "test_logic"
    } else {
        "unknown"
    }
}

/// Assign `fingerprint`, `pattern_id` (1-based, first-seen order) and
/// `similarity_score` against the first message of the same pattern.
pub fn annotate(events: &mut [ValidationEvent]) {
    let mut ids: HashMap<String, i64> = HashMap::new();
    let mut representatives: Vec<String> = Vec::new();

    for event in events.iter_mut() {
        event.fingerprint = fingerprint(event);
        event.pattern_id = match ids.get(&event.fingerprint) {
            Some(id) => *id,
            None => {
                representatives.push(event.message.clone());
                let id = representatives.len() as i64;
                ids.insert(event.fingerprint.clone(), id);
                id
            }
        };
    }

    for event in events.iter_mut() {
        let Some(representative) = representatives.get((event.pattern_id - 1) as usize) else {
            continue;
        };
        if !representative.is_empty() {
            event.similarity_score = message_similarity(&event.message, representative);
        }
    }
}
