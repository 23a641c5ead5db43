//! Parsers defined at runtime by a JSON document.
//!
//! ```json
//! {
//!   "name": "my_tool",
//!   "detection": { "contains": ["MYTOOL"] },
//!   "patterns": [
//!     { "regex": "^(?P<severity>ERROR|WARN): (?P<message>.+)$", "event_type": "BUILD_ERROR" }
//!   ]
//! }
//! ```

use std::collections::HashMap;

use regex::{Captures, Regex};
use serde::Deserialize;

use super::model::{category, ConfigError, EventStatus, EventType, ValidationEvent};
use super::safe::{self, MAX_REGEX_LINE_LENGTH};
use super::traits::{parse_lines, Parser, ParserMeta};

const DEFAULT_PRIORITY: i32 = 50;
const DEFAULT_GROUP: &str = "custom";

// Capture-group synonyms, tried in order
const MESSAGE_KEYS: &[&str] = &["message", "msg"];
const SEVERITY_KEYS: &[&str] = &["severity", "level"];
const STATUS_KEYS: &[&str] = &["status", "result"];
const FILE_KEYS: &[&str] = &["file", "file_path", "path"];
const LINE_KEYS: &[&str] = &["line", "lineno", "line_number"];
const COLUMN_KEYS: &[&str] = &["column", "col"];
const CODE_KEYS: &[&str] = &["error_code", "code", "rule"];
const FUNCTION_KEYS: &[&str] = &["function_name", "func", "function"];
const TEST_KEYS: &[&str] = &["test_name", "test"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParserDefinition {
    name: Option<String>,
    display_name: Option<String>,
    tool_name: Option<String>,
    category: Option<String>,
    description: Option<String>,
    priority: Option<i32>,
    aliases: Vec<String>,
    groups: Vec<String>,
    detection: DetectionDefinition,
    patterns: Option<Vec<PatternDefinition>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetectionDefinition {
    contains: Vec<String>,
    contains_all: Vec<String>,
    regex: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PatternDefinition {
    regex: Option<String>,
    event_type: Option<String>,
    severity: Option<String>,
    severity_map: HashMap<String, String>,
    status_map: HashMap<String, String>,
}

/// Detection predicates. Groups are AND-ed; `contains` is OR within itself.
#[derive(Debug)]
struct Detection {
    contains: Vec<String>,
    contains_all: Vec<String>,
    regex: Option<Regex>,
}

impl Detection {
    fn is_empty(&self) -> bool {
        self.contains.is_empty() && self.contains_all.is_empty() && self.regex.is_none()
    }

    fn matches(&self, content: &str) -> bool {
        // no rules: reachable only through an explicit format name
        if self.is_empty() {
            return false;
        }
        if !self.contains.is_empty() && !self.contains.iter().any(|m| content.contains(m.as_str())) {
            return false;
        }
        if !self.contains_all.iter().all(|m| content.contains(m.as_str())) {
            return false;
        }
        self.regex.as_ref().map_or(true, |re| re.is_match(content))
    }
}

/// One compiled extraction rule.
#[derive(Debug)]
struct LinePattern {
    regex: Regex,
    event_type: EventType,
    fixed_severity: Option<String>,
    severity_map: HashMap<String, String>,
    status_map: HashMap<String, String>,
}

/// A [`Parser`] compiled from a JSON definition.
#[derive(Debug)]
pub struct ConfigBasedParser {
    meta: ParserMeta,
    tool_name: String,
    detection: Detection,
    patterns: Vec<LinePattern>,
}

impl ConfigBasedParser {
    /// Compile a JSON definition. Every failure names the offending field or pattern.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let def: ParserDefinition =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidJson(e.to_string()))?;

        let format_name = def.name.ok_or(ConfigError::MissingField("name"))?;
        if format_name.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        let pattern_defs = def.patterns.ok_or(ConfigError::MissingField("patterns"))?;
        if pattern_defs.is_empty() {
            return Err(ConfigError::EmptyPatterns(format_name));
        }

        let detection = Detection {
            contains: def.detection.contains,
            contains_all: def.detection.contains_all,
            regex: def.detection.regex.as_deref().map(compile).transpose()?,
        };

        let patterns = pattern_defs
            .into_iter()
            .enumerate()
            .map(|(index, p)| compile_pattern(index, p))
            .collect::<Result<Vec<_>, _>>()?;

        let display_name = def.display_name.unwrap_or_else(|| format_name.clone());
        let tool_name = def.tool_name.unwrap_or_else(|| format_name.clone());
        let category = def.category.unwrap_or_else(|| category::TOOL_OUTPUT.to_string());
        let description = def.description.unwrap_or_default();

        let mut groups = def.groups;
        if groups.is_empty() {
            groups.push(DEFAULT_GROUP.to_string());
        }

        let mut meta = ParserMeta::new(
            &format_name,
            &display_name,
            &category,
            &description,
            def.priority.unwrap_or(DEFAULT_PRIORITY),
        );
        meta.aliases = def.aliases;
        meta.groups = groups;

        Ok(Self { meta, tool_name, detection, patterns })
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    fn build_event(&self, pattern: &LinePattern, caps: &Captures<'_>, line: &str, line_number: i32, event_id: i64) -> ValidationEvent {
        let mut event = ValidationEvent::at_line(event_id, line, line_number);
        event.tool_name = self.tool_name.clone();
        event.event_type = pattern.event_type;
        event.category = self.meta.category.clone();

        event.message = group_value(caps, MESSAGE_KEYS)
            .unwrap_or_else(|| caps.get(0).map_or("", |m| m.as_str()))
            .to_string();

        let severity = group_value(caps, SEVERITY_KEYS);
        let status = group_value(caps, STATUS_KEYS);
        let (status, severity) = pattern.classify(severity, status);
        event.status = Some(status);
        event.severity = Some(severity);

        if let Some(file) = group_value(caps, FILE_KEYS) {
            event.ref_file = file.to_string();
        }
        event.ref_line = group_value(caps, LINE_KEYS).map_or(line_number, |v| safe::safe_i32(v, line_number));
        event.ref_column = group_value(caps, COLUMN_KEYS).map_or(-1, |v| safe::safe_i32(v, -1));

        let copy = |keys: &[&str], target: &mut String| {
            if let Some(v) = group_value(caps, keys) {
                *target = v.to_string();
            }
        };
        copy(CODE_KEYS, &mut event.error_code);
        copy(FUNCTION_KEYS, &mut event.function_name);
        copy(TEST_KEYS, &mut event.test_name);
        copy(&["scope"], &mut event.scope);
        copy(&["group"], &mut event.group);
        copy(&["unit"], &mut event.unit);

        event
    }
}

impl LinePattern {
    /// Resolve `(status, severity)`: status map, then severity map, then the
    /// fixed severity, then the captured token, then the event-type default.
    fn classify(&self, severity: Option<&str>, status: Option<&str>) -> (EventStatus, String) {
        let fallback = (EventStatus::Info, "info".to_string());

        if let (Some(token), false) = (status, self.status_map.is_empty()) {
            return match self.status_map.get(token).map(String::as_str) {
                Some("PASS") => (EventStatus::Pass, "info".to_string()),
                Some("FAIL") => (EventStatus::Fail, "error".to_string()),
                Some("SKIP") => (EventStatus::Skip, "info".to_string()),
                _ => fallback,
            };
        }

        if let (Some(token), false) = (severity, self.severity_map.is_empty()) {
            return match self.severity_map.get(token) {
                Some(mapped) => (status_for_severity(mapped), mapped.clone()),
                None => fallback,
            };
        }

        if let Some(fixed) = &self.fixed_severity {
            return (status_for_severity(fixed), fixed.clone());
        }

        if let Some(token) = severity {
            return classify_token(token);
        }

        match self.event_type {
            EventType::BuildError => (EventStatus::Error, "error".to_string()),
            EventType::TestResult => status.map_or(fallback.clone(), |token| classify_test_status(token).unwrap_or(fallback)),
            _ => fallback,
        }
    }
}

fn status_for_severity(severity: &str) -> EventStatus {
    match severity {
        "error" | "critical" => EventStatus::Error,
        "warning" => EventStatus::Warning,
        _ => EventStatus::Info,
    }
}

/// Lexical heuristics for a captured severity token.
fn classify_token(token: &str) -> (EventStatus, String) {
    let upper = token.to_ascii_uppercase();
    let lower = token.to_ascii_lowercase();
    match upper.as_str() {
        "PASS" | "PASSED" | "OK" => (EventStatus::Pass, "info".to_string()),
        "FAIL" | "FAILED" => (EventStatus::Fail, "error".to_string()),
        "SKIP" | "SKIPPED" => (EventStatus::Skip, "info".to_string()),
        "ERROR" | "FATAL" => (EventStatus::Error, "error".to_string()),
        "WARNING" | "WARN" => (EventStatus::Warning, "warning".to_string()),
        "CRITICAL" => (EventStatus::Error, "critical".to_string()),
        _ => (EventStatus::Info, lower),
    }
}

fn classify_test_status(token: &str) -> Option<(EventStatus, String)> {
    match token.to_ascii_uppercase().as_str() {
        "PASS" | "PASSED" | "OK" => Some((EventStatus::Pass, "info".to_string())),
        "FAIL" | "FAILED" | "ERROR" => Some((EventStatus::Fail, "error".to_string())),
        "SKIP" | "SKIPPED" => Some((EventStatus::Skip, "info".to_string())),
        _ => None,
    }
}

/// First non-empty named group among `keys`.
fn group_value<'h>(caps: &Captures<'h>, keys: &[&str]) -> Option<&'h str> {
    keys.iter()
        .filter_map(|key| caps.name(key))
        .map(|m| m.as_str())
        .find(|v| !v.is_empty())
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn compile_pattern(index: usize, def: PatternDefinition) -> Result<LinePattern, ConfigError> {
    let source = def.regex.ok_or(ConfigError::MissingField("regex"))?;
    let regex = compile(&source)?;

    let event_type = match def.event_type {
        Some(token) => EventType::from_token(&token).ok_or(ConfigError::InvalidEventType { index, value: token })?,
        None => EventType::Unknown,
    };

    if safe::has_potential_backtracking(&source) {
        tracing::debug!(pattern = %source, "config pattern has backtracking-prone shape");
    }

    Ok(LinePattern {
        regex,
        event_type,
        fixed_severity: def.severity.filter(|s| !s.is_empty()),
        severity_map: def.severity_map,
        status_map: def.status_map,
    })
}

impl Parser for ConfigBasedParser {
    fn can_parse(&self, content: &str) -> bool {
        self.detection.matches(content)
    }

    fn parse(&self, content: &str) -> Vec<ValidationEvent> {
        parse_lines(self, content, MAX_REGEX_LINE_LENGTH)
    }

    fn meta(&self) -> &ParserMeta {
        &self.meta
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn supports_file_parsing(&self) -> bool {
        true
    }

    fn parse_line(&self, line: &str, line_number: i32, event_id: &mut i64) -> Vec<ValidationEvent> {
        for pattern in &self.patterns {
            if let Some(caps) = pattern.regex.captures(line) {
                let event = self.build_event(pattern, &caps, line, line_number, *event_id);
                *event_id += 1;
                return vec![event];
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(json: &str) -> ConfigBasedParser {
        ConfigBasedParser::from_json(json).expect("config should compile")
    }

    // ── Construction ─────────────────────────────────────────────

    #[test]
    fn test_round_trip_single_event() {
        let parser = compile_ok(
            r#"{"name": "foo", "detection": {"contains": ["FOO"]},
                "patterns": [{"regex": "FOO: (?P<message>.+)", "event_type": "UNKNOWN"}]}"#,
        );
        assert!(parser.can_parse("FOO: disk full"));

        let events = parser.parse("FOO: disk full");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "disk full");
        assert_eq!(events[0].event_id, 1);
        assert_eq!(events[0].ref_line, 1);
    }

    #[test]
    fn test_event_type_optional() {
        let parser = compile_ok(
            r#"{"name":"foo","detection":{"contains":["FOO"]},"patterns":[{"regex":"FOO: (?P<message>.+)"}]}"#,
        );
        let events = parser.parse("FOO: disk full");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "disk full");
        assert_eq!(events[0].event_type, EventType::Unknown);
        assert_eq!(events[0].status, Some(EventStatus::Info));
    }

    #[test]
    fn test_defaults_applied() {
        let parser = compile_ok(r#"{"name": "x", "patterns": [{"regex": "x", "event_type": "LINT_ISSUE"}]}"#);
        assert_eq!(parser.name(), "x");
        assert_eq!(parser.tool_name(), "x");
        assert_eq!(parser.category(), "tool_output");
        assert_eq!(parser.priority(), 50);
        assert_eq!(parser.groups(), &["custom".to_string()]);
        assert!(parser.supports_streaming());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(ConfigBasedParser::from_json("{not json"), Err(ConfigError::InvalidJson(_))));
        assert!(matches!(ConfigBasedParser::from_json("42"), Err(ConfigError::InvalidJson(_))));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            ConfigBasedParser::from_json(r#"{"patterns": []}"#).unwrap_err(),
            ConfigError::MissingField("name")
        );
        assert_eq!(ConfigBasedParser::from_json(r#"{"name": "a"}"#).unwrap_err(), ConfigError::MissingField("patterns"));
        assert_eq!(
            ConfigBasedParser::from_json(r#"{"name": "a", "patterns": [{"event_type": "UNKNOWN"}]}"#).unwrap_err(),
            ConfigError::MissingField("regex")
        );
    }

    #[test]
    fn test_empty_patterns() {
        let err = ConfigBasedParser::from_json(r#"{"name": "a", "patterns": []}"#).unwrap_err();
        assert_eq!(err, ConfigError::EmptyPatterns("a".to_string()));
    }

    #[test]
    fn test_invalid_event_type() {
        let err = ConfigBasedParser::from_json(
            r#"{"name": "a", "patterns": [{"regex": "x", "event_type": "BUILD_ERROR"}, {"regex": "y", "event_type": "NOPE"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidEventType { index: 1, value: "NOPE".to_string() });
    }

    #[test]
    fn test_invalid_regex_names_pattern() {
        let err = ConfigBasedParser::from_json(r#"{"name": "a", "patterns": [{"regex": "(unclosed", "event_type": "UNKNOWN"}]}"#)
            .unwrap_err();
        match err {
            ConfigError::InvalidRegex { pattern, reason } => {
                assert_eq!(pattern, "(unclosed");
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = ConfigBasedParser::from_json(
            r#"{"name": "a", "detection": {"regex": "[bad"}, "patterns": [{"regex": "x", "event_type": "UNKNOWN"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("[bad"));
    }

    // ── Detection ────────────────────────────────────────────────

    #[test]
    fn test_no_detection_never_auto_matches() {
        let parser = compile_ok(r#"{"name": "a", "patterns": [{"regex": ".*", "event_type": "UNKNOWN"}]}"#);
        assert!(!parser.can_parse("anything at all"));
        assert_eq!(parser.parse("anything").len(), 1);
    }

    #[test]
    fn test_detection_groups_are_anded() {
        let parser = compile_ok(
            r#"{"name": "a",
                "detection": {"contains": ["A", "B"], "contains_all": ["X", "Y"], "regex": "^start"},
                "patterns": [{"regex": "x", "event_type": "UNKNOWN"}]}"#,
        );
        assert!(parser.can_parse("start B X Y"));
        assert!(!parser.can_parse("start X Y"));
        assert!(!parser.can_parse("start A X"));
        assert!(!parser.can_parse("A X Y start"));
    }

    // ── Extraction ───────────────────────────────────────────────

    #[test]
    fn test_first_matching_pattern_wins() {
        let parser = compile_ok(
            r#"{"name": "a", "patterns": [
                {"regex": "^E (?P<message>.+)", "event_type": "BUILD_ERROR"},
                {"regex": "(?P<message>.+)", "event_type": "DEBUG_INFO"}
            ]}"#,
        );
        let events = parser.parse("E boom\nplain line\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::BuildError);
        assert_eq!(events[0].status, Some(EventStatus::Error));
        assert_eq!(events[1].event_type, EventType::DebugInfo);
        assert_eq!(events[1].message, "plain line");
        assert_eq!(events[1].event_id, 2);
        assert_eq!(events[1].log_line_start, 2);
    }

    #[test]
    fn test_field_synonyms() {
        let parser = compile_ok(
            r#"{"name": "a", "patterns": [{
                "regex": "^(?P<path>[^:]+):(?P<lineno>\\d+):(?P<col>\\d+) \\[(?P<rule>[A-Z0-9]+)\\] (?P<msg>.+)$",
                "event_type": "LINT_ISSUE"}]}"#,
        );
        let events = parser.parse("src/app.py:12:4 [E501] line too long");
        let e = &events[0];
        assert_eq!(e.ref_file, "src/app.py");
        assert_eq!(e.ref_line, 12);
        assert_eq!(e.ref_column, 4);
        assert_eq!(e.error_code, "E501");
        assert_eq!(e.message, "line too long");
    }

    #[test]
    fn test_message_defaults_to_whole_match() {
        let parser = compile_ok(r#"{"name": "a", "patterns": [{"regex": "WARN \\w+", "event_type": "UNKNOWN"}]}"#);
        assert_eq!(parser.parse("prefix WARN disk trailing")[0].message, "WARN disk");
    }

    #[test]
    fn test_bad_numeric_capture_falls_back() {
        let parser = compile_ok(
            r#"{"name": "a", "patterns": [{"regex": "at (?P<line>\\S+):(?P<column>\\S+)", "event_type": "UNKNOWN"}]}"#,
        );
        let events = parser.parse("ok\nat abc:99999999999");
        assert_eq!(events[0].ref_line, 2);
        assert_eq!(events[0].ref_column, -1);
    }

    #[test]
    fn test_severity_precedence() {
        let parser = compile_ok(
            r#"{"name": "a", "patterns": [
                {"regex": "^M (?P<level>\\w+)", "event_type": "UNKNOWN", "severity_map": {"E": "error", "W": "warning"}},
                {"regex": "^F (?P<level>\\w+)", "event_type": "UNKNOWN", "severity": "warning"},
                {"regex": "^C (?P<severity>\\w+)", "event_type": "UNKNOWN"},
                {"regex": "^T (?P<status>\\w+)", "event_type": "TEST_RESULT", "status_map": {"ok": "PASS", "ko": "FAIL"}}
            ]}"#,
        );
        let events = parser.parse("M E\nM W\nM Z\nF error\nC fatal\nC note\nT ko\nT ok");
        let got: Vec<(Option<EventStatus>, &str)> = events.iter().map(|e| (e.status, e.severity_str())).collect();
        assert_eq!(
            got,
            vec![
                (Some(EventStatus::Error), "error"),
                (Some(EventStatus::Warning), "warning"),
                (Some(EventStatus::Info), "info"),
                (Some(EventStatus::Warning), "warning"),
                (Some(EventStatus::Error), "error"),
                (Some(EventStatus::Info), "note"),
                (Some(EventStatus::Fail), "error"),
                (Some(EventStatus::Pass), "info"),
            ]
        );
    }

    #[test]
    fn test_captured_test_tokens() {
        let parser = compile_ok(
            r#"{"name": "a", "patterns": [
                {"regex": "^(?P<test>\\S+) (?P<result>\\w+)$", "event_type": "TEST_RESULT"},
                {"regex": "^sev (?P<severity>\\w+)$", "event_type": "TEST_RESULT"}
            ]}"#,
        );
        let events = parser.parse("t1 PASSED\nt2 error\nt3 SKIPPED\nsev FAILED");
        assert_eq!(events[0].status, Some(EventStatus::Pass));
        assert_eq!(events[0].test_name, "t1");
        assert_eq!(events[1].status, Some(EventStatus::Fail));
        assert_eq!(events[2].status, Some(EventStatus::Skip));
        assert_eq!(events[3].status, Some(EventStatus::Fail));
    }

    #[test]
    fn test_parse_line_advances_cursor() {
        let parser = compile_ok(r#"{"name": "a", "patterns": [{"regex": "^hit", "event_type": "UNKNOWN"}]}"#);
        let mut cursor = 10;
        assert!(parser.parse_line("miss", 1, &mut cursor).is_empty());
        assert_eq!(cursor, 10);
        let events = parser.parse_line("hit", 2, &mut cursor);
        assert_eq!(events[0].event_id, 10);
        assert_eq!(cursor, 11);
    }
}
