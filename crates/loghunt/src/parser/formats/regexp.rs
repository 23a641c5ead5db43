//! Ad hoc parser built from a user pattern (`regexp:<pattern>`).
//!
//! Named groups map onto event fields; unnamed patterns still produce one
//! event per matching line with the whole match as message.

use regex::{Captures, Regex};

use crate::parser::model::{category, ConfigError, EventStatus, EventType, ValidationEvent};
use crate::parser::safe::{self, MAX_REGEX_LINE_LENGTH};
use crate::parser::traits::{ParseContext, Parser, ParserMeta};

const MESSAGE_KEYS: &[&str] = &["message", "msg", "description", "text"];
const SEVERITY_KEYS: &[&str] = &["severity", "level"];
const FILE_KEYS: &[&str] = &["file", "file_path", "path", "filename"];
const LINE_KEYS: &[&str] = &["line", "line_number", "lineno", "line_num"];
const COLUMN_KEYS: &[&str] = &["column", "col", "ref_column", "colno"];
const CODE_KEYS: &[&str] = &["code", "error_code", "rule", "rule_id"];
const CATEGORY_KEYS: &[&str] = &["category", "type", "class"];
const TEST_KEYS: &[&str] = &["test_name", "test", "name"];
const SUGGESTION_KEYS: &[&str] = &["suggestion", "fix", "hint"];
const TOOL_KEYS: &[&str] = &["tool", "tool_name"];

pub struct RegexpParser {
    meta: ParserMeta,
    regex: Regex,
    include_unparsed: bool,
}

impl RegexpParser {
    pub fn new(pattern: &str, include_unparsed: bool) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let meta = ParserMeta::new(
            "regexp",
            "Regular expression",
            category::TOOL_OUTPUT,
            "User-supplied pattern with named capture groups",
            0,
        );
        Ok(Self { meta, regex, include_unparsed })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    fn match_event(&self, caps: &Captures<'_>, line: &str, line_number: i32, event_id: i64) -> ValidationEvent {
        let (status, severity) = match group(caps, SEVERITY_KEYS) {
            Some(token) => classify_severity(token),
            None => (EventStatus::Warning, "warning".to_string()),
        };

        let mut event = ValidationEvent::at_line(event_id, line, line_number).with_status(status, &severity);
        event.tool_name = group(caps, TOOL_KEYS).unwrap_or("regexp").to_string();
        event.event_type = EventType::LintIssue;
        event.category = group(caps, CATEGORY_KEYS).unwrap_or("regexp_match").to_string();
        event.message = match group(caps, MESSAGE_KEYS) {
            Some(message) => message.to_string(),
            None => caps.get(0).map_or("", |m| m.as_str()).to_string(),
        };
        event.ref_file = group(caps, FILE_KEYS).unwrap_or_default().to_string();
        event.ref_line = group(caps, LINE_KEYS).and_then(safe::try_parse_i32).unwrap_or(line_number);
        event.ref_column = group(caps, COLUMN_KEYS).and_then(safe::try_parse_i32).unwrap_or(-1);
        event.error_code = group(caps, CODE_KEYS).unwrap_or_default().to_string();
        event.test_name = group(caps, TEST_KEYS).unwrap_or_default().to_string();
        event.suggestion = group(caps, SUGGESTION_KEYS).unwrap_or_default().to_string();
        event
    }

    fn unparsed_event(&self, line: &str, line_number: i32, event_id: i64) -> ValidationEvent {
        let mut event = ValidationEvent::at_line(event_id, line, line_number);
        event.status = None;
        event.severity = None;
        event.tool_name = "regexp".to_string();
        event.event_type = EventType::Unknown;
        event.category = "regexp_match".to_string();
        event.ref_line = line_number;
        event
    }

    fn scan(&self, content: &str, max_line_length: usize) -> Vec<ValidationEvent> {
        let mut events = Vec::new();
        let mut event_id = 1;

        for line in safe::SafeLineReader::with_max_length(content, max_line_length) {
            let event = match safe::safe_captures(&self.regex, &line.text) {
                Some(caps) => self.match_event(&caps, &line.text, line.number, event_id),
                None if self.include_unparsed => self.unparsed_event(&line.text, line.number, event_id),
                None => continue,
            };
            event_id += 1;
            events.push(event);
        }

        if events.is_empty() {
            let mut summary = ValidationEvent { event_id: 1, ..Default::default() }.with_status(EventStatus::Info, "info");
            summary.tool_name = "regexp".to_string();
            summary.event_type = EventType::LintIssue;
            summary.category = "regexp_summary".to_string();
            summary.message = "No matches found for the provided pattern".to_string();
            events.push(summary);
        }

        events
    }
}

fn group<'h>(caps: &Captures<'h>, keys: &[&str]) -> Option<&'h str> {
    keys.iter().find_map(|key| caps.name(key)).map(|m| m.as_str())
}

/// Unrecognized tokens keep their text as severity with WARNING status.
fn classify_severity(token: &str) -> (EventStatus, String) {
    match token.trim().to_ascii_lowercase().as_str() {
        "error" | "fatal" | "fail" | "failed" => (EventStatus::Error, "error".to_string()),
        "warning" | "warn" => (EventStatus::Warning, "warning".to_string()),
        "info" | "note" | "debug" => (EventStatus::Info, "info".to_string()),
        _ => (EventStatus::Warning, token.to_string()),
    }
}

impl Parser for RegexpParser {
    /// Only reachable through an explicit `regexp:` format.
    fn can_parse(&self, _content: &str) -> bool {
        false
    }

    fn parse(&self, content: &str) -> Vec<ValidationEvent> {
        self.scan(content, MAX_REGEX_LINE_LENGTH)
    }

    fn parse_with_context(&self, ctx: &ParseContext<'_>, content: &str) -> Vec<ValidationEvent> {
        self.scan(content, ctx.max_line_length)
    }

    fn meta(&self) -> &ParserMeta {
        &self.meta
    }
}
