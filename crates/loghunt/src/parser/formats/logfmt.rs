use std::collections::HashMap;

use crate::parser::model::{category, EventStatus, EventType, ValidationEvent};
use crate::parser::safe::MAX_REGEX_LINE_LENGTH;
use crate::parser::traits::{parse_lines, Parser, ParserMeta};

use super::json::timestamp_from_epoch;
use super::level_status;

const DETECTION_LINES: usize = 5;

const LEVEL_KEYS: &[&str] = &["level", "lvl", "severity", "loglevel"];
const MESSAGE_KEYS: &[&str] = &["msg", "message", "text"];
const TIME_KEYS: &[&str] = &["ts", "time", "timestamp", "t"];
const ERROR_KEYS: &[&str] = &["err", "error", "exception"];
const SOURCE_KEYS: &[&str] = &["caller", "source", "file", "src"];
const LOGGER_KEYS: &[&str] = &["component", "logger", "service", "name", "module"];

/// `key=value` structured logs (logrus, go-kit, heroku router) and the
/// default `tracing-subscriber` fmt layout.
pub struct LogfmtParser {
    meta: ParserMeta,
}

impl LogfmtParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "logfmt",
            "logfmt",
            category::STRUCTURED_LOG,
            "key=value structured log lines",
            55,
        )
        .groups(&["logs"]);
        Self { meta }
    }
}

impl Default for LogfmtParser {
    fn default() -> Self {
        Self::new()
    }
}

/// `2026-01-30T03:18:50.827498Z  INFO cluster: Starting`
fn is_tracing_format(text: &str) -> bool {
    let mut parts = text.split_whitespace();

    let Some(ts) = parts.next() else {
        return false;
    };
    if !ts.contains('T') && !ts.contains('-') && !ts.contains(':') {
        return false;
    }

    let Some(level) = parts.next() else {
        return false;
    };
    if !matches!(level.to_uppercase().as_str(), "TRACE" | "DEBUG" | "INFO" | "WARN" | "ERROR" | "FATAL") {
        return false;
    }

    parts.next().is_some_and(|target| target.ends_with(':'))
}

/// Iterate `key=value` pairs; bare tokens without `=` are skipped.
fn parse_logfmt_iter(text: &str) -> impl Iterator<Item = (String, String)> + '_ {
    let mut chars = text.chars().peekable();

    std::iter::from_fn(move || loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        chars.peek()?;

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }

        if chars.peek() != Some(&'=') || key.is_empty() {
            // bare token or a stray `=`
            while chars.peek().is_some_and(|c| !c.is_whitespace()) {
                chars.next();
            }
            continue;
        }
        chars.next();

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut escaped = false;
            for c in chars.by_ref() {
                if escaped {
                    value.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    break;
                } else {
                    value.push(c);
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }

        return Some((key, value));
    })
}

/// Normalize to RFC 3339 when possible, otherwise keep the raw text.
fn normalize_timestamp(s: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc).to_rfc3339())
        .ok()
        .or_else(|| s.parse::<i64>().ok().and_then(timestamp_from_epoch).map(|dt| dt.to_rfc3339()))
        .unwrap_or_else(|| s.to_string())
}

fn first_value<'a>(fields: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| fields.get(*key).filter(|v| !v.is_empty()))
        .map(String::as_str)
}

fn fields_event(fields: &HashMap<String, String>, line: &str, line_number: i32, event_id: i64) -> ValidationEvent {
    let level = first_value(fields, LEVEL_KEYS).map(str::to_ascii_lowercase).unwrap_or_default();
    let (status, severity) = level_status(&level);

    let mut event = ValidationEvent::at_line(event_id, line, line_number).with_status(status, severity);
    event.tool_name = "logfmt".to_string();
    event.event_type = EventType::DebugInfo;
    event.message = first_value(fields, MESSAGE_KEYS).unwrap_or_default().to_string();
    event.function_name = first_value(fields, TIME_KEYS).map(normalize_timestamp).unwrap_or_default();

    if let Some(error) = first_value(fields, ERROR_KEYS) {
        if event.message.is_empty() {
            event.message = error.to_string();
        } else {
            event.suggestion = error.to_string();
        }
        event = event.with_status(EventStatus::Error, "error");
    }

    event.ref_file = first_value(fields, SOURCE_KEYS).unwrap_or_default().to_string();
    event.category = first_value(fields, LOGGER_KEYS).unwrap_or("log_entry").to_string();
    event
}

fn tracing_event(text: &str, line_number: i32, event_id: i64) -> ValidationEvent {
    let mut parts = text.split_whitespace();
    let ts = parts.next().unwrap_or_default();
    let level = parts.next().unwrap_or_default().to_ascii_lowercase();
    let target = parts.next().unwrap_or_default().trim_end_matches(':');
    let message = parts.collect::<Vec<_>>().join(" ");

    let (status, severity) = level_status(&level);
    let mut event = ValidationEvent::at_line(event_id, text, line_number).with_status(status, severity);
    event.tool_name = "logfmt".to_string();
    event.event_type = EventType::DebugInfo;
    event.function_name = normalize_timestamp(ts);
    event.category = target.to_string();
    event.message = message;
    event
}

fn is_logfmt_line(line: &str) -> bool {
    is_tracing_format(line) || parse_logfmt_iter(line).take(2).count() >= 2
}

impl Parser for LogfmtParser {
    fn can_parse(&self, content: &str) -> bool {
        let mut checked = 0;
        let mut matching = 0;

        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()).take(DETECTION_LINES) {
            if line.starts_with('{') || line.starts_with('[') {
                return false;
            }
            checked += 1;
            if is_logfmt_line(line) {
                matching += 1;
            }
        }

        matching > 0 && matching >= checked / 2
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
        let text = line.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let event = if is_tracing_format(text) {
            tracing_event(text, line_number, *event_id)
        } else {
            let fields: HashMap<String, String> = parse_logfmt_iter(text).collect();
            if fields.is_empty() {
                return Vec::new();
            }
            fields_event(&fields, text, line_number, *event_id)
        };

        *event_id += 1;
        vec![event]
    }
}
