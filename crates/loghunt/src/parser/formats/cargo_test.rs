use serde::Deserialize;

use crate::parser::model::{category, CommandPattern, ContentFamily, EventStatus, EventType, ValidationEvent};
use crate::parser::safe::{self, MAX_REGEX_LINE_LENGTH};
use crate::parser::traits::{ParseContext, Parser, ParserMeta};

/// Non-empty lines inspected by `can_parse`
const DETECTION_LINES: usize = 5;

/// One libtest JSON record (`cargo test -- -Z unstable-options --format json`).
#[derive(Debug, Deserialize)]
struct LibtestRecord {
    #[serde(rename = "type")]
    kind: String,
    event: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    exec_time: Option<f64>,
    #[serde(default)]
    stdout: Option<String>,
}

/// libtest JSON event stream.
pub struct CargoTestParser {
    meta: ParserMeta,
}

impl CargoTestParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "cargo_test_json",
            "cargo test JSON",
            category::TEST_FRAMEWORK,
            "Rust libtest JSON output (one event object per line)",
            75,
        )
        .groups(&["rust", "test"])
        .family(ContentFamily::Json)
        .commands(vec![CommandPattern::like("cargo test%"), CommandPattern::like("cargo nextest%")]);
        Self { meta }
    }

    fn test_event(&self, record: LibtestRecord, line: &str, line_number: i32, event_id: i64) -> Option<ValidationEvent> {
        let (status, severity, message) = match record.event.as_str() {
            "ok" => (EventStatus::Pass, "info", "Test passed".to_string()),
            "failed" => {
                let message = match record.stdout.as_deref().map(str::trim) {
                    Some(out) if !out.is_empty() => format!("Test failed: {}", out),
                    _ => "Test failed".to_string(),
                };
                (EventStatus::Fail, "error", message)
            }
            "ignored" => (EventStatus::Skip, "info", "Test ignored".to_string()),
            // `started` carries no outcome
            _ => return None,
        };

        let mut event = ValidationEvent::at_line(event_id, line, line_number).with_status(status, severity);
        event.tool_name = "cargo_test".to_string();
        event.event_type = EventType::TestResult;
        event.category = "test".to_string();
        event.test_name = record.name.clone();
        event.function_name = record.name;
        event.message = message;
        event.execution_time = record.exec_time.filter(|t| t.is_finite()).unwrap_or(0.0);
        event.structured_data = serde_json::json!({
            "tool": "cargo_test",
            "event": record.event,
        })
        .to_string();
        Some(event)
    }

    fn scan(&self, content: &str, max_line_length: usize) -> Vec<ValidationEvent> {
        let mut events = Vec::new();
        let mut event_id = 1;

        for line in safe::SafeLineReader::with_max_length(content, max_line_length) {
            let text = line.text.trim();
            if !text.starts_with('{') {
                continue;
            }
            let Ok(record) = serde_json::from_str::<LibtestRecord>(text) else {
                continue;
            };
            // suite records only carry counts
            if record.kind != "test" {
                continue;
            }
            if let Some(event) = self.test_event(record, text, line.number, event_id) {
                event_id += 1;
                events.push(event);
            }
        }

        events
    }
}

impl Default for CargoTestParser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_libtest_record(line: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
        return false;
    };
    matches!(value.get("type").and_then(|t| t.as_str()), Some("test" | "suite"))
        && value.get("event").is_some_and(|e| e.is_string())
}

impl Parser for CargoTestParser {
    fn can_parse(&self, content: &str) -> bool {
        if !content.contains(r#""type":"test""#) && !content.contains(r#""type": "test""#) {
            return false;
        }
        if !content.contains(r#""event":"#) {
            return false;
        }
        if !(content.contains("started") || content.contains("ok") || content.contains("failed")) {
            return false;
        }
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(DETECTION_LINES)
            .any(is_libtest_record)
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

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = r#"{ "type": "suite", "event": "started", "test_count": 3 }
{ "type": "test", "event": "started", "name": "tests::adds" }
{ "type": "test", "name": "tests::adds", "event": "ok", "exec_time": 0.001 }
{ "type": "test", "event": "started", "name": "tests::divides" }
{ "type": "test", "name": "tests::divides", "event": "failed", "stdout": "thread 'tests::divides' panicked at src/lib.rs:9:5:\nattempt to divide by zero\n" }
{ "type": "test", "event": "ignored", "name": "tests::slow" }
{ "type": "suite", "event": "failed", "passed": 1, "failed": 1, "ignored": 1 }"#;

    #[test]
    fn test_can_parse() {
        let parser = CargoTestParser::new();
        assert!(parser.can_parse(STREAM));
        assert!(parser.can_parse(r#"{"type":"test","event":"ok","name":"a"}"#));
        assert!(!parser.can_parse("test tests::adds ... ok"));
        assert!(!parser.can_parse(r#"{"type":"test","status":"ok"}"#));
    }

    #[test]
    fn test_results() {
        let events = CargoTestParser::new().parse(STREAM);
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].status, Some(EventStatus::Pass));
        assert_eq!(events[0].test_name, "tests::adds");
        assert!((events[0].execution_time - 0.001).abs() < 1e-9);
        assert_eq!(events[0].log_line_start, 3);

        assert_eq!(events[1].status, Some(EventStatus::Fail));
        assert!(events[1].message.starts_with("Test failed: thread 'tests::divides' panicked"));

        assert_eq!(events[2].status, Some(EventStatus::Skip));
        assert_eq!(events[2].event_id, 3);

        let data: serde_json::Value = serde_json::from_str(&events[2].structured_data).unwrap();
        assert_eq!(data["event"], "ignored");
    }

    #[test]
    fn test_result_without_started_line() {
        let events = CargoTestParser::new().parse(r#"{"type":"test","event":"failed","name":"x"}"#);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "Test failed");
    }
}
