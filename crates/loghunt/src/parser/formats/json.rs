use serde_json::{Map, Value};

use crate::parser::model::{category, ContentFamily, EventStatus, EventType, ValidationEvent};
use crate::parser::priority;
use crate::parser::traits::{parse_lines, Parser, ParserMeta};

use super::level_status;

/// Non-empty lines sampled by `can_parse`
const DETECTION_LINES: usize = 5;

/// JSON records are never truncated below this size (1MB)
const MAX_RECORD_SIZE: usize = 1_048_576;

const LEVEL_FIELDS: &[&str] = &["level", "severity", "lvl", "loglevel", "log_level", "@l"];
const MESSAGE_FIELDS: &[&str] = &["message", "msg", "text", "content", "@m", "@mt", "short_message"];
const TIME_FIELDS: &[&str] = &["timestamp", "ts", "time", "@timestamp", "@t", "datetime"];
const ERROR_FIELDS: &[&str] = &["error", "err", "exception", "stack", "stacktrace"];
const FILE_FIELDS: &[&str] = &["file", "file_path", "filepath", "filename", "source", "caller"];
const LINE_FIELDS: &[&str] = &["line", "line_number", "lineno", "lineNumber"];
const LOGGER_FIELDS: &[&str] = &["logger", "name", "category", "component", "service", "module"];

/// Newline-delimited JSON logs (zap, bunyan, pino, serilog compact, ...).
pub struct JsonLinesParser {
    meta: ParserMeta,
}

impl JsonLinesParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "jsonl",
            "JSON Lines",
            category::STRUCTURED_LOG,
            "One JSON log object per line",
            priority::MEDIUM,
        )
        .aliases(&["ndjson"])
        .groups(&["logs"])
        .family(ContentFamily::Json)
        .extension(".jsonl");
        Self { meta }
    }
}

impl Default for JsonLinesParser {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_string_field(obj: &Map<String, Value>, field_names: &[&str]) -> Option<String> {
    field_names.iter().find_map(|field| match obj.get(*field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn extract_int_field(obj: &Map<String, Value>, field_names: &[&str]) -> Option<i32> {
    field_names.iter().find_map(|field| match obj.get(*field)? {
        Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Seconds vs milliseconds is decided by magnitude.
pub(crate) fn timestamp_from_epoch(ts: i64) -> Option<chrono::DateTime<chrono::Utc>> {
    if ts > 1_000_000_000_000 {
        chrono::DateTime::from_timestamp_millis(ts)
    } else {
        chrono::DateTime::from_timestamp(ts, 0)
    }
}

/// RFC 3339 output when the value is a recognizable timestamp, raw text otherwise.
fn extract_timestamp(obj: &Map<String, Value>) -> Option<String> {
    TIME_FIELDS.iter().find_map(|field| {
        let normalized = match obj.get(*field)? {
            Value::Number(n) => n.as_i64().and_then(timestamp_from_epoch).map(|dt| dt.to_rfc3339()),
            Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&chrono::Utc).to_rfc3339())
                .ok()
                .or_else(|| Some(s.clone())),
            _ => None,
        };
        normalized.filter(|s| !s.is_empty())
    })
}

/// Every field not mapped onto an event column.
fn extract_additional_fields(obj: &Map<String, Value>) -> Map<String, Value> {
    obj.iter()
        .filter(|(key, _)| {
            let key = key.as_str();
            ![LEVEL_FIELDS, MESSAGE_FIELDS, TIME_FIELDS, ERROR_FIELDS, FILE_FIELDS, LINE_FIELDS, LOGGER_FIELDS]
                .iter()
                .any(|group| group.contains(&key))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn object_event(obj: &Map<String, Value>, line: &str, line_number: i32, event_id: i64) -> ValidationEvent {
    let level = extract_string_field(obj, LEVEL_FIELDS).map(|l| l.to_ascii_lowercase()).unwrap_or_default();
    let (status, severity) = level_status(&level);

    let mut event = ValidationEvent::at_line(event_id, line, line_number).with_status(status, severity);
    event.tool_name = "jsonl".to_string();
    event.event_type = EventType::DebugInfo;
    event.message = extract_string_field(obj, MESSAGE_FIELDS).unwrap_or_default();
    event.function_name = extract_timestamp(obj).unwrap_or_default();

    if let Some(error) = extract_string_field(obj, ERROR_FIELDS) {
        if event.message.is_empty() {
            event.message = error;
        } else {
            event.suggestion = error;
        }
        event = event.with_status(EventStatus::Error, "error");
    }

    event.ref_file = extract_string_field(obj, FILE_FIELDS).unwrap_or_default();
    event.ref_line = extract_int_field(obj, LINE_FIELDS).unwrap_or(-1);
    event.category = extract_string_field(obj, LOGGER_FIELDS).unwrap_or_else(|| "log_entry".to_string());

    let extra = extract_additional_fields(obj);
    if !extra.is_empty() {
        event.structured_data = Value::Object(extra).to_string();
    }
    event
}

impl Parser for JsonLinesParser {
    fn can_parse(&self, content: &str) -> bool {
        let mut checked = 0;
        let mut objects = 0;

        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()).take(DETECTION_LINES) {
            if !line.starts_with('{') {
                return false;
            }
            checked += 1;
            if matches!(serde_json::from_str::<Value>(line), Ok(Value::Object(_))) {
                objects += 1;
            }
        }

        objects > 0 && objects >= checked / 2
    }

    fn parse(&self, content: &str) -> Vec<ValidationEvent> {
        parse_lines(self, content, MAX_RECORD_SIZE)
    }

    fn meta(&self) -> &ParserMeta {
        &self.meta
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn parse_line(&self, line: &str, line_number: i32, event_id: &mut i64) -> Vec<ValidationEvent> {
        let text = line.trim();
        if !text.starts_with('{') {
            return Vec::new();
        }
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(text) else {
            return Vec::new();
        };
        let event = object_event(&obj, text, line_number, *event_id);
        *event_id += 1;
        vec![event]
    }
}
