use std::sync::LazyLock;

use regex::Regex;

use crate::parser::model::{category, CommandPattern, EventStatus, EventType, ValidationEvent};
use crate::parser::safe::{self, MAX_REGEX_LINE_LENGTH};
use crate::parser::traits::{ParseContext, Parser, ParserMeta};

/// `[Makefile:12: all]` target reference in a failure line
static TARGET_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[([^:\]]+):(\d+):\s*([^\]]+)\]").ok());

const STRUCTURED_DATA: &str = r#"{"phase":"make_build"}"#;

/// GNU make failure and directory-context lines.
pub struct MakeParser {
    meta: ParserMeta,
}

impl MakeParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "make_error",
            "GNU Make",
            category::BUILD_SYSTEM,
            "GNU make failures (make: ***) and recursive directory context",
            90,
        )
        .aliases(&["make"])
        .groups(&["build"])
        .commands(vec![
            CommandPattern::literal("make"),
            CommandPattern::like("make %"),
            CommandPattern::literal("gmake"),
            CommandPattern::like("gmake %"),
        ]);
        Self { meta }
    }

    fn failure_event(&self, line: &str, line_number: i32, event_id: i64) -> ValidationEvent {
        let mut event =
            ValidationEvent::at_line(event_id, line, line_number).with_status(EventStatus::Error, "error");
        event.tool_name = "make".to_string();
        event.event_type = EventType::BuildError;
        event.category = "build_failure".to_string();
        event.message = line.trim().to_string();
        event.structured_data = STRUCTURED_DATA.to_string();

        if let Some(caps) = TARGET_RE.as_ref().and_then(|re| safe::safe_captures(re, line)) {
            if let Some(file) = caps.get(1) {
                event.ref_file = file.as_str().to_string();
            }
            if let Some(lineno) = caps.get(2) {
                event.ref_line = safe::safe_i32(lineno.as_str(), -1);
            }
            if let Some(target) = caps.get(3) {
                event.test_name = target.as_str().trim().to_string();
            }
        }
        event
    }

    fn directory_event(&self, line: &str, line_number: i32, event_id: i64) -> ValidationEvent {
        let mut event = ValidationEvent::at_line(event_id, line, line_number).with_status(EventStatus::Info, "info");
        event.tool_name = "make".to_string();
        event.event_type = EventType::DebugInfo;
        event.category = "build_context".to_string();
        event.message = line.trim().to_string();
        event.structured_data = STRUCTURED_DATA.to_string();
        event.ref_file = quoted_directory(line).unwrap_or_default().to_string();
        event
    }

    fn scan(&self, content: &str, max_line_length: usize) -> Vec<ValidationEvent> {
        let mut events = Vec::new();
        let mut event_id = 1;

        for line in safe::SafeLineReader::with_max_length(content, max_line_length) {
            let text = line.text.as_str();
            let event = if text.contains("make: ***") && text.contains("Error") {
                self.failure_event(text, line.number, event_id)
            } else if text.contains("make[") && text.contains("***") && text.contains("Error") {
                self.failure_event(text, line.number, event_id)
            } else if text.contains("make[") && is_directory_change(text) {
                self.directory_event(text, line.number, event_id)
            } else {
                continue;
            };
            event_id += 1;
            events.push(event);
        }

        events
    }
}

impl Default for MakeParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Directory from `Entering directory '/path'` (backtick or quote opener).
fn quoted_directory(line: &str) -> Option<&str> {
    let start = line.find("directory ")? + "directory ".len();
    let rest = line[start..].strip_prefix(['\'', '`'])?;
    let end = rest.find('\'')?;
    Some(&rest[..end])
}

fn is_directory_change(line: &str) -> bool {
    line.contains("Entering directory") || line.contains("Leaving directory")
}

impl Parser for MakeParser {
    fn can_parse(&self, content: &str) -> bool {
        if content.contains("make: ***") {
            return true;
        }
        content.contains("make[")
            && (content.contains("Entering directory") || content.contains("Leaving directory") || content.contains("Error"))
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
