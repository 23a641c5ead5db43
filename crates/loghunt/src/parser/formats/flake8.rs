use std::sync::LazyLock;

use regex::Regex;

use crate::parser::model::{category, CommandPattern, EventStatus, EventType, ValidationEvent};
use crate::parser::priority;
use crate::parser::safe::{self, MAX_REGEX_LINE_LENGTH};
use crate::parser::traits::{ParseContext, Parser, ParserMeta};

// Codes are a letter plus three or more digits; this keeps IPv6 literals
// like `FE80::C6B3` from matching.
static DETECT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\.py:\d+:\d+:\s*[FEWC]\d{3,}").ok());
static LINE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([^:]+):(\d+):(\d+):\s*([FEWC]\d+)\s*(.+)").ok());

/// flake8 / pycodestyle / pyflakes text output.
pub struct Flake8Parser {
    meta: ParserMeta,
}

impl Flake8Parser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "flake8_text",
            "flake8",
            category::LINTING_TOOL,
            "flake8 findings (file.py:line:col: CODE message)",
            priority::HIGH,
        )
        .aliases(&["flake8"])
        .groups(&["python", "lint"])
        .commands(vec![
            CommandPattern::literal("flake8"),
            CommandPattern::like("flake8 %"),
            CommandPattern::like("python -m flake8%"),
        ]);
        Self { meta }
    }

    fn scan(&self, content: &str, max_line_length: usize) -> Vec<ValidationEvent> {
        let Some(re) = LINE_RE.as_ref() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        let mut event_id = 1;

        for line in safe::SafeLineReader::with_max_length(content, max_line_length) {
            let Some(caps) = safe::safe_captures(re, &line.text) else {
                continue;
            };
            let code = &caps[4];
            let (event_type, status, severity) = classify(code);

            let mut event = ValidationEvent::at_line(event_id, &line.text, line.number).with_status(status, severity);
            event.tool_name = "flake8".to_string();
            event.event_type = event_type;
            event.category = "style_guide".to_string();
            event.ref_file = caps[1].trim().to_string();
            event.ref_line = safe::safe_i32(&caps[2], 0);
            event.ref_column = safe::safe_i32(&caps[3], 0);
            event.error_code = code.to_string();
            event.message = caps[5].trim().to_string();
            event.structured_data = serde_json::json!({
                "error_code": code,
                "error_type": &code[..1],
            })
            .to_string();

            event_id += 1;
            events.push(event);
        }

        let issues = events.len();
        let (status, severity, message) = if issues == 0 {
            (EventStatus::Info, "info", "No issues found".to_string())
        } else {
            (EventStatus::Warning, "warning", format!("{} issue(s) found", issues))
        };
        let mut summary = ValidationEvent { event_id, ..Default::default() }.with_status(status, severity);
        summary.tool_name = "flake8".to_string();
        summary.event_type = EventType::Summary;
        summary.category = "lint_summary".to_string();
        summary.message = message;
        summary.structured_data = serde_json::json!({ "issues": issues }).to_string();
        events.push(summary);

        events
    }
}

impl Default for Flake8Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// F codes are pyflakes logic errors, E pep8 errors, W/C warnings.
fn classify(code: &str) -> (EventType, EventStatus, &'static str) {
    match code.as_bytes().first() {
        Some(b'F') => (EventType::BuildError, EventStatus::Error, "error"),
        Some(b'E') => (EventType::LintIssue, EventStatus::Error, "error"),
        _ => (EventType::LintIssue, EventStatus::Warning, "warning"),
    }
}

impl Parser for Flake8Parser {
    fn can_parse(&self, content: &str) -> bool {
        DETECT_RE.as_ref().is_some_and(|re| re.is_match(content))
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
