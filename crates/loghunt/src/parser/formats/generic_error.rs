use crate::parser::model::{category, EventStatus, EventType, ValidationEvent};
use crate::parser::priority;
use crate::parser::safe::{self, MAX_REGEX_LINE_LENGTH};
use crate::parser::traits::{ParseContext, Parser, ParserMeta};

const DETECTION_WINDOW: usize = 100;

const ERROR_PREFIXES: &[&str] = &[
    "error:", "error :", "[error]", "[fail]", "[failed]", "fail:", "failed:", "fatal:", "[fatal]", "critical:",
    "[critical]", "exception:",
];
const WARNING_PREFIXES: &[&str] =
    &["warning:", "warning :", "[warning]", "[warn]", "warn:", "deprecated:", "[deprecated]"];
const INFO_PREFIXES: &[&str] = &["[info]", "info:", "[notice]", "notice:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Error,
    Warning,
    Info,
}

/// Classify by prefix (case-insensitive) and return the message remainder.
fn classify(line: &str) -> Option<(Class, &str)> {
    let trimmed = line.trim_start();
    let lower = trimmed.to_ascii_lowercase();

    let table: [(&[&str], Class); 3] =
        [(ERROR_PREFIXES, Class::Error), (WARNING_PREFIXES, Class::Warning), (INFO_PREFIXES, Class::Info)];

    table.iter().find_map(|(prefixes, class)| {
        let prefix = prefixes.iter().find(|p| lower.starts_with(*p))?;
        // ASCII lowercasing keeps byte offsets aligned
        let rest = trimmed[prefix.len()..].trim_start();
        Some((*class, if rest.is_empty() { trimmed } else { rest }))
    })
}

/// Last-resort classifier for `ERROR: ...` / `[WARN] ...` style lines.
pub struct GenericErrorParser {
    meta: ParserMeta,
}

impl GenericErrorParser {
    pub fn new() -> Self {
        let meta = ParserMeta::new(
            "generic_error",
            "Generic errors",
            category::TOOL_OUTPUT,
            "Lines prefixed with error:/warning:/[INFO] and similar markers",
            priority::VERY_LOW,
        );
        Self { meta }
    }

    fn scan(&self, content: &str, max_line_length: usize) -> Vec<ValidationEvent> {
        let mut events = Vec::new();
        let mut event_id = 1;

        for line in safe::SafeLineReader::with_max_length(content, max_line_length) {
            let Some((class, message)) = classify(&line.text) else {
                continue;
            };
            let (status, severity, category) = match class {
                Class::Error => (EventStatus::Error, "error", "generic_error"),
                Class::Warning => (EventStatus::Warning, "warning", "generic_warning"),
                Class::Info => (EventStatus::Info, "info", "generic_info"),
            };

            let mut event = ValidationEvent::at_line(event_id, &line.text, line.number).with_status(status, severity);
            event.tool_name = "generic".to_string();
            event.event_type = EventType::LintIssue;
            event.category = category.to_string();
            event.message = message.to_string();

            event_id += 1;
            events.push(event);
        }

        events
    }
}

impl Default for GenericErrorParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for GenericErrorParser {
    fn can_parse(&self, content: &str) -> bool {
        content.lines().take(DETECTION_WINDOW).any(|line| classify(line).is_some())
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
